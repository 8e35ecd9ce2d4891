//! Population reference table loading.
//!
//! The reference table lists sub-regions (municipalities) with the code of
//! the region they belong to (`ktn`) and their resident count
//! (`pop_size`). Rows are summed per region code.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, Reader as _};
use covid_map_incidence_models::PopulationRecord;

use crate::IngestError;

/// Header naming the region code column.
pub const REGION_COLUMN: &str = "ktn";

/// Header naming the population column.
pub const POPULATION_COLUMN: &str = "pop_size";

/// A `(region code, population)` pair read from one sub-region row.
pub type PopulationRow = (String, u64);

/// Loads the population table and sums it per region code.
///
/// `.csv` files are read with the `csv` crate (comma or semicolon
/// delimited); `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, and `.ods` files are read
/// with `calamine` from `sheet`, or the first worksheet if `sheet` is
/// `None`. Records are returned sorted by region code.
///
/// # Errors
///
/// Returns [`IngestError::FileNotFound`] if `path` does not exist,
/// [`IngestError::Parse`] if the required columns are missing, a
/// population value is not a non-negative integer, or the extension is not
/// supported, and [`IngestError::Csv`]/[`IngestError::Spreadsheet`] for
/// reader failures.
pub fn load_population(
    path: &Path,
    sheet: Option<&str>,
) -> Result<Vec<PopulationRecord>, IngestError> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" | "txt" => read_csv_rows(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_sheet_rows(path, sheet)?,
        other => {
            return Err(IngestError::Parse {
                message: format!(
                    "unsupported population file extension '{other}' for {}",
                    path.display()
                ),
            });
        }
    };

    log::info!(
        "Read {} sub-region population rows from {}",
        rows.len(),
        path.display()
    );

    let records = sum_by_region(rows);
    log::info!("Population table covers {} regions", records.len());

    Ok(records)
}

/// Sums sub-region populations sharing a region code.
#[must_use]
pub fn sum_by_region(rows: impl IntoIterator<Item = PopulationRow>) -> Vec<PopulationRecord> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for (region_code, population) in rows {
        *totals.entry(region_code).or_default() += population;
    }

    totals
        .into_iter()
        .map(|(region_code, population)| PopulationRecord {
            region_code,
            population,
        })
        .collect()
}

/// Parses a population cell. Accepts thousands separators (`'`, `’`, `,`)
/// and integral floats as written by spreadsheet exports.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn parse_population(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | ',' | ' '))
        .collect();

    if let Ok(v) = cleaned.parse::<u64>() {
        return Some(v);
    }

    let f = cleaned.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}

/// Turns one data row into a [`PopulationRow`].
///
/// Returns `Ok(None)` for rows without a region code (blank lines and
/// footnotes).
fn parse_row(
    line: usize,
    region: &str,
    population: &str,
) -> Result<Option<PopulationRow>, IngestError> {
    let region = region.trim();
    if region.is_empty() {
        return Ok(None);
    }

    let population = parse_population(population).ok_or_else(|| IngestError::Parse {
        message: format!(
            "row {line}: {POPULATION_COLUMN} '{}' is not a non-negative integer",
            population.trim()
        ),
    })?;

    Ok(Some((region.to_string(), population)))
}

/// Finds the indices of the region and population columns in a header row.
fn locate_columns<'a>(headers: impl IntoIterator<Item = &'a str>) -> Option<(usize, usize)> {
    let mut region = None;
    let mut population = None;
    for (i, header) in headers.into_iter().enumerate() {
        match header.trim() {
            REGION_COLUMN if region.is_none() => region = Some(i),
            POPULATION_COLUMN if population.is_none() => population = Some(i),
            _ => {}
        }
    }
    Some((region?, population?))
}

fn missing_columns_error(path: &Path) -> IngestError {
    IngestError::Parse {
        message: format!(
            "{} has no '{REGION_COLUMN}' and '{POPULATION_COLUMN}' header columns",
            path.display()
        ),
    }
}

/// Picks `;` for semicolon-separated exports, `,` otherwise.
fn sniff_delimiter(path: &Path) -> Result<u8, IngestError> {
    let contents = std::fs::read_to_string(path)?;
    let first_line = contents.lines().next().unwrap_or_default();
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

fn read_csv_rows(path: &Path) -> Result<Vec<PopulationRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(path)?)
        .flexible(true)
        .from_path(path)?;

    let (region_idx, pop_idx) =
        locate_columns(reader.headers()?.iter()).ok_or_else(|| missing_columns_error(path))?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let region = record.get(region_idx).unwrap_or_default();
        let population = record.get(pop_idx).unwrap_or_default();
        // Header is line 1.
        if let Some(row) = parse_row(i + 2, region, population)? {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Renders a spreadsheet cell as text for [`parse_row`].
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn read_sheet_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<PopulationRow>, IngestError> {
    let mut workbook = calamine::open_workbook_auto(path)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestError::Parse {
                message: format!("{} contains no worksheets", path.display()),
            })?,
    };

    log::debug!("Reading worksheet '{sheet_name}' from {}", path.display());
    let range = workbook.worksheet_range(&sheet_name)?;

    // Statistical office exports put title lines above the header, so the
    // header is the first row naming both columns.
    let mut rows_iter = range.rows().enumerate();
    let (region_idx, pop_idx) = rows_iter
        .by_ref()
        .find_map(|(_, row)| {
            let texts: Vec<String> = row.iter().map(cell_text).collect();
            locate_columns(texts.iter().map(String::as_str))
        })
        .ok_or_else(|| missing_columns_error(path))?;

    let mut rows = Vec::new();
    for (i, row) in rows_iter {
        let region = row.get(region_idx).map(cell_text).unwrap_or_default();
        let population = row.get(pop_idx).map(cell_text).unwrap_or_default();
        if let Some(parsed) = parse_row(i + 1, &region, &population)? {
            rows.push(parsed);
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sums_sub_regions_per_code() {
        let records = sum_by_region(vec![
            ("ZH".to_string(), 100),
            ("BE".to_string(), 50),
            ("ZH".to_string(), 25),
        ]);
        assert_eq!(
            records,
            vec![
                PopulationRecord {
                    region_code: "BE".to_string(),
                    population: 50
                },
                PopulationRecord {
                    region_code: "ZH".to_string(),
                    population: 125
                },
            ]
        );
    }

    #[test]
    fn parses_formatted_populations() {
        assert_eq!(parse_population("1520968"), Some(1_520_968));
        assert_eq!(parse_population("1'520'968"), Some(1_520_968));
        assert_eq!(parse_population(" 42.0 "), Some(42));
        assert_eq!(parse_population("-3"), None);
        assert_eq!(parse_population("n/a"), None);
    }

    #[test]
    fn loads_csv_with_extra_columns() {
        let dir = scratch("covid_map_population_csv");
        let path = dir.join("population.csv");
        std::fs::write(
            &path,
            "gdenr,gdename,ktn,pop_size\n\
             1,Aeugst am Albis,ZH,1977\n\
             2,Affoltern am Albis,ZH,12229\n\
             351,Bern,BE,134591\n\
             ,,,\n",
        )
        .unwrap();

        let records = load_population(&path, None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].region_code, "BE");
        assert_eq!(records[0].population, 134_591);
        assert_eq!(records[1].region_code, "ZH");
        assert_eq!(records[1].population, 14_206);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loads_semicolon_csv() {
        let dir = scratch("covid_map_population_semicolon");
        let path = dir.join("population.csv");
        std::fs::write(&path, "ktn;pop_size\nGE;506343\nGE;1000\n").unwrap();

        let records = load_population(&path, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].population, 507_343);

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn workbook_fixture() -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/population.xlsx")
    }

    #[test]
    fn loads_first_worksheet_below_title_rows() {
        let records = load_population(&workbook_fixture(), None).unwrap();
        assert_eq!(
            records,
            vec![
                PopulationRecord {
                    region_code: "BE".to_string(),
                    population: 134_591
                },
                PopulationRecord {
                    region_code: "ZH".to_string(),
                    population: 14_206
                },
            ]
        );
    }

    #[test]
    fn loads_named_worksheet() {
        let records = load_population(&workbook_fixture(), Some("Kantone")).unwrap();
        assert_eq!(
            records,
            vec![PopulationRecord {
                region_code: "GE".to_string(),
                population: 507_343
            }]
        );
    }

    #[test]
    fn unknown_worksheet_is_spreadsheet_error() {
        let err = load_population(&workbook_fixture(), Some("Bezirke")).unwrap_err();
        assert!(matches!(err, IngestError::Spreadsheet(_)));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let path = std::env::temp_dir().join("covid_map_population_missing.xlsx");
        let _ = std::fs::remove_file(&path);
        let err = load_population(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn missing_columns_is_parse_error() {
        let dir = scratch("covid_map_population_columns");
        let path = dir.join("population.csv");
        std::fs::write(&path, "canton,residents\nZH,1\n").unwrap();

        let err = load_population(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_population_value_is_parse_error() {
        let dir = scratch("covid_map_population_bad_value");
        let path = dir.join("population.csv");
        std::fs::write(&path, "ktn,pop_size\nZH,lots\n").unwrap();

        let err = load_population(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::Parse { ref message } if message.contains("row 2")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_extension_is_parse_error() {
        let dir = scratch("covid_map_population_ext");
        let path = dir.join("population.json");
        std::fs::write(&path, "{}").unwrap();

        let err = load_population(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
