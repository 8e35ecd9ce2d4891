//! Subcommand implementations.

use chrono::NaiveDate;
use covid_map_analytics_models::ClassificationSummary;
use covid_map_cli_utils::{MultiProgress, StepSpinner, with_spinner};
use covid_map_config::PipelineConfig;
use covid_map_geography::RegionSources;
use covid_map_ingest::{IngestOptions, IngestReport};

/// Fetches the feed and writes the enriched table.
pub async fn ingest(
    multi: &MultiProgress,
    config: &PipelineConfig,
    as_of: Option<NaiveDate>,
) -> Result<IngestReport, Box<dyn std::error::Error>> {
    let client = covid_map_source::build_client(config.source.timeout())?;
    let options = IngestOptions {
        endpoint: config.source.endpoint.clone(),
        population_path: config.files.population.clone(),
        population_sheet: config.files.population_sheet.clone(),
        output_path: config.files.enriched.clone(),
        as_of,
    };

    let spinner = StepSpinner::start(multi, format!("Ingesting cases from {}", options.endpoint));
    let report = match covid_map_ingest::run_ingest(&client, &options).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail(format!("Ingest failed: {e}"));
            return Err(e.into());
        }
    };

    spinner.succeed(format!(
        "{} regions on {} -> {}",
        report.regions,
        report.as_of,
        report.output_path.display()
    ));

    if report.gaps.without_population > 0 || report.gaps.without_incidence > 0 {
        log::warn!(
            "{} region(s) without population, {} without incidence",
            report.gaps.without_population,
            report.gaps.without_incidence
        );
    }

    Ok(report)
}

/// Classifies the enriched table and writes the choropleth.
pub fn classify(
    multi: &MultiProgress,
    config: &PipelineConfig,
) -> Result<ClassificationSummary, Box<dyn std::error::Error>> {
    let sources = RegionSources {
        geometry: &config.files.geometry,
        geometry_id_field: &config.files.geometry_id_field,
        code_mapping: &config.files.code_mapping,
        enriched: &config.files.enriched,
    };

    let regions = with_spinner(
        multi,
        "Joining region geometry to incidence",
        || covid_map_geography::load_region_incidence(&sources),
        |regions| format!("{} region fragments joined", regions.len()),
    )?;

    let classification = covid_map_analytics::classify(
        regions,
        config.classification.classes,
        config.classification.basis,
    );
    let summary = covid_map_analytics::summarize(&classification);

    with_spinner(
        multi,
        "Writing choropleth",
        || covid_map_generate::write_choropleth(&config.files.choropleth, &classification),
        |_| config.files.choropleth.display().to_string(),
    )?;

    print_legend(&summary);

    Ok(summary)
}

fn print_legend(summary: &ClassificationSummary) {
    println!("{:<16} {:>10} {:>10}", "INCIDENCE", "REGIONS", "FRAGMENTS");
    println!("{}", "-".repeat(38));
    for class in &summary.classes {
        println!(
            "{:<16} {:>10} {:>10}",
            class.bin.label, class.regions, class.fragments
        );
    }
    if summary.unclassified_fragments > 0 {
        println!(
            "{:<16} {:>10} {:>10}",
            "(no data)", "-", summary.unclassified_fragments
        );
    }
}

/// Prints the enriched table ranked by incidence.
pub fn summary(
    config: &PipelineConfig,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = covid_map_ingest::read_enriched(&config.files.enriched)?;
    let ranked = covid_map_analytics::rank_regions(&records, limit);

    if let Some(date) = covid_map_ingest::latest_date(&records) {
        println!("Reported on {date}");
    }
    println!(
        "{:<6} {:>12} {:>12} {:>12}",
        "REGION", "CONFIRMED", "POPULATION", "INCIDENCE"
    );
    println!("{}", "-".repeat(45));

    for record in ranked {
        println!(
            "{:<6} {:>12} {:>12} {:>12}",
            record.region_code,
            display_or_dash(record.confirmed_cumulative),
            display_or_dash(record.population),
            record
                .incidence
                .map_or_else(|| "-".to_string(), |i| format!("{i:.1}")),
        );
    }

    Ok(())
}

fn display_or_dash(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
