#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for the covid map toolchain.
//!
//! `ingest` fetches the case feed and writes the enriched incidence table,
//! `classify` turns that table into a classified choropleth, and `run` does
//! both. Every flag overrides the matching value of the loaded
//! configuration.
//!
//! Uses `indicatif-log-bridge` (via [`covid_map_cli_utils::init_logger`])
//! so log lines and step spinners share the terminal.

mod commands;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use covid_map_analytics_models::BreakBasis;
use covid_map_config::PipelineConfig;
use strum::IntoEnumIterator as _;

#[derive(Parser)]
#[command(
    name = "covid_map",
    about = "COVID-19 incidence per region, classified for choropleth maps"
)]
struct Cli {
    /// Config file (takes precedence over `COVID_MAP_CONFIG` and
    /// `covid_map.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the case feed and write the enriched incidence table
    Ingest(IngestArgs),
    /// Classify the enriched table and write the choropleth `GeoJSON`
    Classify(ClassifyArgs),
    /// Ingest, then classify
    Run {
        #[command(flatten)]
        ingest: IngestArgs,
        #[command(flatten)]
        classify: ClassifyArgs,
    },
    /// Print regions ranked by incidence
    Summary {
        /// Enriched table to read
        #[arg(long)]
        input: Option<PathBuf>,
        /// Maximum number of regions to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default)]
struct IngestArgs {
    /// Reporting date to keep (YYYY-MM-DD). Defaults to the latest date in
    /// the feed.
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,
    /// Feed URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Population table (`.csv` or spreadsheet)
    #[arg(long)]
    population: Option<PathBuf>,
    /// Worksheet to read from a spreadsheet population table
    #[arg(long)]
    population_sheet: Option<String>,
    /// Where to write the enriched table
    #[arg(long)]
    enriched: Option<PathBuf>,
}

impl IngestArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.source.endpoint.clone_from(endpoint);
        }
        if let Some(population) = &self.population {
            config.files.population.clone_from(population);
        }
        if let Some(sheet) = &self.population_sheet {
            config.files.population_sheet = Some(sheet.clone());
        }
        if let Some(enriched) = &self.enriched {
            config.files.enriched.clone_from(enriched);
        }
    }
}

#[derive(Args, Debug, Default)]
struct ClassifyArgs {
    /// Enriched table to classify (defaults to the ingest output)
    #[arg(long)]
    input: Option<PathBuf>,
    /// `GeoJSON` region polygons
    #[arg(long)]
    geometry: Option<PathBuf>,
    /// Feature property holding the numeric region id
    #[arg(long)]
    id_field: Option<String>,
    /// CSV mapping `code_num` to `code`
    #[arg(long)]
    mapping: Option<PathBuf>,
    /// Where to write the choropleth `GeoJSON`
    #[arg(long)]
    output: Option<PathBuf>,
    /// Number of quantile classes
    #[arg(long)]
    classes: Option<usize>,
    /// Compute breaks per region or per polygon fragment
    #[arg(long, value_parser = parse_basis)]
    basis: Option<BreakBasis>,
}

impl ClassifyArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            config.files.enriched.clone_from(input);
        }
        if let Some(geometry) = &self.geometry {
            config.files.geometry.clone_from(geometry);
        }
        if let Some(id_field) = &self.id_field {
            config.files.geometry_id_field.clone_from(id_field);
        }
        if let Some(mapping) = &self.mapping {
            config.files.code_mapping.clone_from(mapping);
        }
        if let Some(output) = &self.output {
            config.files.choropleth.clone_from(output);
        }
        if let Some(classes) = self.classes {
            config.classification.classes = classes;
        }
        if let Some(basis) = self.basis {
            config.classification.basis = basis;
        }
    }
}

fn parse_as_of(s: &str) -> Result<NaiveDate, String> {
    covid_map_source::parsing::parse_date(s).map_err(|e| e.to_string())
}

fn parse_basis(s: &str) -> Result<BreakBasis, String> {
    s.parse().map_err(|_| {
        let valid: Vec<String> = BreakBasis::iter().map(|b| b.to_string()).collect();
        format!("expected one of: {}", valid.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = covid_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest(args) => {
            args.apply(&mut config);
            config.validate()?;
            commands::ingest(&multi, &config, args.as_of).await?;
        }
        Commands::Classify(args) => {
            args.apply(&mut config);
            config.validate()?;
            commands::classify(&multi, &config)?;
        }
        Commands::Run { ingest, classify } => {
            // --enriched wins over --input so classify reads what ingest wrote.
            classify.apply(&mut config);
            ingest.apply(&mut config);
            config.validate()?;
            commands::ingest(&multi, &config, ingest.as_of).await?;
            commands::classify(&multi, &config)?;
        }
        Commands::Summary { input, limit } => {
            if let Some(input) = input {
                config.files.enriched = input;
            }
            commands::summary(&config, limit)?;
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
