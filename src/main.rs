use movie_region_pipeline::{DataPaths, Pipeline, PipelineConfig, TableShape};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "movie-region-pipeline")]
#[command(about = "Resolve movie regions and join them with ratings and macro-economic data")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and write the joined table
    Run {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output file (.parquet writes Parquet, anything else tab-separated)
        #[arg(short, long, default_value = "joined_titles.tsv")]
        output: PathBuf,
    },
    /// Resolve regions only and report titles without one
    Regions {
        #[command(flatten)]
        inputs: InputArgs,

        /// How many records of ambiguous titles to print
        #[arg(long, default_value_t = 10)]
        sample: usize,
    },
    /// Aggregate macro data only and print it per region
    Macro {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

#[derive(ClapArgs)]
struct InputArgs {
    /// JSON config file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to title.akas.tsv
    #[arg(long)]
    title_akas: Option<PathBuf>,

    /// Path to title.ratings.tsv
    #[arg(long)]
    title_ratings: Option<PathBuf>,

    /// Path to title.basics.tsv
    #[arg(long)]
    title_basics: Option<PathBuf>,

    /// First release year to keep
    #[arg(long)]
    start_year: Option<i32>,

    /// Last release year to keep
    #[arg(long)]
    end_year: Option<i32>,

    /// Path to the GDP table
    #[arg(long)]
    gdp: Option<PathBuf>,

    /// Path to the population table
    #[arg(long)]
    population: Option<PathBuf>,

    /// Path to the 3-letter to 2-letter country code mapping
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Keep titles without a single region under "WD"
    #[arg(long, action = clap::ArgAction::Set)]
    world: Option<bool>,

    /// Year for the macro data (GDP and population)
    #[arg(long)]
    macro_year: Option<String>,
}

impl InputArgs {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => {
                let paths = DataPaths::new(
                    self.title_akas.clone().context("--title-akas is required")?,
                    self.title_ratings.clone().context("--title-ratings is required")?,
                    self.title_basics.clone().context("--title-basics is required")?,
                );
                PipelineConfig::new(
                    paths,
                    self.start_year.context("--start-year is required")?,
                    self.end_year.context("--end-year is required")?,
                )
            }
        };

        if let Some(path) = self.title_akas {
            config.paths.title_akas = path;
        }
        if let Some(path) = self.title_ratings {
            config.paths.title_ratings = path;
        }
        if let Some(path) = self.title_basics {
            config.paths.title_basics = path;
        }
        if let Some(path) = self.gdp {
            config.paths.gdp = path;
        }
        if let Some(path) = self.population {
            config.paths.population = path;
        }
        if let Some(path) = self.mapping {
            config.paths.country_codes = path;
        }
        if let Some(year) = self.start_year {
            config.start_year = year;
        }
        if let Some(year) = self.end_year {
            config.end_year = year;
        }
        if let Some(world) = self.world {
            config.include_world_fallback = world;
        }
        if let Some(year) = self.macro_year {
            config.macro_year = year;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Run { inputs, output } => run(inputs.into_config()?, &output),
        Commands::Regions { inputs, sample } => regions(inputs.into_config()?, sample),
        Commands::Macro { inputs } => macro_table(inputs.into_config()?),
    }
}

fn run(config: PipelineConfig, output: &Path) -> Result<()> {
    let mut pipeline = Pipeline::new(config);
    let joined = pipeline.join().context("Pipeline failed")?;

    let mut frame = joined.to_frame()?;
    write_frame(&mut frame, output)?;
    info!("Wrote {} rows to {}", frame.height(), output.display());

    let summary = pipeline.summary();
    println!(
        "title.akas had {} rows with {} unique titles; {} titles were given a region ({} ambiguous).",
        summary.akas_rows, summary.distinct_titles, summary.resolved_titles, summary.ambiguous_titles
    );
    println!(
        "title.basics had {} rows and title.ratings had {} rows; {} titles remain after joining.",
        summary.basics_rows, summary.ratings_rows, summary.joined_rows
    );
    for notice in pipeline.diagnostics().iter() {
        println!("note: {}", notice);
    }
    Ok(())
}

fn regions(config: PipelineConfig, sample: usize) -> Result<()> {
    let mut pipeline = Pipeline::new(config);
    let resolution = pipeline.resolve_regions().context("Region resolution failed")?;

    println!(
        "Resolved {} titles; the region for {} titles was not found.",
        resolution.resolved.len(),
        resolution.lost_region_count()
    );
    for record in resolution.ambiguous_records().into_iter().take(sample) {
        println!(
            "{}\t{}\t{}\t{}",
            record.title_id,
            u8::from(record.is_original_title),
            record.region.as_deref().unwrap_or("\\N"),
            record.title
        );
    }
    Ok(())
}

fn macro_table(config: PipelineConfig) -> Result<()> {
    let mut pipeline = Pipeline::new(config);
    let table = pipeline.aggregate_macro().context("Macro aggregation failed")?;
    println!("{}", table.to_frame()?);
    Ok(())
}

fn write_frame(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    if path.extension().and_then(|s| s.to_str()) == Some("parquet") {
        ParquetWriter::new(&mut file).finish(frame)?;
    } else {
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(TableShape::Catalog.separator())
            .with_quote_style(TableShape::Catalog.quote_style())
            .finish(frame)?;
    }
    Ok(())
}
