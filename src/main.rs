use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod baseline;
mod batch;
mod config;
mod db;
mod diagnostics;
mod error;
mod models;
mod record;
mod report;
mod sink;
mod stats;
mod targets;

use batch::{BatchHeader, MeasurementBatch};
use config::Settings;
use error::GrowthError;
use models::CollectionMode;
use record::SubmissionRecord;
use targets::GrowthTargetTable;

#[derive(Parser)]
#[command(name = "broiler-weight")]
#[command(about = "Broiler flock weighing and growth tracking", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// Read or record the chick weight of a house
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },
    /// Aggregate one weighing session and optionally submit it
    #[command(group(
        ArgGroup::new("input")
            .args(["weights", "samples_csv"])
            .required(true)
            .multiple(false)
    ))]
    Measure {
        #[arg(long)]
        farm: String,
        #[arg(long)]
        house: String,
        /// Age in days (0-55)
        #[arg(long)]
        age: i64,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// unsexed15 or sexed30; defaults by age
        #[arg(long)]
        mode: Option<CollectionMode>,
        /// Weights in grams in form order, comma separated; 0 = not weighed
        #[arg(long, value_delimiter = ',')]
        weights: Option<Vec<String>>,
        /// CSV with sector,sex,index,weight columns
        #[arg(long)]
        samples_csv: Option<PathBuf>,
        /// Overrides the stored chick weight
        #[arg(long)]
        baseline: Option<f64>,
        /// Also write the report to this file
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        submit: bool,
    },
    /// Retry a record parked after a failed submission
    Resubmit {
        #[arg(long)]
        record: PathBuf,
    },
}

#[derive(Subcommand)]
enum BaselineAction {
    Get {
        #[arg(long)]
        farm: String,
        #[arg(long)]
        house: String,
    },
    Set {
        #[arg(long)]
        farm: String,
        #[arg(long)]
        house: String,
        #[arg(long)]
        weight: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "broiler_weight=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command {
        Commands::InitDb => {
            let pool = config::connect_postgres().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Baseline { action } => {
            let store = settings.baseline_store();
            match action {
                BaselineAction::Get { farm, house } => {
                    println!("{}", store.get(&farm, &house)?);
                }
                BaselineAction::Set {
                    farm,
                    house,
                    weight,
                } => {
                    store.set(&farm, &house, weight)?;
                    println!(
                        "Chick weight for {farm} house {house} saved to {}: {weight} g.",
                        store.path().display()
                    );
                }
            }
        }
        Commands::Measure {
            farm,
            house,
            age,
            date,
            mode,
            weights,
            samples_csv,
            baseline,
            out,
            submit,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let header = BatchHeader::new(date, &farm, &house, age)?;
            let mode = mode.unwrap_or_else(|| CollectionMode::default_for_age(header.age_days));

            let batch = match (weights, samples_csv) {
                (Some(weights), _) => MeasurementBatch::from_values(header, mode, &weights)?,
                (None, Some(path)) => {
                    let file = std::fs::File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    batch::read_samples_csv(file, header, mode)
                        .with_context(|| format!("invalid samples in {}", path.display()))?
                }
                (None, None) => anyhow::bail!("either --weights or --samples-csv is required"),
            };

            info!(
                mode = %batch.mode(),
                samples = batch.samples().len(),
                "batch ready"
            );

            let baseline_weight = match baseline {
                Some(weight) => baseline::validate_weight(weight)?,
                None => settings.baseline_store().get(&farm, &house)?,
            };

            let record = finalize(&batch, baseline_weight);
            let report = report::build_report(&record);
            print!("{report}");
            if let Some(out) = out {
                std::fs::write(&out, &report)?;
                println!("Report written to {}.", out.display());
            }

            if submit {
                deliver(&settings, &record).await?;
            }
        }
        Commands::Resubmit { record: path } => {
            let record = sink::load_parked(&path)
                .with_context(|| format!("failed to read parked record {}", path.display()))?;
            submit_record(&settings, &record, Some(&path)).await?;
            if let Err(err) = std::fs::remove_file(&path) {
                warn!(
                    path = %path.display(),
                    "submitted but could not remove parked record: {err}"
                );
            }
            println!("Record from {} submitted.", path.display());
        }
    }

    Ok(())
}

/// Runs the whole calculation once; the returned record is what gets sent.
fn finalize(batch: &MeasurementBatch, baseline_weight: f64) -> SubmissionRecord {
    let stats = stats::aggregate(batch);
    let diagnosis = diagnostics::diagnose(
        stats.mean,
        baseline_weight,
        batch.header().age_days,
        &GrowthTargetTable::standard(),
    );
    SubmissionRecord::assemble(batch, baseline_weight, &stats, &diagnosis)
}

async fn deliver(settings: &Settings, record: &SubmissionRecord) -> anyhow::Result<()> {
    submit_record(settings, record, None).await?;
    println!("Record submitted.");
    Ok(())
}

async fn submit_record(
    settings: &Settings,
    record: &SubmissionRecord,
    parked_at: Option<&Path>,
) -> anyhow::Result<()> {
    let outcome = match settings.connect_sink().await {
        Ok(sink) => sink::submit_or_park(&sink, record, &settings.pending_dir, parked_at).await,
        Err(err) => Err(sink::keep_for_retry(
            GrowthError::submission(err),
            record,
            &settings.pending_dir,
            parked_at,
        )),
    };

    outcome.map_err(|err| {
        let hint = match &err {
            GrowthError::SubmissionFailed {
                pending: Some(path),
                ..
            } => format!(
                "record kept at {}; retry with `resubmit --record {}`",
                path.display(),
                path.display()
            ),
            _ => "record could not be kept for retry".to_string(),
        };
        anyhow::Error::new(err).context(hint)
    })?;

    info!(farm = %record.farm, house = %record.house, "session finalized");
    Ok(())
}
