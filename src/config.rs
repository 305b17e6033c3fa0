use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use sqlx::postgres::PgPoolOptions;

use crate::baseline::BaselineWeightStore;
use crate::sink::{CsvSink, Sink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Csv,
    Postgres,
}

/// Locations and sink choice shared by every command.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Chick weight store
    #[arg(
        long,
        global = true,
        env = "BROILER_BASELINE_PATH",
        default_value = "chick_weight.json"
    )]
    pub baseline_path: PathBuf,

    /// Where finalized records are appended
    #[arg(long, global = true, env = "BROILER_SINK", value_enum, default_value_t = SinkKind::Csv)]
    pub sink: SinkKind,

    #[arg(
        long,
        global = true,
        env = "BROILER_SINK_CSV",
        default_value = "submissions.csv"
    )]
    pub sink_csv: PathBuf,

    /// Records whose submission failed are kept here
    #[arg(long, global = true, env = "BROILER_PENDING_DIR", default_value = "pending")]
    pub pending_dir: PathBuf,
}

impl Settings {
    pub fn baseline_store(&self) -> BaselineWeightStore {
        BaselineWeightStore::open(&self.baseline_path)
    }

    pub async fn connect_sink(&self) -> anyhow::Result<Sink> {
        match self.sink {
            SinkKind::Csv => Ok(Sink::Csv(CsvSink::new(&self.sink_csv))),
            SinkKind::Postgres => Ok(Sink::Postgres(connect_postgres().await?)),
        }
    }
}

pub async fn connect_postgres() -> anyhow::Result<sqlx::PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to use the Postgres sink")?;

    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}
