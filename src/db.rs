use sqlx::PgPool;
use uuid::Uuid;

use crate::record::SubmissionRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Appends one row. The generated id stays in the table; nothing is read back.
pub async fn append_record(pool: &PgPool, record: &SubmissionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO broiler_weights.submissions
        (id, measured_on, farm, house, age_days, collection_mode, baseline_weight,
         mean_weight, cv, growth_ratio, deviation_pct, valid_count, raw_samples)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.date)
    .bind(&record.farm)
    .bind(&record.house)
    .bind(i16::from(record.age_days))
    .bind(record.mode.to_string())
    .bind(record.baseline_weight)
    .bind(record.stats.mean)
    .bind(record.stats.cv)
    .bind(record.diagnosis.growth_ratio)
    .bind(record.diagnosis.deviation_pct)
    .bind(i32::try_from(record.stats.valid_count).unwrap_or(i32::MAX))
    .bind(record.raw_samples_joined())
    .execute(pool)
    .await?;

    Ok(())
}
