use std::fmt::Write;

use crate::diagnostics::age_weeks;
use crate::record::SubmissionRecord;

pub fn build_report(record: &SubmissionRecord) -> String {
    let mut output = String::new();
    let stats = &record.stats;
    let diagnosis = &record.diagnosis;

    let _ = writeln!(output, "# Broiler Weight Report");
    let _ = writeln!(
        output,
        "{} house {} on {} (day {}, week {}, {} mode)",
        record.farm,
        record.house,
        record.date,
        record.age_days,
        age_weeks(record.age_days),
        record.mode
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Flock Weight");

    if stats.valid_count == 0 {
        let _ = writeln!(output, "No birds weighed in this session.");
    } else {
        let _ = writeln!(
            output,
            "- Birds weighed: {} of {}",
            stats.valid_count,
            record.raw_samples.len()
        );
        let _ = writeln!(output, "- Mean weight: {} g", stats.mean);
        let _ = writeln!(output, "- CV: {} %", stats.cv);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Growth");

    if record.baseline_weight > 0.0 {
        let _ = writeln!(
            output,
            "- Growth ratio: {} x over chick weight {} g",
            diagnosis.growth_ratio, record.baseline_weight
        );
    } else {
        let _ = writeln!(output, "- Growth ratio: n/a (no chick weight recorded)");
    }

    if diagnosis.target_ratio > 0.0 {
        let _ = writeln!(output, "- Target ratio: {}", diagnosis.target_ratio);
        let _ = writeln!(output, "- Deviation: {} %", diagnosis.deviation_pct);
    } else {
        let _ = writeln!(output, "- Target ratio: n/a (outside weeks 1-7)");
    }

    output
}
