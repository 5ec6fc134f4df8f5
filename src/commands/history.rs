//! `skillrun history` command.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::Error;
use crate::record::ExecutionRecord;
use crate::store::RecordStore;

/// Execute the `history` command.
///
/// Prints one row per stored record, newest first.
///
/// # Errors
///
/// Returns an error if the log directory cannot be listed.
pub fn run(ctx: &ServiceContext, config: &Config, name: Option<&str>) -> Result<(), Error> {
    let records = RecordStore::new(ctx, &config.log_dir).list(name).map_err(Error::Io)?;
    if records.is_empty() {
        match name {
            Some(name) => println!("No runs recorded for `{name}`."),
            None => println!("No runs recorded."),
        }
        return Ok(());
    }

    let rows: Vec<[String; 5]> = records.iter().map(row).collect();
    let widths: Vec<usize> = (0..4)
        .map(|col| rows.iter().map(|r| r[col].len()).max().unwrap_or(0).max(HEADERS[col].len()))
        .collect();

    println!(
        "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {}",
        HEADERS[0],
        HEADERS[1],
        HEADERS[2],
        HEADERS[3],
        HEADERS[4],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    for [started, run_id, skill, result, duration] in &rows {
        println!(
            "{started:<w0$}  {run_id:<w1$}  {skill:<w2$}  {result:<w3$}  {duration}",
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        );
    }

    println!("\n{} run(s) total.", rows.len());
    Ok(())
}

const HEADERS: [&str; 5] = ["STARTED", "RUN", "SKILL", "RESULT", "DURATION"];

fn row(record: &ExecutionRecord) -> [String; 5] {
    let result = match &record.failure {
        None => "succeeded".to_string(),
        Some(failure) => {
            let kind = serde_json::to_value(failure.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            if record.rollback_triggered && !record.rollback_clean {
                format!("failed ({kind}, rollback incomplete)")
            } else {
                format!("failed ({kind})")
            }
        }
    };
    [
        record.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.run_id.clone(),
        format!("{}@{}", record.task, record.version),
        result,
        format!("{}ms", record.total_duration_ms),
    ]
}
