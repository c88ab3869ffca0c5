use anyhow::{Context, Result};
use batchfeed::{
    batch::{
        get_reader, BatchCheckpoint, BatchRunnerBuilder, HandlerError, JsonOptions, LogSink,
        RawWindow, Record, RecordOutcome, RecordSource,
    },
    config::Config,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub fn dump_batch(
    config: &Config,
    sink: Arc<dyn LogSink>,
    path: PathBuf,
    raw: RawWindow,
    pointer: Option<String>,
    resume: bool,
    checkpoint: Option<PathBuf>,
    max_records: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut reader = get_reader(&path, config, sink)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_json_options(JsonOptions { pointer });

    // Determine checkpoint path
    let checkpoint_path = checkpoint.or_else(|| {
        config
            .batch
            .enable_checkpoints
            .then(|| config.batch.checkpoint_path_for(&path))
    });

    // Check for existing checkpoint if resuming
    let existing_checkpoint = match checkpoint_path {
        Some(ref p) if resume && p.exists() => Some(
            BatchCheckpoint::load(p)
                .map_err(|e| anyhow::anyhow!("Failed to load checkpoint: {}", e))?,
        ),
        _ => None,
    };

    let mut builder = BatchRunnerBuilder::new()
        .with_checkpoint_interval(config.batch.checkpoint_interval)
        .with_max_records(max_records)
        .with_quiet(quiet);
    if let Some(ref p) = checkpoint_path {
        builder = builder.with_checkpoint(p);
    }
    let runner = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create batch runner: {}", e))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let handler = |record: Record| -> Result<RecordOutcome, HandlerError> {
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        Ok(RecordOutcome::Processed)
    };

    let stats = match existing_checkpoint {
        Some(cp) => {
            info!(
                "Resuming {} from offset {} ({} records done)",
                path.display(),
                cp.next_offset,
                cp.records_processed
            );
            runner.resume(&mut reader, &cp, handler)
        }
        None => {
            let window = reader
                .resolve_window(&raw)
                .with_context(|| format!("Failed to resolve batch for {}", path.display()))?;
            runner.run(&mut reader, &window, handler)
        }
    }
    .map_err(|e| anyhow::anyhow!("Batch failed: {}", e))?;

    out.flush()?;
    info!(
        "Dumped {} records from {} ({} errors)",
        stats.records_succeeded,
        path.display(),
        stats.records_errored
    );

    Ok(())
}
