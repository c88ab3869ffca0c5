use anyhow::{Context, Result};
use batchfeed::{
    batch::{get_reader, JsonOptions, LogSink, RawWindow, RecordSource},
    config::Config,
};
use std::path::PathBuf;
use std::sync::Arc;

pub fn count_batch(
    config: &Config,
    sink: Arc<dyn LogSink>,
    path: PathBuf,
    raw: RawWindow,
    pointer: Option<String>,
) -> Result<()> {
    let options = JsonOptions { pointer };
    let mut reader = get_reader(&path, config, sink)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_json_options(options);

    let window = reader
        .resolve_window(&raw)
        .with_context(|| format!("Failed to resolve batch for {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&window)?);
    Ok(())
}
