use anyhow::Result;
use batchfeed::batch::BatchCheckpoint;
use std::path::PathBuf;

pub fn show_status(checkpoint_path: PathBuf) -> Result<()> {
    if !checkpoint_path.exists() {
        anyhow::bail!("Checkpoint file not found: {}", checkpoint_path.display());
    }

    let checkpoint = BatchCheckpoint::load(&checkpoint_path)
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint: {}", e))?;

    println!("\nBatch Checkpoint Status");
    println!("=======================");
    println!("Source file:       {}", checkpoint.source_path.display());
    println!("Next offset:       {}", checkpoint.next_offset);
    match checkpoint.window_end {
        Some(end) => println!("Window end:        {}", end),
        None => println!("Window end:        (end of file)"),
    }
    println!("Records processed: {}", checkpoint.records_processed);
    println!("Records errored:   {}", checkpoint.records_errored);
    println!("Timestamp:         {}", checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("\nTo resume, run:");
    println!(
        "  batchfeed dump {} --resume --checkpoint {}",
        checkpoint.source_path.display(),
        checkpoint_path.display()
    );

    Ok(())
}
