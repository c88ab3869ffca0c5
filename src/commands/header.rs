use anyhow::{Context, Result};
use batchfeed::{
    batch::{CsvOptions, CsvReader, SourceFormat},
    config::Config,
};
use std::path::PathBuf;

pub fn show_header(config: &Config, path: PathBuf) -> Result<()> {
    if SourceFormat::detect(&path) != Some(SourceFormat::Csv) {
        anyhow::bail!("Not a CSV file: {}", path.display());
    }

    let options = CsvOptions::try_from(&config.csv)?;
    let mut reader = CsvReader::open(&path, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let header = reader.get_header()?;

    if header.is_empty() {
        println!("{} is empty", path.display());
        return Ok(());
    }

    for (i, name) in header.iter().enumerate() {
        println!("{:>3}  {}", i, name);
    }

    Ok(())
}
