use anyhow::Result;
use batchfeed::config::Config;
use std::path::PathBuf;

pub fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join("batchfeed.toml");

    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let toml_content = format!(
        r#"# batchfeed Configuration

[csv]
delimiter = "{}"
enclosure = "{}"
escape = "{}"

[json]
count_program = "{}"
probe_timeout_secs = {}
user_agent = "{}"

[batch]
enable_checkpoints = {}
checkpoint_dir = "{}"
checkpoint_interval = {}

[logging]
format = "text"
level = "{}"
# file = "batchfeed.log"
echo = {}
"#,
        config.csv.delimiter.escape_default(),
        config.csv.enclosure.escape_default(),
        config.csv.escape.escape_default(),
        config.json.count_program,
        config.json.probe_timeout_secs,
        config.json.user_agent,
        config.batch.enable_checkpoints,
        config.batch.checkpoint_dir.display(),
        config.batch.checkpoint_interval,
        config.logging.level,
        config.logging.echo,
    );

    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}
