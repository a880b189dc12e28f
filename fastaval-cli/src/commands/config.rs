use std::path::PathBuf;

use crate::config::Config;
use crate::error::{CliError, CliResult};

pub fn execute(config: &Config, example: bool, write: Option<PathBuf>) -> CliResult<()> {
    if let Some(path) = write {
        config
            .save_to_file(&path)
            .map_err(|e| CliError::config(format!("{:#}", e)))?;
        log::info!("Configuration written to: {}", path.display());
        return Ok(());
    }

    let content = if example {
        Config::example_toml()
    } else {
        toml::to_string_pretty(config).map_err(anyhow::Error::from)
    }
    .map_err(|e| CliError::config(format!("{:#}", e)))?;

    print!("{}", content);
    Ok(())
}
