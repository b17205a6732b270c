//! Configuration command handlers

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::logger;
use crate::settings::{self, BrokerConfig};

/// Handle config command
///
/// Shows the effective configuration, or writes a default file when none exists.
pub fn handle_config(config: &BrokerConfig, explicit_path: Option<&Path>, show: bool) -> Result<()> {
    if show {
        settings::show_config(config);
        return Ok(());
    }

    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => crate::config::ConfigManager::config_file_path()?,
    };

    if path.exists() {
        println!(
            "{} {}",
            "Configuration already exists at".yellow(),
            path.display()
        );
        println!("Use {} to display it.", "config --show".bold());
        return Ok(());
    }

    config.save_to(&path)?;
    logger::log_to_file(&format!("wrote default configuration to {}", path.display()))?;
    println!(
        "{} {}",
        "Configuration written to".green().bold(),
        path.display()
    );
    Ok(())
}
