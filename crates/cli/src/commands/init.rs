//! `docforge init`: write the default configuration.

use docforge_config::AppConfig;
use std::path::Path;

pub fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if write_default(&config_path, force)? {
        println!("Wrote {}", config_path.display());
        println!();
        println!("Next steps:");
        println!("  1. Add an API key to the file, or export OPENAI_API_KEY");
        println!("  2. Run: docforge chat");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("Re-run with --force to overwrite it.");
    }

    Ok(())
}

/// Write the default config to `path`. Returns `false` when a file is
/// already there and `force` is not set.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    std::fs::write(path, AppConfig::default_toml())?;
    tracing::debug!(path = %path.display(), "Default config written");
    Ok(true)
}
