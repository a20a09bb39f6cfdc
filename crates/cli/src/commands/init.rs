//! `staybot init`: write the default configuration file.

use anyhow::Context;
use staybot_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = super::config_path(config_path);

    if path.exists() && !force {
        println!("Config already exists at: {}", path.display());
        println!("   Edit it manually, or re-run with --force to overwrite.");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("Could not write {}", path.display()))?;

    println!("Created config at: {}", path.display());
    println!("\nNext steps:");
    println!("   1. Set STAYBOT_API_KEY (or OPENAI_API_KEY / GEMINI_API_KEY)");
    println!("   2. Run: staybot chat");
    println!("   3. Or serve the web client: staybot serve\n");
    Ok(())
}
