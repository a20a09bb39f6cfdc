//! `staybot history`: print the most recent archived chat rows.

use anyhow::Context;
use staybot_core::archive::ChatArchive;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, limit: usize) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let archive = staybot_archive::open(&config.archive)
        .await
        .context("Could not open chat archive")?;

    let rows = archive.recent(limit).await.context("History query failed")?;
    if rows.is_empty() {
        println!("No archived chats ({}).", archive.name());
        return Ok(());
    }

    for row in rows {
        println!(
            "[{}] {:>9}: {}",
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
            row.role.as_str(),
            row.content
        );
    }
    Ok(())
}
