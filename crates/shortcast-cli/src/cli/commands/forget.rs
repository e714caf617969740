//! `shortcast forget <item>` – drop an item's ledger entry.

use anyhow::Result;
use shortcast_core::config::ShortcastConfig;
use shortcast_core::ledger::Ledger;

pub fn run_forget(cfg: &ShortcastConfig, item: &str) -> Result<()> {
    let paths = cfg.resolve_paths()?;
    let mut ledger = Ledger::load(&paths.ledger_path)?;
    if ledger.remove(item)? {
        tracing::info!(item, "ledger entry removed by operator");
        println!("Forgot {item}");
    } else {
        println!("No ledger entry for {item}");
    }
    Ok(())
}
