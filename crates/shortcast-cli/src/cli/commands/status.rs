//! `shortcast status` – backlog order, progress, skipped and stale entries.

use anyhow::Result;
use shortcast_core::config::ShortcastConfig;
use shortcast_core::content_store::ContentStore;
use shortcast_core::ledger::Ledger;
use shortcast_core::segmenter::{Ffmpeg, Segmenter};
use std::collections::BTreeSet;

pub fn run_status(cfg: &ShortcastConfig) -> Result<()> {
    let paths = cfg.resolve_paths()?;
    let store = ContentStore::from_config(cfg);
    let segmenter = Segmenter::new(
        Ffmpeg::from_config(&cfg.segment),
        paths.parts_dir,
        cfg.max_part_seconds,
    );
    let ledger = Ledger::load(&paths.ledger_path)?;
    let candidates = store.list_candidates()?;
    let skipped = store.list_unprocessable()?;

    if candidates.is_empty() {
        println!("Backlog {} is empty.", store.backlog_dir().display());
    } else {
        println!("{:<4} {:<10} {}", "#", "PARTS", "ITEM");
        for (n, item) in candidates.iter().enumerate() {
            let recorded = ledger.completed(&item.id);
            let done = recorded.map_or(0, |s| s.len());
            let progress = match &item.video {
                Some(video) => {
                    let duration = if recorded.is_some() {
                        segmenter.measured_duration(video).ok()
                    } else {
                        Some(segmenter.duration(video))
                    };
                    let total = duration
                        .and_then(|d| segmenter.compute_parts(&item.id, video, d).ok())
                        .map_or_else(|| "?".to_string(), |p| p.len().to_string());
                    format!("{}/{}", done, total)
                }
                None => "no video".to_string(),
            };
            println!("{:<4} {:<10} {}", n + 1, progress, item.id);
        }
    }

    if !skipped.is_empty() {
        println!();
        println!("Unprocessable:");
        for s in &skipped {
            println!("  {}: {}", s.id, s.reason);
        }
    }

    let known: BTreeSet<&str> = candidates
        .iter()
        .map(|c| c.id.as_str())
        .chain(skipped.iter().map(|s| s.id.as_str()))
        .collect();
    let stale: Vec<&String> = ledger
        .entries()
        .keys()
        .filter(|id| !known.contains(id.as_str()))
        .collect();
    if !stale.is_empty() {
        println!();
        println!("Ledger entries without a backlog item (clear with `shortcast forget <item>`):");
        for id in stale {
            println!("  {}", id);
        }
    }
    Ok(())
}
