//! Batch maintenance over the shared stores.
//!
//! - Import: seed the cross-reference cache from every user library file
//! - Sort: rewrite the cache ascending by AppID
//! - Refresh rarity / lengths: re-query the sources for cached entries
//! - Refresh registry: drop AppIDs that have gained achievements

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;

use crate::config::DataPaths;
use crate::identity::SteamId;
use crate::length::refresh_by_id;
use crate::models::{AppId, CrossReferenceEntry, MaintenanceReport};
use crate::progress::{create_progress_bar, tick};
use crate::scoring::rarity;
use crate::sources::{CatalogSource, LengthSource};
use crate::store::{CrossReferenceStore, LibraryStore, NoAchievementsRegistry};

// ============================================================================
// Import & Sort
// ============================================================================

/// Per-user library files in the data directory, ordered by file name.
/// A file counts when its stem is a valid SteamID.
pub fn library_files(paths: &DataPaths) -> Result<Vec<PathBuf>> {
    let dir = paths.dir();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let is_user = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.parse::<SteamId>().is_ok());
        if is_json && is_user && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy matched records from every user library into the cross-reference
/// cache. Records without a length match are not copied. AppIDs already
/// cached with a match are left alone; across files the first one seen
/// wins. Returns how many entries were added or filled in.
pub fn import_cross_references(paths: &DataPaths) -> Result<usize> {
    let cache = CrossReferenceStore::open(paths.cross_reference());
    let mut seen: FxHashSet<AppId> = cache
        .index()
        .context("Failed to read cross-reference cache")?
        .into_values()
        .filter(|e| e.length.is_resolved())
        .map(|e| e.app_id)
        .collect();

    let mut new_entries = Vec::new();
    for path in library_files(paths)? {
        let records = LibraryStore::open(&path)
            .load()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let before = new_entries.len();
        new_entries.extend(
            records
                .iter()
                .filter(|r| r.length.is_resolved() && seen.insert(r.app_id))
                .map(CrossReferenceEntry::from),
        );
        tracing::debug!(file = %path.display(), new = new_entries.len() - before, "scanned library");
    }

    if new_entries.is_empty() {
        tracing::info!("No new entries added.");
        return Ok(0);
    }
    let added = cache
        .insert_new(&new_entries)
        .context("Failed to save cross-reference cache")?;
    tracing::info!("Added {} new entries to {}", added, cache.path().display());
    Ok(added)
}

/// Rewrite the cache ascending by AppID. Returns the entry count.
pub fn sort_cross_references(paths: &DataPaths) -> Result<usize> {
    let cache = CrossReferenceStore::open(paths.cross_reference());
    let count = cache.sort().context("Failed to sort cross-reference cache")?;
    tracing::info!("Sorted {} entries in {}", count, cache.path().display());
    Ok(count)
}

// ============================================================================
// Source Refreshes
// ============================================================================

/// Recompute the rarest percentage of every cached entry.
///
/// Entries whose app now reports no achievements, or whose fetch fails,
/// keep their stored value and are counted as `not_found` or `failed`.
pub fn refresh_rarity<C: CatalogSource>(
    catalog: &C,
    cache: &CrossReferenceStore,
) -> Result<MaintenanceReport> {
    let mut entries = cache.load().context("Failed to read cross-reference cache")?;
    let mut report = MaintenanceReport::default();

    let pb = create_progress_bar(entries.len() as u64, "Updating rarest achievements");
    for entry in entries.iter_mut() {
        report.examined += 1;
        match catalog.global_achievements(entry.app_id) {
            Ok(achievements) if achievements.is_empty() => {
                report.not_found += 1;
                pb.suspend(|| tracing::warn!(app_id = entry.app_id, "no achievement data, rarity kept"));
            }
            Ok(achievements) => match rarity(&achievements) {
                Some(value) if value != entry.rarest_achievement => {
                    entry.rarest_achievement = value;
                    report.updated += 1;
                }
                Some(_) => report.unchanged += 1,
                None => {
                    report.failed += 1;
                    pb.suspend(|| tracing::warn!(app_id = entry.app_id, "no usable achievement percentage"));
                }
            },
            Err(e) => {
                report.failed += 1;
                pb.suspend(|| tracing::warn!(app_id = entry.app_id, error = %e, "rarity not refreshed"));
            }
        }
        tick(&pb, "rarity");
    }
    pb.finish_and_clear();

    if report.updated > 0 {
        cache.save(&entries).context("Failed to save cross-reference cache")?;
    }
    tracing::info!(
        updated = report.updated,
        unchanged = report.unchanged,
        not_found = report.not_found,
        failed = report.failed,
        "refreshed rarest achievement percentages"
    );
    Ok(report)
}

/// Re-resolve every cached entry that has a length-source id.
///
/// Entries without an id are skipped and not counted. Lookup failures and
/// ids the source no longer knows are logged and left as they are.
pub fn refresh_lengths<L: LengthSource>(
    length: &L,
    cache: &CrossReferenceStore,
) -> Result<MaintenanceReport> {
    let mut entries = cache.load().context("Failed to read cross-reference cache")?;
    let mut report = MaintenanceReport::default();

    let with_id = entries.iter().filter(|e| e.length.hltb_id.is_some()).count();
    let pb = create_progress_bar(with_id as u64, "Updating completionist times");

    for entry in entries.iter_mut() {
        let Some(id) = entry.length.hltb_id else {
            continue;
        };
        report.examined += 1;

        match refresh_by_id(length, id) {
            Ok(Some(fresh)) => {
                let hours = fresh.completionist_hours;
                if hours != entry.length.completionist_hours {
                    entry.length.completionist_hours = hours;
                    report.updated += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            Ok(None) => {
                report.not_found += 1;
                pb.suspend(|| tracing::warn!(app_id = entry.app_id, hltb_id = id, "length-source id not found"));
            }
            Err(e) => {
                report.failed += 1;
                pb.suspend(|| {
                    tracing::warn!(
                        app_id = entry.app_id,
                        hltb_id = id,
                        title = %entry.title,
                        "Error processing length-source id: {}",
                        e
                    )
                });
            }
        }
        tick(&pb, "lengths");
    }
    pb.finish_and_clear();

    if report.updated > 0 {
        cache.save(&entries).context("Failed to save cross-reference cache")?;
    }
    tracing::info!(
        updated = report.updated,
        unchanged = report.unchanged,
        not_found = report.not_found,
        failed = report.failed,
        "refreshed completionist times"
    );
    Ok(report)
}

/// Re-check every registry AppID and drop the ones that now have
/// achievements, so the next sync scrapes them. A failed fetch keeps the
/// entry. Returns how many were removed.
pub fn refresh_no_achievements<C: CatalogSource>(
    catalog: &C,
    registry: &NoAchievementsRegistry,
) -> Result<usize> {
    let ids = registry
        .load()
        .context("Failed to read no-achievements registry")?;

    let pb = create_progress_bar(ids.len() as u64, "Updating no-achievement games");
    let mut kept = BTreeSet::new();
    for &app_id in &ids {
        match catalog.global_achievements(app_id) {
            Ok(achievements) if !achievements.is_empty() => {}
            Ok(_) => {
                kept.insert(app_id);
            }
            Err(e) => {
                pb.suspend(|| tracing::warn!(app_id, error = %e, "kept in registry"));
                kept.insert(app_id);
            }
        }
        tick(&pb, "registry");
    }
    pb.finish_and_clear();

    let removed = ids.len() - kept.len();
    if removed > 0 {
        registry
            .replace(&kept)
            .context("Failed to save no-achievements registry")?;
        tracing::info!(
            "Removed {} games with achievements from {}",
            removed,
            registry.path().display()
        );
    } else {
        tracing::info!("No games with achievements found in the registry.");
    }
    Ok(removed)
}
