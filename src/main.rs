use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use steam_completionist::config::{Config, DataPaths, DEFAULT_DATA_DIR};
use steam_completionist::hltb::HltbClient;
use steam_completionist::identity::{resolve_vanity, SteamId};
use steam_completionist::maintenance::{
    import_cross_references, refresh_lengths, refresh_no_achievements, refresh_rarity,
    sort_cross_references,
};
use steam_completionist::models::{MaintenanceReport, SyncReport};
use steam_completionist::progress::{format_duration, init_tracing, set_log_only};
use steam_completionist::steam::SteamClient;
use steam_completionist::store::{CrossReferenceStore, NoAchievementsRegistry};
use steam_completionist::sync::{Reconciler, Stores};

#[derive(Parser)]
#[command(name = "steam-completionist")]
#[command(about = "Scrape a Steam library with achievement rarity and HowLongToBeat completionist times")]
#[command(group(
    ArgGroup::new("mode")
        .multiple(false)
        .args([
            "steamid",
            "vanity",
            "update_no_achievements",
            "import_cross_ref",
            "sort_cross_ref",
            "refresh_rarity",
            "refresh_lengths",
        ]),
))]
struct Args {
    /// Sync the library of this SteamID64
    #[arg(short = 's', long)]
    steamid: Option<String>,

    /// Sync the library of this profile vanity name
    #[arg(short = 'v', long)]
    vanity: Option<String>,

    /// Drop registry AppIDs that have gained achievements
    #[arg(short = 'u', long)]
    update_no_achievements: bool,

    /// Seed the cross-reference cache from every user library
    #[arg(long)]
    import_cross_ref: bool,

    /// Rewrite the cross-reference cache ordered by AppID
    #[arg(long)]
    sort_cross_ref: bool,

    /// Re-fetch rarest achievement percentages for cached games
    #[arg(long)]
    refresh_rarity: bool,

    /// Re-fetch completionist times for cached games
    #[arg(long)]
    refresh_lengths: bool,

    #[arg(long, env = "STEAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// SteamID synced when no mode is given
    #[arg(long = "default-steamid", env = "STEAM_ID")]
    default_steamid: Option<String>,

    #[arg(long, env = "STEAM_COMPLETIONIST_DATA", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Hide progress bars, log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write sync statistics as JSON to this file
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

/// Which user to sync, by precedence: --steamid, --vanity, default
fn resolve_user(args: &Args, config: &Config) -> Result<SteamId> {
    if let Some(raw) = &args.steamid {
        return Ok(raw.parse()?);
    }
    if let Some(name) = &args.vanity {
        let steam = SteamClient::new(config.require_api_key()?)?;
        let user = resolve_vanity(&steam, name)?;
        println!("Resolved vanity name '{}' to SteamID {}", name.trim(), user);
        return Ok(user);
    }
    config.default_steam_id()
}

fn run_sync(args: &Args, config: &Config) -> Result<SyncReport> {
    let user = resolve_user(args, config)?;
    let steam = SteamClient::new(config.require_api_key()?)?;
    let hltb = HltbClient::new()?;

    // First Ctrl-C stops after the game in flight; a second one exits
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        tracing::warn!("Interrupted; finishing the current game. Press Ctrl-C again to abort.");
    })
    .context("Failed to install Ctrl-C handler")?;

    println!("Syncing library for SteamID {}", user);
    let stores = Stores::for_user(&config.paths, user);
    let report = Reconciler::new(steam, hltb)
        .with_cancel_flag(cancel)
        .sync(user, &stores)?;

    println!("\n{:=<60}", "");
    println!("Sync complete!");
    println!("  Owned: {}", report.owned);
    println!("  New: {}", report.pending);
    println!("  Processed: {}", report.processed());
    println!("  Saved: {}", report.saved);
    println!("  No achievements: {}", report.no_achievements);
    println!("  Skipped with error: {}", report.skipped_with_error);
    println!(
        "  Length cache hits: {} / searches: {} / misses: {}",
        report.cache_hits, report.length_lookups, report.length_misses
    );
    if report.cancelled {
        println!("  Cancelled before finishing");
    }
    println!("  Library: {}", stores.library.path().display());
    println!("{:=<60}", "");

    Ok(report)
}

fn print_maintenance(label: &str, report: &MaintenanceReport) {
    println!(
        "{}: {} examined, {} updated, {} unchanged, {} not found, {} failed",
        label, report.examined, report.updated, report.unchanged, report.not_found, report.failed
    );
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    set_log_only(args.log_only);
    init_tracing();

    let start = Instant::now();
    let config = Config::new(
        args.api_key.clone(),
        args.default_steamid.clone(),
        &args.data_dir,
    );
    let paths: &DataPaths = &config.paths;

    if args.update_no_achievements {
        let steam = SteamClient::new(config.require_api_key()?)?;
        let registry = NoAchievementsRegistry::open(paths.no_achievements());
        let removed = refresh_no_achievements(&steam, &registry)?;
        println!("Removed {} games from {}", removed, registry.path().display());
    } else if args.import_cross_ref {
        let added = import_cross_references(paths)?;
        println!("Added {} new entries to the cross-reference cache", added);
    } else if args.sort_cross_ref {
        let count = sort_cross_references(paths)?;
        println!("Sorted {} cross-reference entries by AppID", count);
    } else if args.refresh_rarity {
        let steam = SteamClient::new(config.require_api_key()?)?;
        let cache = CrossReferenceStore::open(paths.cross_reference());
        print_maintenance("Rarity refresh", &refresh_rarity(&steam, &cache)?);
    } else if args.refresh_lengths {
        let hltb = HltbClient::new()?;
        let cache = CrossReferenceStore::open(paths.cross_reference());
        print_maintenance("Length refresh", &refresh_lengths(&hltb, &cache)?);
    } else {
        let report = run_sync(&args, &config)?;
        if let Some(path) = &args.stats_json {
            report
                .write_to_file(path)
                .with_context(|| format!("Failed to write stats to {}", path.display()))?;
            println!("Stats written to {}", path.display());
        }
    }

    println!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
