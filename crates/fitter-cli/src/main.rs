// ============================================================================
// fitter-db — CLI inspection tool for the Virtual Fitter calibration store
// ============================================================================
// Usage:
//   fitter-db stats                 Show store statistics
//   fitter-db list                  List persisted garment overrides
//   fitter-db export --format json  Export the override map as JSON
//   fitter-db clear --yes           Erase the persisted override record
// ============================================================================

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use fitter_core::OverrideStore;

/// Virtual Fitter calibration store inspection tool
#[derive(Parser)]
#[command(name = "fitter-db", version, about = "Inspect and manage the virtual fitter calibration store")]
struct Cli {
    /// Path to the store file (default: ~/.virtual-fitter/fitter.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store statistics (override count, record size)
    Stats,

    /// List persisted per-garment overrides
    List,

    /// Export the override map as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Erase the persisted override record (the fitter falls back to
    /// slot defaults on next launch)
    Clear {
        /// Confirm the erase
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = OverrideStore::open(cli.db_path.as_deref())?;

    match cli.command {
        Commands::Stats => cmd_stats(&store),
        Commands::List => cmd_list(&store),
        Commands::Export { format } => cmd_export(&store, &format),
        Commands::Clear { yes } => cmd_clear(&store, yes),
    }
}

fn cmd_stats(store: &OverrideStore) -> Result<()> {
    let stats = store.stats()?;

    println!("=== Virtual Fitter Calibration Store ===");
    println!("Store:     {}", store.path().display());
    println!();
    println!("Overrides: {}", stats.entries);
    println!("Record:    {} bytes", stats.record_bytes);

    Ok(())
}

fn cmd_list(store: &OverrideStore) -> Result<()> {
    let overrides = store.load()?;

    if overrides.is_empty() {
        println!("No persisted overrides.");
        return Ok(());
    }

    println!(
        "{:<12}  {:>10}  {:>10}  {:>8}",
        "ITEM ID", "OFFSET X", "OFFSET Y", "SCALE"
    );
    println!("{}", "-".repeat(48));

    let mut ids: Vec<_> = overrides.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let patch = &overrides[&id];
        println!(
            "{:<12}  {:>10}  {:>10}  {:>8}",
            id,
            fmt_field(patch.offset_x_pct),
            fmt_field(patch.offset_y_pct),
            fmt_field(patch.scale),
        );
    }

    println!("\nTotal: {} overrides", overrides.len());
    Ok(())
}

fn fmt_field(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".into())
}

fn cmd_export(store: &OverrideStore, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let overrides = store.load()?;
    let stats = store.stats()?;

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": stats,
        "overrides": overrides,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_clear(store: &OverrideStore, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to erase without --yes");
    }

    if store.clear()? {
        println!("Persisted override record erased.");
    } else {
        println!("No persisted record to erase.");
    }
    Ok(())
}
