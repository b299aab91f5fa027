//! Folio CLI - Command line interface for portfolio snapshots and analytics.
//!
//! Every command prints a JSON `ApiResponse` on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use folio_core::{
    export::{import_positions_csv, import_positions_json, import_snapshots_json},
    ApiResponse, ExportFormat, PortfolioTracker, Position, Result, Timeframe,
};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio CLI - portfolio snapshots, performance and risk analytics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Position management commands
    Position {
        #[command(subcommand)]
        action: PositionAction,
    },
    /// Snapshot history commands
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Performance metrics over a window
    Metrics {
        /// 1d, 1w, 1m, 3m, 6m, 1y or all
        #[arg(short, long, default_value = "all")]
        timeframe: Timeframe,
    },
    /// Drawdown episodes over a window
    Drawdowns {
        #[arg(short, long, default_value = "all")]
        timeframe: Timeframe,
    },
    /// Herfindahl diversification of current positions
    Diversification,
    /// Sector allocation, performance and risk
    Sectors,
    /// Cross-sectional risk of current positions
    Risk,
    /// Export the snapshot history
    Export {
        /// json, csv or excel
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,
        #[arg(short, long, default_value = "all")]
        timeframe: Timeframe,
        /// Write to a file instead of embedding in the response
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import positions or snapshots
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },
}

#[derive(Subcommand)]
enum PositionAction {
    /// List all positions
    List,
    /// Add a position
    Add {
        /// Ticker symbol
        #[arg(short, long)]
        ticker: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        quantity: u64,
        /// Cost per share
        #[arg(short, long)]
        cost: f64,
        /// Current price per share (defaults to cost)
        #[arg(short, long)]
        price: Option<f64>,
    },
    /// Remove a position
    Remove {
        #[arg(short, long)]
        id: String,
    },
    /// Set the current price of a position
    Price {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        price: f64,
    },
    /// Set the quantity of a position (0 removes it)
    Quantity {
        #[arg(short, long)]
        id: String,
        #[arg(short = 'n', long)]
        quantity: u64,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Capture today's snapshot
    Take,
    /// List snapshots in a window
    List {
        #[arg(short, long, default_value = "all")]
        timeframe: Timeframe,
    },
    /// Delete a snapshot
    Delete {
        #[arg(short, long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Import positions from a JSON or CSV file
    Positions {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Import a snapshot history from a JSON export
    Snapshots {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (output, ok) = match run(cli.command) {
        Ok(data) => (respond(&ApiResponse::ok(data)), true),
        Err(e) => (respond(&ApiResponse::<()>::err(e.to_string())), false),
    };

    println!("{}", output);
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn respond<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|e| {
        format!(
            r#"{{"ok":false,"error":"failed to serialize response: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}

fn run(command: Commands) -> Result<serde_json::Value> {
    let mut tracker = PortfolioTracker::new()?;

    let data = match command {
        Commands::Position { action } => handle_position(&mut tracker, action)?,
        Commands::Snapshot { action } => handle_snapshot(&mut tracker, action)?,
        Commands::Metrics { timeframe } => json!({
            "timeframe": timeframe,
            "snapshotCount": tracker.snapshots(timeframe).len(),
            "metrics": tracker.performance(timeframe),
        }),
        Commands::Drawdowns { timeframe } => json!({
            "timeframe": timeframe,
            "drawdowns": tracker.drawdowns(timeframe),
        }),
        Commands::Diversification => serde_json::to_value(tracker.diversification())?,
        Commands::Sectors => json!({
            "allocation": tracker.sector_allocation(),
            "performance": tracker.sector_performance(),
            "risk": tracker.sector_risk(),
        }),
        Commands::Risk => serde_json::to_value(tracker.risk())?,
        Commands::Export {
            format,
            timeframe,
            output,
        } => {
            let rendered = tracker.export(format, timeframe)?;
            match output {
                Some(path) => {
                    fs::write(&path, &rendered)?;
                    json!({
                        "format": format,
                        "path": path,
                        "bytes": rendered.len(),
                    })
                }
                None => json!({
                    "format": format,
                    "content": rendered,
                }),
            }
        }
        Commands::Import { action } => handle_import(&mut tracker, action)?,
    };

    Ok(data)
}

fn handle_position(
    tracker: &mut PortfolioTracker,
    action: PositionAction,
) -> Result<serde_json::Value> {
    let data = match action {
        PositionAction::List => json!({
            "positions": tracker.positions(),
        }),
        PositionAction::Add {
            ticker,
            quantity,
            cost,
            price,
        } => {
            let position = Position::new(
                &Uuid::new_v4().to_string(),
                &ticker,
                cost,
                price.unwrap_or(cost),
                quantity,
            );
            let position = tracker.add_position(position)?;
            tracker.save()?;
            json!({ "position": position })
        }
        PositionAction::Remove { id } => {
            let removed = tracker.remove_position(&id)?;
            tracker.save()?;
            json!({ "removed": removed })
        }
        PositionAction::Price { id, price } => {
            let position = tracker.update_price(&id, price)?;
            tracker.save()?;
            json!({ "position": position })
        }
        PositionAction::Quantity { id, quantity } => {
            let position = tracker.update_quantity(&id, quantity)?;
            tracker.save()?;
            json!({
                "position": position,
                "removed": quantity == 0,
            })
        }
    };
    Ok(data)
}

fn handle_snapshot(
    tracker: &mut PortfolioTracker,
    action: SnapshotAction,
) -> Result<serde_json::Value> {
    let data = match action {
        SnapshotAction::Take => {
            let snapshot = tracker.take_snapshot()?;
            tracker.save()?;
            json!({ "snapshot": snapshot })
        }
        SnapshotAction::List { timeframe } => json!({
            "timeframe": timeframe,
            "snapshots": tracker.snapshots(timeframe),
        }),
        SnapshotAction::Delete { id } => {
            let removed = tracker.delete_snapshot(&id)?;
            tracker.save()?;
            json!({ "removed": removed })
        }
    };
    Ok(data)
}

fn handle_import(
    tracker: &mut PortfolioTracker,
    action: ImportAction,
) -> Result<serde_json::Value> {
    let data = match action {
        ImportAction::Positions { file } => {
            let content = fs::read_to_string(&file)?;
            let positions = if is_csv(&file) {
                import_positions_csv(&content)?
            } else {
                import_positions_json(&content)?
            };
            let imported = tracker.import_positions(positions)?;
            tracker.save()?;
            json!({ "imported": imported })
        }
        ImportAction::Snapshots { file } => {
            let content = fs::read_to_string(&file)?;
            let store = import_snapshots_json(&content)?;
            let imported = tracker.import_snapshots(store)?;
            tracker.save()?;
            json!({ "imported": imported })
        }
    };
    Ok(data)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
