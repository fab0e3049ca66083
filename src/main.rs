// Draw Engine - CLI
// Operator entry point: reconciliation jobs, funding and import previews.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use draw_engine::{
    preview_budget_file, verify_audit_chain, BudgetRecords, CategoryMatcher, EngineConfig,
    FundingRequest, InvoiceFlagReconciler, StuckInvoiceFilter, StuckProcessReconciler,
    SqliteStore, SystemClock, WireBatchFunder,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "draw-engine")]
#[command(about = "Invoice matching and draw reconciliation engine")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "DRAW_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init,

    /// Time out invoices whose extraction callback never arrived
    ReconcileStuck {
        #[arg(long)]
        draw: Option<String>,

        /// Defaults to stuck_after_minutes from config
        #[arg(long)]
        older_than_minutes: Option<f64>,

        #[arg(long)]
        auto_retry: bool,
    },

    /// Recompute NO_INVOICE flags for one draw
    ReconcileFlags {
        #[arg(long)]
        draw: String,
    },

    /// Fund staged draws in one wire batch
    Fund {
        #[arg(long)]
        builder: String,

        /// Repeat for each draw
        #[arg(long = "draw", required = true)]
        draws: Vec<String>,

        /// RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        funded_at: String,

        #[arg(long)]
        wire_reference: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Best budget category of a project for a label
    Match {
        label: String,

        #[arg(long)]
        project: String,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Match a category,amount CSV against a project's budget
    PreviewImport {
        file: PathBuf,

        #[arg(long)]
        project: String,
    },

    /// Re-hash the audit log and report the first broken link
    VerifyAudit,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "draw_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;
    let store = open_store(&config.database_path)?;
    let clock = SystemClock;

    match cli.command {
        Command::Init => {
            info!(path = %config.database_path.display(), "database ready");
            println!("✓ Database initialized at {}", config.database_path.display());
        }

        Command::ReconcileStuck {
            draw,
            older_than_minutes,
            auto_retry,
        } => {
            let filter = StuckInvoiceFilter {
                draw_request_id: draw,
                older_than_minutes: older_than_minutes.unwrap_or(config.stuck_after_minutes as f64),
                auto_retry_once: auto_retry,
            };
            let report = StuckProcessReconciler::new(&store, &clock).reconcile(&filter)?;
            print_json(&report)?;
        }

        Command::ReconcileFlags { draw } => {
            let report = InvoiceFlagReconciler::new(&store).reconcile(&draw)?;
            print_json(&report)?;
        }

        Command::Fund {
            builder,
            draws,
            funded_at,
            wire_reference,
            notes,
        } => {
            let request = FundingRequest {
                builder_id: Some(builder),
                draw_ids: Some(draws),
                funded_at: Some(funded_at),
                wire_reference,
                notes,
            };
            let result = WireBatchFunder::new(&store, &clock)
                .with_actor(&config.actor)
                .fund(&request)?;
            if !result.is_complete() {
                eprintln!(
                    "⚠️  {} draw(s) were not funded; batch {} needs manual reconciliation",
                    result.failed_draws.len(),
                    result.batch_id
                );
            }
            print_json(&result)?;
        }

        Command::Match {
            label,
            project,
            threshold,
        } => {
            let budget = store.budget_lines_for_project(&project)?;
            let matcher =
                CategoryMatcher::with_threshold(threshold.unwrap_or(config.match_threshold));
            match matcher.find_best_match(&label, &budget) {
                Some(found) => println!(
                    "✓ {} → {} ({:.2})",
                    label, found.candidate.category, found.score
                ),
                None => println!("✗ No budget category of {} matches {:?}", project, label),
            }
        }

        Command::PreviewImport { file, project } => {
            let budget = store.budget_lines_for_project(&project)?;
            let matcher = CategoryMatcher::with_threshold(config.match_threshold);
            let preview = preview_budget_file(&file, &budget, &matcher)?;
            print_json(&preview)?;
        }

        Command::VerifyAudit => {
            let report = verify_audit_chain(&store)?;
            if report.is_intact() {
                println!("✅ Audit chain intact ({} events)", report.events_checked);
            } else {
                print_json(&report)?;
                anyhow::bail!("audit chain broken");
            }
        }
    }

    Ok(())
}
