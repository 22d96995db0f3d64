//! # settle
//!
//! Closes one restaurant table against the back-office API.
//!
//! ## Flow
//! ```text
//!  args ──► BillingConfig::load ──► request.json ──► bill preview
//!                                                        │
//!                                  --preview ◄───────────┤
//!                                                        ▼
//!  HttpBillingRemote + OrderCache + JsonReceiptEmitter ──► close_table
//!                                                        │
//!                                                        ▼
//!                                 receipt JSON, warnings, exit code
//! ```
//!
//! Exit code is 0 when the table was settled (even with warnings), 1 when
//! the settlement failed or could not start, 2 on bad arguments.

mod args;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use saffron_api::HttpBillingRemote;
use saffron_billing::{
    BillingConfig, BillingOrchestrator, CacheBackend, CloseTableRequest, JsonReceiptEmitter,
    MemoryOrderCache, OrderCache, TracingObserver,
};
use saffron_core::{preview_order, Actor, BillTotals};
use saffron_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    run(args).await
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,saffron=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = BillingConfig::load(args.config.clone()).context("loading billing config")?;
    info!(
        api = %config.remote.base_url,
        cache = %config.cache.backend,
        "Configuration loaded"
    );

    let raw = tokio::fs::read_to_string(&args.request)
        .await
        .with_context(|| format!("reading {}", args.request.display()))?;
    let request: CloseTableRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.request.display()))?;

    let preview = preview_order(&request.order, &config.billing.bill_inputs(&request.order));
    print_preview(&request, &preview);
    if preview.is_negative() {
        warn!(total = %preview.total, "Discount exceeds the amount owed");
    }

    if args.preview_only {
        return Ok(());
    }

    let remote = HttpBillingRemote::new(&config.remote).context("building API client")?;
    let cache = open_cache(&config).await?;
    let receipts = match &args.receipts {
        Some(dir) => JsonReceiptEmitter::to_directory(dir),
        None => JsonReceiptEmitter::stdout(),
    };

    let orchestrator = BillingOrchestrator::new(
        Arc::new(remote),
        cache,
        Arc::new(receipts),
        config.billing.clone(),
    )
    .with_observer(Arc::new(TracingObserver));

    let actor = Actor::new(args.user_id.clone(), args.acting_role());
    let run = orchestrator.close_table(&actor, &request).await;

    for warning in run.user_warnings() {
        eprintln!("warning: {}", warning);
    }
    if let Some(delay) = run.redirect_after {
        info!(delay_ms = delay.as_millis() as u64, "Returning to the table view");
    }

    match run.into_result() {
        Ok(settlement) => {
            eprintln!(
                "Settled {} for table {}: {} paid{}",
                settlement.bill.id,
                request.order.table_number,
                settlement.bill.total,
                if settlement.table_freed { "" } else { " (table still occupied)" }
            );
            Ok(())
        }
        Err(e) => bail!("[{}] {}", e.code(), e),
    }
}

async fn open_cache(config: &BillingConfig) -> Result<Arc<dyn OrderCache>> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryOrderCache::new())),
        CacheBackend::Sqlite => {
            let path = config
                .cache
                .resolved_path()
                .context("no cache path configured and no data directory available")?;
            let db = Database::new(DbConfig::new(&path))
                .await
                .with_context(|| format!("opening order cache at {}", path.display()))?;
            Ok(Arc::new(db.order_cache()))
        }
    }
}

fn print_preview(request: &CloseTableRequest, totals: &BillTotals) {
    // Money's Display ignores width flags, so amounts are padded as strings
    let line = |label: &str, amount: String| eprintln!("  {:<30} {:>12}", label, amount);
    let split = totals.tax_split();

    eprintln!("Table {} / order {}", request.order.table_number, request.order.id);
    for item in &request.order.items {
        line(
            &format!("{:>3} x {}", item.quantity, item.name),
            item.line_total().to_string(),
        );
    }
    line("Subtotal", totals.subtotal.to_string());
    if !totals.discount.is_zero() {
        line("Discount", format!("-{}", totals.discount));
    }
    line("CGST", split.first.to_string());
    line("SGST", split.second.to_string());
    if !totals.service_charge.is_zero() {
        line("Service charge", totals.service_charge.to_string());
    }
    line("Total", totals.total.to_string());
    eprintln!("  Payment: {}", request.method);
}
