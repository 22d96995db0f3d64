//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use saffron_core::Role;

/// Closes one table: marks the order served, raises the bill, records the
/// payment, frees the table and emits the receipt.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "settle", version)]
pub struct Args {
    /// Order snapshot and payment method, as JSON
    pub request: PathBuf,

    /// Role of the person closing the table
    #[arg(long, env = "SAFFRON_ROLE", required_unless_present = "preview_only")]
    pub role: Option<Role>,

    /// User id recorded in logs
    #[arg(long = "user", value_name = "ID", default_value = "cli")]
    pub user_id: String,

    /// billing.toml to load instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write receipt-<bill>.json here instead of stdout
    #[arg(long, value_name = "DIR")]
    pub receipts: Option<PathBuf>,

    /// Print the bill preview and exit without calling the API
    #[arg(long = "preview")]
    pub preview_only: bool,
}

impl Args {
    /// Role used for the settlement. Preview runs may omit it.
    pub fn acting_role(&self) -> Role {
        self.role
            .clone()
            .unwrap_or_else(|| Role::Other("preview".into()))
    }
}
