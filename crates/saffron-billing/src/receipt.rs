//! # Receipts
//!
//! The serializable artifact handed to whatever prints or files the receipt,
//! and a JSON emitter used by the CLI.
//!
//! ```text
//!  Settlement ──► Receipt { bill, payment?, taxSplit, issuedAt }
//!                   │
//!                   ├── ReceiptTarget::Stdout     → pretty JSON on stdout
//!                   └── ReceiptTarget::Directory  → receipt-{bill_id}.json
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use saffron_core::{Bill, Payment, TaxSplit};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::ReceiptError;
use crate::ports::ReceiptEmitter;

/// Everything printed on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub bill: Bill,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    /// Tax shown as two halves (CGST / SGST).
    pub tax_split: TaxSplit,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(bill: &Bill, payment: Option<&Payment>) -> Self {
        Receipt {
            bill: bill.clone(),
            payment: payment.cloned(),
            tax_split: TaxSplit::of(bill.tax),
            issued_at: Utc::now(),
        }
    }

    /// `receipt-<bill id>.json`. The bill id comes from the server, so
    /// anything other than ASCII letters, digits, `-` and `_` becomes `_`.
    pub fn file_name(&self) -> String {
        let id: String = self
            .bill
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("receipt-{}.json", id)
    }
}

/// Where [`JsonReceiptEmitter`] writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptTarget {
    Stdout,
    Directory(PathBuf),
}

/// Writes each receipt as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonReceiptEmitter {
    target: ReceiptTarget,
}

impl JsonReceiptEmitter {
    pub fn new(target: ReceiptTarget) -> Self {
        JsonReceiptEmitter { target }
    }

    pub fn stdout() -> Self {
        Self::new(ReceiptTarget::Stdout)
    }

    pub fn to_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(ReceiptTarget::Directory(dir.into()))
    }
}

#[async_trait]
impl ReceiptEmitter for JsonReceiptEmitter {
    async fn emit(&self, bill: &Bill, payment: Option<&Payment>) -> Result<(), ReceiptError> {
        if !bill.paid {
            return Err(ReceiptError::Rejected(format!("bill {} is not paid", bill.id)));
        }

        let receipt = Receipt::new(bill, payment);
        let mut json = serde_json::to_vec_pretty(&receipt)?;
        json.push(b'\n');

        match &self.target {
            ReceiptTarget::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(&json).await?;
                out.flush().await?;
            }
            ReceiptTarget::Directory(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(receipt.file_name());
                tokio::fs::write(&path, &json).await?;
                info!(bill_id = %bill.id, path = %path.display(), "Receipt written");
            }
        }

        Ok(())
    }
}
