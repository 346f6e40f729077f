use std::io::Write;

use crate::{account::AccountId, transaction::TransactionKind};
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub account: AccountId,
    pub balance: Decimal,
    pub transactions: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub account: AccountId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub timestamp: String,
}

pub fn print_rows<W, T>(output: &mut W, rows: impl Iterator<Item = T>) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        if let Err(err) = writer.serialize(row) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
