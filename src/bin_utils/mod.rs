//! Replays a CSV list of operations against an [`AccountRegistry`] and prints
//! the resulting state, so the ledger can be driven from a binary.

use std::io::{Read, Write};

use crate::{
    command::{LedgerCommand, LedgerCommandError},
    registry::{AccountRegistry, RegistryError},
};
use anyhow::Result;
use csv_parser::{CsvOperationParser, Operation};
use csv_printer::{AccountSummary, HistoryEntry, print_rows};
use thiserror::Error;
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Malformed row: {0}")]
    ParseErr(#[from] csv::Error),
    #[error(transparent)]
    CommandErr(#[from] LedgerCommandError),
    #[error(transparent)]
    LedgerErr(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Report {
    /// One row per account with its final balance.
    #[default]
    Balances,
    /// One row per log record, accounts in id order.
    History,
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub registry: AccountRegistry,
    pub report: Report,
    pub error_printer: Box<dyn FnMut(u64, ProcessError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);

        for (line, row) in parser {
            if let Err(err) = Self::process_row(&self.registry, row) {
                (self.error_printer)(line, err);
            }
        }

        let accounts = self
            .registry
            .account_ids()
            .into_iter()
            .map(|id| self.registry.get_account(&id))
            .collect::<Result<Vec<_>, _>>()?;

        match self.report {
            Report::Balances => print_rows(
                self.output,
                accounts.iter().map(|acc| AccountSummary {
                    account: acc.id().to_owned(),
                    balance: acc.balance(),
                    transactions: acc.history().len(),
                }),
            ),
            Report::History => print_rows(
                self.output,
                accounts.iter().flat_map(|acc| {
                    acc.history().into_iter().map(move |record| HistoryEntry {
                        account: acc.id().to_owned(),
                        kind: record.kind(),
                        amount: record.amount(),
                        from: record.source_id().map(ToOwned::to_owned),
                        to: record.dest_id().map(ToOwned::to_owned),
                        timestamp: record.timestamp().to_rfc3339(),
                    })
                }),
            ),
        }
    }

    fn process_row(
        registry: &AccountRegistry,
        row: Result<Operation, csv::Error>,
    ) -> Result<(), ProcessError> {
        let row = row?;
        let cmd =
            LedgerCommand::parse_command(row.kind, row.account, row.counterparty, row.amount)?;
        cmd.execute(registry)?;
        Ok(())
    }
}
