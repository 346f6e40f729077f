//! Locking protocols for moving funds between two accounts.
//!
//! Neither protocol ever blocks on an account lock while holding the registry
//! lock, and neither can deadlock: two-phase never holds two account locks at
//! once, atomic always acquires them in ascending id order.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::{Account, AccountError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Debit and credit are two separate critical sections.
    ///
    /// Between them the funds have left the source but not yet reached the
    /// destination, so an observer reading both balances can see a reduced
    /// total. Each account stays individually consistent throughout.
    ///
    /// Self-transfers have no such window: both legs land in the same log and
    /// each nets to zero, so the balance never dips between them.
    #[default]
    TwoPhase,
    /// Both account locks are held for the whole transfer, so no observer can
    /// see funds in flight.
    Atomic,
}

#[derive(Debug, Error)]
#[error("Unknown transfer mode `{0}`, expected `two-phase` or `atomic`")]
pub struct UnknownTransferMode(String);

impl FromStr for TransferMode {
    type Err = UnknownTransferMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-phase" => Ok(Self::TwoPhase),
            "atomic" => Ok(Self::Atomic),
            _ => Err(UnknownTransferMode(s.to_owned())),
        }
    }
}

pub(super) fn two_phase(
    source: &Account,
    dest: &Account,
    amount: Decimal,
) -> Result<(), AccountError> {
    if source.id() != dest.id() {
        dest.read_state().ensure_headroom(amount)?;
    }
    source.lock().debit_transfer(dest.id(), amount)?;
    // funds are in flight here, source lock already released
    settle_credit(source, dest, amount)
}

/// Credits the destination, or hands the funds back to the source when a
/// concurrent deposit used up the destination's headroom since the check.
fn settle_credit(source: &Account, dest: &Account, amount: Decimal) -> Result<(), AccountError> {
    let Err(err) = dest.lock().credit_transfer(source.id(), amount) else {
        return Ok(());
    };
    match source.lock().credit_transfer(dest.id(), amount) {
        Ok(()) => {
            tracing::debug!(from = source.id(), to = dest.id(), %amount, "transfer refunded");
        }
        Err(refund_err) => {
            tracing::error!(
                from = source.id(),
                to = dest.id(),
                %amount,
                %refund_err,
                "transfer could be neither credited nor refunded"
            );
        }
    }
    Err(err)
}

pub(super) fn atomic(
    source: &Account,
    dest: &Account,
    amount: Decimal,
) -> Result<(), AccountError> {
    if source.id() == dest.id() {
        let mut guard = source.lock();
        guard.debit_transfer(dest.id(), amount)?;
        return guard.credit_transfer(source.id(), amount);
    }

    let (mut source_guard, mut dest_guard) = if source.id() < dest.id() {
        let source_guard = source.lock();
        (source_guard, dest.lock())
    } else {
        let dest_guard = dest.lock();
        (source.lock(), dest_guard)
    };
    // both locks are held, so the headroom cannot shrink before the credit
    dest_guard.ensure_headroom(amount)?;
    source_guard.debit_transfer(dest.id(), amount)?;
    dest_guard.credit_transfer(source.id(), amount)
}
