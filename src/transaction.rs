use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

/// One balance-affecting event in an account's log.
///
/// Records are created by the ledger itself and never change afterwards, so
/// fields are only readable through getters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    kind: TransactionKind,
    amount: Decimal,
    source_id: Option<AccountId>,
    dest_id: Option<AccountId>,
    timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub(crate) fn deposit(dest_id: AccountId, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: TransactionKind::Deposit,
            amount,
            source_id: None,
            dest_id: Some(dest_id),
            timestamp,
        }
    }

    pub(crate) fn withdrawal(
        source_id: AccountId,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TransactionKind::Withdraw,
            amount,
            source_id: Some(source_id),
            dest_id: None,
            timestamp,
        }
    }

    pub(crate) fn transfer(
        source_id: AccountId,
        dest_id: AccountId,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            amount,
            source_id: Some(source_id),
            dest_id: Some(dest_id),
            timestamp,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Always strictly positive; the direction is carried by `kind` and the ids.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn dest_id(&self) -> Option<&str> {
        self.dest_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Contribution of this record to the balance of `account_id`, the owner
    /// of the log it is stored in.
    ///
    /// Both legs of a self-transfer contribute zero.
    pub fn signed_amount(&self, account_id: &str) -> Decimal {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdraw => -self.amount,
            TransactionKind::Transfer => {
                let is_source = self.source_id() == Some(account_id);
                let is_dest = self.dest_id() == Some(account_id);
                match (is_source, is_dest) {
                    (true, false) => -self.amount,
                    (false, true) => self.amount,
                    _ => Decimal::ZERO,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn signed_amounts() {
        let ts = DateTime::<Utc>::UNIX_EPOCH;
        let deposit = TransactionRecord::deposit("a".into(), dec!(10), ts);
        assert_eq!(deposit.signed_amount("a"), dec!(10));
        assert_eq!(deposit.source_id(), None);
        assert_eq!(deposit.dest_id(), Some("a"));

        let withdrawal = TransactionRecord::withdrawal("a".into(), dec!(4), ts);
        assert_eq!(withdrawal.signed_amount("a"), dec!(-4));
        assert_eq!(withdrawal.source_id(), Some("a"));
        assert_eq!(withdrawal.dest_id(), None);

        let transfer = TransactionRecord::transfer("a".into(), "b".into(), dec!(2.5), ts);
        assert_eq!(transfer.kind(), TransactionKind::Transfer);
        assert_eq!(transfer.signed_amount("a"), dec!(-2.5));
        assert_eq!(transfer.signed_amount("b"), dec!(2.5));
        // record stored in an unrelated log has no effect
        assert_eq!(transfer.signed_amount("c"), Decimal::ZERO);

        let self_transfer = TransactionRecord::transfer("a".into(), "a".into(), dec!(3), ts);
        assert_eq!(self_transfer.signed_amount("a"), Decimal::ZERO);
    }
}
