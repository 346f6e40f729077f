use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{clock::Clock, transaction::TransactionRecord};

pub type AccountId = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Balance {balance} cannot absorb {amount} more")]
    BalanceOverflow { balance: Decimal, amount: Decimal },
}

/// Rejects zero and negative amounts before any lock is taken.
pub(crate) fn validate_amount(amount: Decimal) -> Result<Decimal, AccountError> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(AccountError::InvalidAmount { amount })
    }
}

#[derive(Debug, Default)]
pub(crate) struct AccountState {
    balance: Decimal,
    log: Vec<TransactionRecord>,
}

impl AccountState {
    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    /// The log is the source of truth, balance follows whatever gets appended.
    /// Nothing is appended if the new balance does not fit.
    fn apply(&mut self, owner: &str, record: TransactionRecord) -> Result<(), AccountError> {
        let delta = record.signed_amount(owner);
        let Some(balance) = self.balance.checked_add(delta) else {
            return Err(AccountError::BalanceOverflow {
                balance: self.balance,
                amount: delta,
            });
        };
        self.balance = balance;
        self.log.push(record);
        Ok(())
    }

    pub(crate) fn ensure_headroom(&self, amount: Decimal) -> Result<(), AccountError> {
        match self.balance.checked_add(amount) {
            Some(_) => Ok(()),
            None => Err(AccountError::BalanceOverflow {
                balance: self.balance,
                amount,
            }),
        }
    }

    fn ensure_funds(&self, requested: Decimal) -> Result<(), AccountError> {
        if self.balance >= requested {
            Ok(())
        } else {
            Err(AccountError::InsufficientFunds {
                requested,
                available: self.balance,
            })
        }
    }

    /// Timestamps in one log never go backwards, even if the clock does.
    fn stamp(&self, clock: &dyn Clock) -> DateTime<Utc> {
        let now = clock.now();
        match self.log.last() {
            Some(last) if last.timestamp() > now => last.timestamp(),
            _ => now,
        }
    }
}

/// One balance and its append-only log.
///
/// Every mutation takes the same write lock, so operations on a single
/// account are totally ordered. Queries take the read lock.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    clock: Arc<dyn Clock>,
    state: RwLock<AccountState>,
}

impl Account {
    pub(crate) fn new(id: AccountId, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            clock,
            state: RwLock::new(AccountState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn deposit(&self, amount: Decimal) -> Result<(), AccountError> {
        let amount = validate_amount(amount)?;
        let mut state = self.state.write();
        let record = TransactionRecord::deposit(self.id.clone(), amount, state.stamp(&*self.clock));
        state.apply(&self.id, record)?;
        tracing::trace!(account = %self.id, %amount, balance = %state.balance, "deposited");
        Ok(())
    }

    pub fn withdraw(&self, amount: Decimal) -> Result<(), AccountError> {
        let amount = validate_amount(amount)?;
        let mut state = self.state.write();
        state.ensure_funds(amount)?;
        let record =
            TransactionRecord::withdrawal(self.id.clone(), amount, state.stamp(&*self.clock));
        state.apply(&self.id, record)?;
        tracing::trace!(account = %self.id, %amount, balance = %state.balance, "withdrawn");
        Ok(())
    }

    pub fn balance(&self) -> Decimal {
        self.state.read().balance
    }

    /// Snapshot of the log. Changing the returned vector does not touch the account.
    pub fn history(&self) -> Vec<TransactionRecord> {
        self.state.read().log.clone()
    }

    /// Shared access for reads spanning several accounts.
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, AccountState> {
        self.state.read()
    }

    /// Exclusive access for the transfer legs driven by the registry.
    pub(crate) fn lock(&self) -> AccountGuard<'_> {
        AccountGuard {
            account: self,
            state: self.state.write(),
        }
    }
}

pub(crate) struct AccountGuard<'a> {
    account: &'a Account,
    state: RwLockWriteGuard<'a, AccountState>,
}

impl AccountGuard<'_> {
    pub(crate) fn ensure_headroom(&self, amount: Decimal) -> Result<(), AccountError> {
        self.state.ensure_headroom(amount)
    }

    /// Debit leg of a transfer. Fails without touching state if funds are short.
    pub(crate) fn debit_transfer(
        &mut self,
        dest_id: &str,
        amount: Decimal,
    ) -> Result<(), AccountError> {
        self.state.ensure_funds(amount)?;
        let id = &self.account.id;
        let record = TransactionRecord::transfer(
            id.clone(),
            dest_id.to_owned(),
            amount,
            self.state.stamp(&*self.account.clock),
        );
        self.state.apply(id, record)?;
        tracing::trace!(account = %id, to = dest_id, %amount, "transfer debited");
        Ok(())
    }

    /// Credit leg of a transfer. Fails without touching state if the balance
    /// would overflow.
    pub(crate) fn credit_transfer(
        &mut self,
        source_id: &str,
        amount: Decimal,
    ) -> Result<(), AccountError> {
        let id = &self.account.id;
        let record = TransactionRecord::transfer(
            source_id.to_owned(),
            id.clone(),
            amount,
            self.state.stamp(&*self.account.clock),
        );
        self.state.apply(id, record)?;
        tracing::trace!(account = %id, from = source_id, %amount, "transfer credited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use crate::{clock::ManualClock, transaction::TransactionKind};

    use super::*;

    fn account(id: &str) -> Account {
        Account::new(id.to_owned(), Arc::new(ManualClock::default()))
    }

    fn log_sum(acc: &Account) -> Decimal {
        acc.history()
            .iter()
            .map(|record| record.signed_amount(acc.id()))
            .sum()
    }

    #[test]
    fn deposit_and_withdraw() {
        let acc = account("u1");
        assert_eq!(acc.balance(), Decimal::ZERO);
        assert!(acc.history().is_empty());

        acc.deposit(dec!(100)).unwrap();
        assert_eq!(acc.balance(), dec!(100));

        acc.withdraw(dec!(30.5)).unwrap();
        assert_eq!(acc.balance(), dec!(69.5));
        assert_eq!(log_sum(&acc), acc.balance());

        let history = acc.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind(), TransactionKind::Deposit);
        assert_eq!(history[0].dest_id(), Some("u1"));
        assert_eq!(history[0].source_id(), None);
        assert_eq!(history[1].kind(), TransactionKind::Withdraw);
        assert_eq!(history[1].source_id(), Some("u1"));
        assert_eq!(history[1].dest_id(), None);
        assert_eq!(history[1].amount(), dec!(30.5));
    }

    #[test]
    fn invalid_amounts_are_no_ops() {
        let acc = account("u1");
        acc.deposit(dec!(10)).unwrap();

        for amount in [Decimal::ZERO, dec!(-5)] {
            let err = acc.deposit(amount).unwrap_err();
            assert_eq!(err, AccountError::InvalidAmount { amount });
            let err = acc.withdraw(amount).unwrap_err();
            assert_eq!(err, AccountError::InvalidAmount { amount });
        }
        assert_eq!(acc.balance(), dec!(10));
        assert_eq!(acc.history().len(), 1);
    }

    #[test]
    fn insufficient_funds_is_a_no_op() {
        let acc = account("u1");
        acc.deposit(dec!(10)).unwrap();

        let err = acc.withdraw(dec!(10.01)).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientFunds {
                requested: dec!(10.01),
                available: dec!(10),
            }
        );
        assert_eq!(
            err.to_string(),
            "Insufficient funds: requested 10.01, available 10"
        );
        assert_eq!(acc.balance(), dec!(10));
        assert_eq!(acc.history().len(), 1);

        // draining to exactly zero is fine
        acc.withdraw(dec!(10)).unwrap();
        assert_eq!(acc.balance(), Decimal::ZERO);
    }

    #[test]
    fn overflowing_deposit_is_a_no_op() {
        let acc = account("u1");
        acc.deposit(Decimal::MAX).unwrap();

        let err = acc.deposit(Decimal::ONE).unwrap_err();
        assert_eq!(
            err,
            AccountError::BalanceOverflow {
                balance: Decimal::MAX,
                amount: Decimal::ONE,
            }
        );
        assert_eq!(acc.balance(), Decimal::MAX);
        assert_eq!(acc.history().len(), 1);

        let err = acc.lock().credit_transfer("u2", Decimal::ONE).unwrap_err();
        assert!(matches!(err, AccountError::BalanceOverflow { .. }));
        assert_eq!(acc.history().len(), 1);

        // still usable afterwards
        acc.withdraw(Decimal::ONE).unwrap();
        acc.deposit(Decimal::ONE).unwrap();
        assert_eq!(acc.balance(), Decimal::MAX);
    }

    #[test]
    fn history_is_a_snapshot() {
        let acc = account("u1");
        acc.deposit(dec!(5)).unwrap();

        let mut history = acc.history();
        history.clear();
        history.push(TransactionRecord::deposit(
            "u1".into(),
            dec!(1000),
            DateTime::<Utc>::UNIX_EPOCH,
        ));

        assert_eq!(acc.history().len(), 1);
        assert_eq!(acc.history()[0].amount(), dec!(5));
        assert_eq!(acc.balance(), dec!(5));
    }

    #[test]
    fn transfer_legs() {
        let acc = account("u1");
        acc.deposit(dec!(20)).unwrap();
        {
            let mut guard = acc.lock();
            let err = guard.debit_transfer("u2", dec!(21)).unwrap_err();
            assert!(matches!(err, AccountError::InsufficientFunds { .. }));
            guard.debit_transfer("u2", dec!(15)).unwrap();
            guard.credit_transfer("u3", dec!(1)).unwrap();
        }
        assert_eq!(acc.balance(), dec!(6));
        assert_eq!(log_sum(&acc), dec!(6));

        let history = acc.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].kind(), TransactionKind::Transfer);
        assert_eq!(history[1].source_id(), Some("u1"));
        assert_eq!(history[1].dest_id(), Some("u2"));
        assert_eq!(history[2].source_id(), Some("u3"));
        assert_eq!(history[2].dest_id(), Some("u1"));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let clock = Arc::new(ManualClock::default());
        let acc = Account::new("u1".into(), clock.clone());

        clock.advance(Duration::seconds(10));
        acc.deposit(dec!(1)).unwrap();
        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        acc.deposit(dec!(1)).unwrap();
        clock.advance(Duration::seconds(20));
        acc.deposit(dec!(1)).unwrap();

        let stamps: Vec<_> = acc.history().iter().map(|r| r.timestamp()).collect();
        let start = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(
            stamps,
            vec![
                start + Duration::seconds(10),
                start + Duration::seconds(10),
                start + Duration::seconds(20),
            ]
        );
    }
}
