use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId, validate_amount},
    clock::{Clock, SystemClock},
};

pub mod transfer;

pub use transfer::{TransferMode, UnknownTransferMode};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Account `{id}` already exists")]
    AlreadyExists { id: AccountId },
    #[error("Account `{id}` not found")]
    NotFound { id: AccountId },
    #[error(transparent)]
    AccountErr(#[from] AccountError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfig {
    pub transfer_mode: TransferMode,
}

/// Directory of accounts, keyed by id, and coordinator of transfers.
///
/// The map lock is only held to insert or resolve handles, it is always
/// released before any account lock is taken.
#[derive(Debug)]
pub struct AccountRegistry {
    accounts: RwLock<HashMap<AccountId, Arc<Account>>>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn create_account(&self, id: impl Into<AccountId>) -> Result<(), RegistryError> {
        let id = id.into();
        let mut accounts = self.accounts.write();
        match accounts.entry(id) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyExists {
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let account = Account::new(entry.key().clone(), self.clock.clone());
                tracing::debug!(account = %entry.key(), "account created");
                entry.insert(Arc::new(account));
                Ok(())
            }
        }
    }

    pub fn get_account(&self, id: &str) -> Result<Arc<Account>, RegistryError> {
        self.accounts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_owned() })
    }

    /// Moves `amount` from one account to another.
    ///
    /// Locking depends on [`RegistryConfig::transfer_mode`], see [`TransferMode`].
    pub fn transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Decimal,
    ) -> Result<(), RegistryError> {
        let amount = validate_amount(amount)?;
        let (source, dest) = self.resolve_pair(from_id, to_id)?;
        match self.config.transfer_mode {
            TransferMode::TwoPhase => transfer::two_phase(&source, &dest, amount)?,
            TransferMode::Atomic => transfer::atomic(&source, &dest, amount)?,
        }
        tracing::debug!(from = from_id, to = to_id, %amount, "transfer completed");
        Ok(())
    }

    /// Both handles come from one read-lock section, so a concurrent create
    /// can never satisfy only half of the lookup.
    fn resolve_pair(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> Result<(Arc<Account>, Arc<Account>), RegistryError> {
        let accounts = self.accounts.read();
        let lookup = |id: &str| {
            accounts
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound { id: id.to_owned() })
        };
        Ok((lookup(from_id)?, lookup(to_id)?))
    }

    /// Balances of several accounts read at one instant, sorted by id with
    /// duplicates removed.
    ///
    /// Read locks are taken in ascending id order, the order atomic transfers
    /// lock in, so the snapshot never contains half of an atomic transfer.
    /// Two-phase transfers can still show up with funds in flight.
    pub fn snapshot_balances(
        &self,
        ids: &[&str],
    ) -> Result<Vec<(AccountId, Decimal)>, RegistryError> {
        let mut accounts = {
            let map = self.accounts.read();
            ids.iter()
                .map(|id| {
                    map.get(*id)
                        .cloned()
                        .ok_or_else(|| RegistryError::NotFound { id: (*id).to_owned() })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        accounts.sort_unstable_by(|a, b| a.id().cmp(b.id()));
        accounts.dedup_by(|a, b| a.id() == b.id());

        let guards: Vec<_> = accounts.iter().map(|acc| acc.read_state()).collect();
        Ok(accounts
            .iter()
            .zip(&guards)
            .map(|(acc, state)| (acc.id().to_owned(), state.balance()))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// All account ids in ascending order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self.accounts.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}
