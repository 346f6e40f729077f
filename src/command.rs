use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    account::AccountId,
    registry::{AccountRegistry, RegistryError},
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Create {
        id: AccountId,
    },
    Deposit {
        id: AccountId,
        amount: Decimal,
    },
    Withdraw {
        id: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
}

#[derive(Debug, Error)]
pub enum LedgerCommandError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: OperationKind },
    #[error("Amount is not expected for {kind:?}")]
    UnexpectedAmount { kind: OperationKind },
    #[error("Counterparty is required for {kind:?}")]
    CounterpartyRequired { kind: OperationKind },
    #[error("Counterparty is not expected for {kind:?}")]
    UnexpectedCounterparty { kind: OperationKind },
}

impl LedgerCommand {
    /// Checks the shape of an operation row.
    ///
    /// Amount sign is not checked here, the ledger rejects non-positive
    /// amounts itself.
    pub fn parse_command(
        kind: OperationKind,
        account: AccountId,
        counterparty: Option<AccountId>,
        amount: Option<Decimal>,
    ) -> Result<Self, LedgerCommandError> {
        match kind {
            OperationKind::Create => {
                if amount.is_some() {
                    return Err(LedgerCommandError::UnexpectedAmount { kind });
                }
                Self::no_counterparty(kind, counterparty)?;
                Ok(Self::Create { id: account })
            }
            OperationKind::Deposit => {
                Self::no_counterparty(kind, counterparty)?;
                Ok(Self::Deposit {
                    id: account,
                    amount: Self::require_amount(kind, amount)?,
                })
            }
            OperationKind::Withdraw => {
                Self::no_counterparty(kind, counterparty)?;
                Ok(Self::Withdraw {
                    id: account,
                    amount: Self::require_amount(kind, amount)?,
                })
            }
            OperationKind::Transfer => {
                let Some(to) = counterparty else {
                    return Err(LedgerCommandError::CounterpartyRequired { kind });
                };
                Ok(Self::Transfer {
                    from: account,
                    to,
                    amount: Self::require_amount(kind, amount)?,
                })
            }
        }
    }

    fn require_amount(
        kind: OperationKind,
        amount: Option<Decimal>,
    ) -> Result<Decimal, LedgerCommandError> {
        amount.ok_or(LedgerCommandError::AmountRequired { kind })
    }

    fn no_counterparty(
        kind: OperationKind,
        counterparty: Option<AccountId>,
    ) -> Result<(), LedgerCommandError> {
        match counterparty {
            Some(_) => Err(LedgerCommandError::UnexpectedCounterparty { kind }),
            None => Ok(()),
        }
    }

    pub fn execute(&self, registry: &AccountRegistry) -> Result<(), RegistryError> {
        match self {
            Self::Create { id } => registry.create_account(id.as_str()),
            Self::Deposit { id, amount } => Ok(registry.get_account(id)?.deposit(*amount)?),
            Self::Withdraw { id, amount } => Ok(registry.get_account(id)?.withdraw(*amount)?),
            Self::Transfer { from, to, amount } => registry.transfer(from, to, *amount),
        }
    }
}
