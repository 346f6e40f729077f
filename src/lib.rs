/// Single account: balance plus append-only log, guarded by its own lock.
pub mod account;

/// Immutable records stored in account logs.
pub mod transaction;

/// Time source for record timestamps, swappable for tests.
pub mod clock;

/// Account directory and transfer coordination.
///
/// Transfers come in two flavours, see [`registry::TransferMode`]: the
/// default two-phase protocol releases the source lock before crediting the
/// destination, the atomic one holds both locks taken in id order.
pub mod registry;

/// Operation rows turned into ledger calls. Used by [`bin_utils`].
pub mod command;

/// CSV replay harness. Lives in the library so integration tests can drive it
/// the same way the binary does.
pub mod bin_utils;

pub use account::{Account, AccountError, AccountId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{AccountRegistry, RegistryConfig, RegistryError, TransferMode};
pub use transaction::{TransactionKind, TransactionRecord};
