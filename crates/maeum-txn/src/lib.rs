//! Maeum Txn - transactional file mutations with undo/redo
//!
//! File changes are grouped into transactions (one tool call, or a batch),
//! applied atomically with on-disk backups, and retained on an undo stack
//! bounded by a transaction count and a byte budget.

pub mod change;
pub mod fileops;
pub mod manager;

pub use change::{Change, ChangeStatus, Operation, Transaction, TxnStatus};
pub use manager::{TransactionManager, TxnError, TxnResult};
