/// Account lifecycle operations and account queries
pub mod account;
/// Account working set with compare-and-swap writes
pub mod balances;
/// Tagged event model and request validation
pub mod event;
/// Read projection: snapshots, change feed and audits
pub mod projection;
/// Bounded optimistic-concurrency retry
pub mod retry;
/// Ledger handle and per-user session
pub mod session;
/// User initialization
pub mod setup;
/// Balance-affecting event operations
pub mod transaction;

pub use session::{Ledger, Session};
