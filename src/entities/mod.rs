//! Entity module - Contains all SeaORM entity definitions for the ledger store.
//! Every table is keyed by `user_id` first, so each user's ledger is an isolated keyspace.
//! Each entity has a Model struct for data and an Entity struct for operations.

/// Accounts and their balances
pub mod account;
/// Per-user category lists
pub mod category;
/// Ledger events, one row each
pub mod transaction;
/// Initialized users and their event ordering counter
pub mod user_profile;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user_profile::{
    Column as UserProfileColumn, Entity as UserProfile, Model as UserProfileModel,
};
