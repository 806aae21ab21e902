//! User profile entity - Marks a user as initialized and owns the event sequence counter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    /// User identifier supplied by the authentication collaborator
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Sign-in email, if known
    pub email: Option<String>,
    /// Name shown in the interface, if known
    pub display_name: Option<String>,
    /// Next value handed out as an event ordering key
    pub next_sequence: i64,
    /// When setup completed
    pub created_at: DateTimeUtc,
}

/// `UserProfile` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
