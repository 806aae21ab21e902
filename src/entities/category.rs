//! Category entity - One label in a user's ordered income or expense category list.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Owning user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// `"income"` or `"expense"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: String,
    /// Position within the list, starting at zero
    #[sea_orm(primary_key, auto_increment = false)]
    pub position: i32,
    /// Label shown in category pickers
    pub label: String,
}

/// `Category` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
