//! The module contains the `Budget` struct and its persistence model.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

/// A budget that has not been persisted yet.
///
/// Drafts carry no identifier at all: the store assigns one atomically on
/// insert and returns the persisted [`Budget`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBudget {
    pub name: String,
    /// Target amount the user plans to spend.
    pub amount: MoneyCents,
    pub created_on: NaiveDate,
}

/// A persisted budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Budget {
    pub id: i64,
    pub name: String,
    /// Target amount the user plans to spend.
    pub amount: MoneyCents,
    pub created_on: NaiveDate,
    /// Sum of the outcome entries recorded against this budget.
    ///
    /// Derived at snapshot time, never stored.
    pub total_expenses: MoneyCents,
    pub is_synced: bool,
    /// Server identity, assigned by the first sync ack.
    pub remote_id: Option<Uuid>,
    /// Present once the budget has been shared or joined.
    pub collab_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub amount_minor: i64,
    pub created_on: NaiveDate,
    pub is_synced: bool,
    pub remote_id: Option<String>,
    pub collab_code: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id),
            name: ActiveValue::Set(budget.name.clone()),
            amount_minor: ActiveValue::Set(budget.amount.cents()),
            created_on: ActiveValue::Set(budget.created_on),
            is_synced: ActiveValue::Set(budget.is_synced),
            remote_id: ActiveValue::Set(budget.remote_id.map(|id| id.to_string())),
            collab_code: ActiveValue::Set(budget.collab_code.clone()),
            updated_at: ActiveValue::Set(budget.updated_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            amount: MoneyCents::new(model.amount_minor),
            created_on: model.created_on,
            total_expenses: MoneyCents::ZERO,
            is_synced: model.is_synced,
            remote_id: model.remote_id.and_then(|s| Uuid::parse_str(&s).ok()),
            collab_code: model.collab_code,
            updated_at: model.updated_at,
        })
    }
}
