//! The module contains the `Entry` struct, its closed enums and its
//! persistence model.
//!
//! An `Entry` is one income or outcome transaction recorded against a
//! budget.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

/// Direction of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Income,
    Outcome,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Outcome => "outcome",
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "outcome" => Ok(Self::Outcome),
            other => Err(EngineError::Validation(format!(
                "invalid entry kind: {other}"
            ))),
        }
    }
}

impl From<EntryKind> for api_types::EntryKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Income => Self::Income,
            EntryKind::Outcome => Self::Outcome,
        }
    }
}

impl From<api_types::EntryKind> for EntryKind {
    fn from(kind: api_types::EntryKind) -> Self {
        match kind {
            api_types::EntryKind::Income => Self::Income,
            api_types::EntryKind::Outcome => Self::Outcome,
        }
    }
}

/// Spending category of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Food,
    Groceries,
    Transportation,
    Housing,
    Utilities,
    Health,
    Entertainment,
    Shopping,
    Travel,
    Education,
    Salary,
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 12] = [
        Self::Food,
        Self::Groceries,
        Self::Transportation,
        Self::Housing,
        Self::Utilities,
        Self::Health,
        Self::Entertainment,
        Self::Shopping,
        Self::Travel,
        Self::Education,
        Self::Salary,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Groceries => "groceries",
            Self::Transportation => "transportation",
            Self::Housing => "housing",
            Self::Utilities => "utilities",
            Self::Health => "health",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Travel => "travel",
            Self::Education => "education",
            Self::Salary => "salary",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for Category {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "food" => Ok(Self::Food),
            "groceries" => Ok(Self::Groceries),
            "transportation" => Ok(Self::Transportation),
            "housing" => Ok(Self::Housing),
            "utilities" => Ok(Self::Utilities),
            "health" => Ok(Self::Health),
            "entertainment" => Ok(Self::Entertainment),
            "shopping" => Ok(Self::Shopping),
            "travel" => Ok(Self::Travel),
            "education" => Ok(Self::Education),
            "salary" => Ok(Self::Salary),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid category: {other}"
            ))),
        }
    }
}

impl From<Category> for api_types::Category {
    fn from(category: Category) -> Self {
        match category {
            Category::Food => Self::Food,
            Category::Groceries => Self::Groceries,
            Category::Transportation => Self::Transportation,
            Category::Housing => Self::Housing,
            Category::Utilities => Self::Utilities,
            Category::Health => Self::Health,
            Category::Entertainment => Self::Entertainment,
            Category::Shopping => Self::Shopping,
            Category::Travel => Self::Travel,
            Category::Education => Self::Education,
            Category::Salary => Self::Salary,
            Category::Other => Self::Other,
        }
    }
}

impl From<api_types::Category> for Category {
    fn from(category: api_types::Category) -> Self {
        match category {
            api_types::Category::Food => Self::Food,
            api_types::Category::Groceries => Self::Groceries,
            api_types::Category::Transportation => Self::Transportation,
            api_types::Category::Housing => Self::Housing,
            api_types::Category::Utilities => Self::Utilities,
            api_types::Category::Health => Self::Health,
            api_types::Category::Entertainment => Self::Entertainment,
            api_types::Category::Shopping => Self::Shopping,
            api_types::Category::Travel => Self::Travel,
            api_types::Category::Education => Self::Education,
            api_types::Category::Salary => Self::Salary,
            api_types::Category::Other => Self::Other,
        }
    }
}

/// An entry that has not been persisted yet.
///
/// Drafts carry no identifier at all: the store assigns one atomically on
/// insert and returns the persisted [`Entry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    pub budget_id: i64,
    pub amount: MoneyCents,
    pub description: String,
    pub kind: EntryKind,
    pub category: Category,
    pub date: NaiveDate,
    /// Optional path to an attached invoice file.
    pub invoice: Option<String>,
}

/// A persisted entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub budget_id: i64,
    pub amount: MoneyCents,
    pub description: String,
    pub kind: EntryKind,
    pub category: Category,
    pub date: NaiveDate,
    pub invoice: Option<String>,
    pub is_synced: bool,
    /// Server identity, assigned by the first sync ack.
    pub remote_id: Option<Uuid>,
    pub created_by_email: Option<String>,
    pub updated_by_email: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budget_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub budget_id: i64,
    pub amount_minor: i64,
    pub description: String,
    pub kind: String,
    pub category: String,
    pub entry_date: NaiveDate,
    pub invoice: Option<String>,
    pub is_synced: bool,
    pub remote_id: Option<String>,
    pub created_by_email: Option<String>,
    pub updated_by_email: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Budgets,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Entry> for ActiveModel {
    fn from(entry: &Entry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id),
            budget_id: ActiveValue::Set(entry.budget_id),
            amount_minor: ActiveValue::Set(entry.amount.cents()),
            description: ActiveValue::Set(entry.description.clone()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            category: ActiveValue::Set(entry.category.as_str().to_string()),
            entry_date: ActiveValue::Set(entry.date),
            invoice: ActiveValue::Set(entry.invoice.clone()),
            is_synced: ActiveValue::Set(entry.is_synced),
            remote_id: ActiveValue::Set(entry.remote_id.map(|id| id.to_string())),
            created_by_email: ActiveValue::Set(entry.created_by_email.clone()),
            updated_by_email: ActiveValue::Set(entry.updated_by_email.clone()),
            updated_at: ActiveValue::Set(entry.updated_at),
        }
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            budget_id: model.budget_id,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            kind: EntryKind::try_from(model.kind.as_str())?,
            category: Category::try_from(model.category.as_str())?,
            date: model.entry_date,
            invoice: model.invoice,
            is_synced: model.is_synced,
            remote_id: model.remote_id.and_then(|s| Uuid::parse_str(&s).ok()),
            created_by_email: model.created_by_email,
            updated_by_email: model.updated_by_email,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [EntryKind::Income, EntryKind::Outcome] {
            assert_eq!(EntryKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(EntryKind::try_from("transfer").is_err());
    }

    #[test]
    fn category_round_trips_through_strings() {
        for category in Category::ALL {
            assert_eq!(Category::try_from(category.as_str()).unwrap(), category);
        }
        assert!(Category::try_from("misc").is_err());
    }
}
