use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Outcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
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

pub mod sync {
    use super::*;

    /// Server acknowledgment for an accepted push.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SyncAck {
        /// Server identity of the record (stable across devices).
        pub remote_id: Uuid,
        pub created_by_email: Option<String>,
        pub updated_by_email: Option<String>,
        /// Server-side write timestamp; the last-writer-wins reference clock.
        pub server_updated_at: DateTime<Utc>,
    }
}

pub mod budget {
    use super::*;

    /// Request body for pushing a local budget to the collaborative backend.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BudgetPush {
        /// Absent on the first push; the server assigns one in the ack.
        pub remote_id: Option<Uuid>,
        pub name: String,
        pub amount_minor: i64,
        pub created_on: NaiveDate,
        /// Local write timestamp the server compares for last-writer-wins.
        pub updated_at: DateTime<Utc>,
    }

    /// A budget as the server knows it.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub remote_id: Uuid,
        pub name: String,
        pub amount_minor: i64,
        pub created_on: NaiveDate,
        pub updated_at: DateTime<Utc>,
    }

    /// Response body for a budget push.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "status", rename_all = "snake_case")]
    pub enum BudgetPushOutcome {
        Accepted { ack: sync::SyncAck },
        /// The server holds a newer write; its version replaces the local one.
        Conflict { winner: BudgetView },
    }
}

pub mod entry {
    use super::*;

    /// Request body for pulling the entries of a shared budget.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct EntryPull {
        /// Server identity of the owning budget.
        pub budget: Uuid,
    }

    /// Request body for pushing a local entry to the collaborative backend.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct EntryPush {
        /// Absent on the first push; the server assigns one in the ack.
        pub remote_id: Option<Uuid>,
        /// Server identity of the owning budget.
        pub budget: Uuid,
        pub amount_minor: i64,
        pub description: String,
        pub kind: EntryKind,
        pub category: Category,
        pub date: NaiveDate,
        pub invoice: Option<String>,
        /// Local write timestamp the server compares for last-writer-wins.
        pub updated_at: DateTime<Utc>,
    }

    /// An entry as the server knows it.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct EntryView {
        pub remote_id: Uuid,
        pub amount_minor: i64,
        pub description: String,
        pub kind: EntryKind,
        pub category: Category,
        pub date: NaiveDate,
        pub invoice: Option<String>,
        pub created_by_email: Option<String>,
        pub updated_by_email: Option<String>,
        pub updated_at: DateTime<Utc>,
    }

    /// Response body for an entry push.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "status", rename_all = "snake_case")]
    pub enum EntryPushOutcome {
        Accepted { ack: sync::SyncAck },
        /// The server holds a newer write; its version replaces the local one.
        Conflict { winner: EntryView },
    }
}

pub mod collaboration {
    use super::*;

    /// Request body for joining a shared budget by code.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct JoinRequest {
        pub code: String,
    }

    /// Request body for sharing a budget already known to the server.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ShareRequest {
        pub budget: Uuid,
    }

    /// Response body carrying the shareable collaboration code.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ShareResponse {
        pub code: String,
    }

    /// The remote state of a shared budget, returned on a successful join.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BudgetSnapshot {
        pub budget: budget::BudgetView,
        pub entries: Vec<entry::EntryView>,
        pub code: String,
    }
}
