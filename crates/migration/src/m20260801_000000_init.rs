//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Borsello:
//!
//! - `budgets`: named spending plans with a target amount
//! - `budget_entries`: income/outcome transactions recorded against a budget
//!
//! Amounts are stored as integer cents. Dates are ISO text
//! (`YYYY-MM-DD`), sync timestamps are UTC timestamps.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    Name,
    AmountMinor,
    CreatedOn,
    IsSynced,
    RemoteId,
    CollabCode,
    UpdatedAt,
}

#[derive(Iden)]
enum BudgetEntries {
    Table,
    Id,
    BudgetId,
    AmountMinor,
    Description,
    Kind,
    Category,
    EntryDate,
    Invoice,
    IsSynced,
    RemoteId,
    CreatedByEmail,
    UpdatedByEmail,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Budgets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(
                        ColumnDef::new(Budgets::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Budgets::CreatedOn).date().not_null())
                    .col(
                        ColumnDef::new(Budgets::IsSynced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Budgets::RemoteId).string())
                    .col(ColumnDef::new(Budgets::CollabCode).string())
                    .col(ColumnDef::new(Budgets::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BudgetEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BudgetEntries::BudgetId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetEntries::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BudgetEntries::Kind).string().not_null())
                    .col(ColumnDef::new(BudgetEntries::Category).string().not_null())
                    .col(ColumnDef::new(BudgetEntries::EntryDate).date().not_null())
                    .col(ColumnDef::new(BudgetEntries::Invoice).string())
                    .col(
                        ColumnDef::new(BudgetEntries::IsSynced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BudgetEntries::RemoteId).string())
                    .col(ColumnDef::new(BudgetEntries::CreatedByEmail).string())
                    .col(ColumnDef::new(BudgetEntries::UpdatedByEmail).string())
                    .col(
                        ColumnDef::new(BudgetEntries::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_entries-budget_id")
                            .from(BudgetEntries::Table, BudgetEntries::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-budget_entries-budget_id")
                    .table(BudgetEntries::Table)
                    .col(BudgetEntries::BudgetId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BudgetEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await
    }
}
