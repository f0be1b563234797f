use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AutomationRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AutomationRuns::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::AutomationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::ContactId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::Status)
                            .string()
                            .not_null()
                            .default("running"),
                    )
                    .col(ColumnDef::new(AutomationRuns::CurrentStepId).string())
                    .col(
                        ColumnDef::new(AutomationRuns::StartedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AutomationRuns::FinishedAt).big_integer())
                    .col(ColumnDef::new(AutomationRuns::LastError).text())
                    .col(
                        ColumnDef::new(AutomationRuns::Meta)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationRuns::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AutomationRuns::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum AutomationRuns {
    Table,
    Id,
    WorkspaceId,
    AutomationId,
    ContactId,
    Status,
    CurrentStepId,
    StartedAt,
    FinishedAt,
    LastError,
    Meta,
    CreatedAt,
    UpdatedAt,
}
