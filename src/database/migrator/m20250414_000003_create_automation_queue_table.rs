use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AutomationQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AutomationQueue::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AutomationQueue::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AutomationQueue::RunId).string().not_null())
                    .col(
                        ColumnDef::new(AutomationQueue::AutomationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationQueue::ContactId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AutomationQueue::StepId).string().not_null())
                    .col(
                        ColumnDef::new(AutomationQueue::ExecuteAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationQueue::Status)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(AutomationQueue::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AutomationQueue::LastError).text())
                    .col(ColumnDef::new(AutomationQueue::Payload).text())
                    .col(
                        ColumnDef::new(AutomationQueue::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutomationQueue::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_automation_queue_status_execute_at")
                    .table(AutomationQueue::Table)
                    .col(AutomationQueue::WorkspaceId)
                    .col(AutomationQueue::Status)
                    .col(AutomationQueue::ExecuteAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AutomationQueue::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum AutomationQueue {
    Table,
    Id,
    WorkspaceId,
    RunId,
    AutomationId,
    ContactId,
    StepId,
    ExecuteAt,
    Status,
    Attempts,
    LastError,
    Payload,
    CreatedAt,
    UpdatedAt,
}
