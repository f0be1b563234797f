use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailSends::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailSends::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailSends::WorkspaceId).string().not_null())
                    .col(ColumnDef::new(EmailSends::CampaignId).string().not_null())
                    .col(ColumnDef::new(EmailSends::ContactId).string())
                    .col(ColumnDef::new(EmailSends::ToEmail).string().not_null())
                    .col(ColumnDef::new(EmailSends::FromEmail).string())
                    .col(ColumnDef::new(EmailSends::Subject).string().not_null())
                    .col(
                        ColumnDef::new(EmailSends::Status)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(EmailSends::ExecuteAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailSends::SentAt).big_integer())
                    .col(ColumnDef::new(EmailSends::OpenedAt).big_integer())
                    .col(ColumnDef::new(EmailSends::ClickedAt).big_integer())
                    .col(ColumnDef::new(EmailSends::ProviderMessageId).string())
                    .col(ColumnDef::new(EmailSends::ScheduleId).string())
                    .col(ColumnDef::new(EmailSends::AbVariant).string())
                    .col(
                        ColumnDef::new(EmailSends::IsTest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EmailSends::Meta)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(EmailSends::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSends::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The scheduler's upsert key. NULL schedule_ids stay distinct, so
        // one-shot sends are unaffected.
        manager
            .create_index(
                Index::create()
                    .name("idx_email_sends_schedule_recipient")
                    .table(EmailSends::Table)
                    .col(EmailSends::WorkspaceId)
                    .col(EmailSends::ScheduleId)
                    .col(EmailSends::ToEmail)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_sends_status_execute_at")
                    .table(EmailSends::Table)
                    .col(EmailSends::WorkspaceId)
                    .col(EmailSends::Status)
                    .col(EmailSends::ExecuteAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailSends::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum EmailSends {
    Table,
    Id,
    WorkspaceId,
    CampaignId,
    ContactId,
    ToEmail,
    FromEmail,
    Subject,
    Status,
    ExecuteAt,
    SentAt,
    OpenedAt,
    ClickedAt,
    ProviderMessageId,
    ScheduleId,
    AbVariant,
    IsTest,
    Meta,
    CreatedAt,
    UpdatedAt,
}
