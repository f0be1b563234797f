use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContactEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContactEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContactEvents::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContactEvents::ContactId).string().not_null())
                    .col(ColumnDef::new(ContactEvents::EventType).string().not_null())
                    .col(
                        ColumnDef::new(ContactEvents::OccurredAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContactEvents::CampaignId).string())
                    .col(
                        ColumnDef::new(ContactEvents::Meta)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(ContactEvents::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Cursor consumers scan by (workspace, occurred_at) ascending.
        manager
            .create_index(
                Index::create()
                    .name("idx_contact_events_workspace_occurred")
                    .table(ContactEvents::Table)
                    .col(ContactEvents::WorkspaceId)
                    .col(ContactEvents::OccurredAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContactEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ContactEvents {
    Table,
    Id,
    WorkspaceId,
    ContactId,
    EventType,
    OccurredAt,
    CampaignId,
    Meta,
    CreatedAt,
}
