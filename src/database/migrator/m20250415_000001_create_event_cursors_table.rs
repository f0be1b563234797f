use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventCursors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventCursors::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventCursors::ConsumerId).string().not_null())
                    .col(
                        ColumnDef::new(EventCursors::LastOccurredAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(EventCursors::LastEventId).string())
                    .col(
                        ColumnDef::new(EventCursors::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(EventCursors::WorkspaceId)
                            .col(EventCursors::ConsumerId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventCursors::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum EventCursors {
    Table,
    WorkspaceId,
    ConsumerId,
    LastOccurredAt,
    LastEventId,
    UpdatedAt,
}
