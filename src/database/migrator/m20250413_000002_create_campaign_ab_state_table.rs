use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CampaignAbState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignAbState::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignAbState::ScheduleId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignAbState::Status)
                            .string()
                            .not_null()
                            .default("testing"),
                    )
                    .col(
                        ColumnDef::new(CampaignAbState::TestEndAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CampaignAbState::WinnerSubject).string())
                    .col(
                        ColumnDef::new(CampaignAbState::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignAbState::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CampaignAbState::WorkspaceId)
                            .col(CampaignAbState::ScheduleId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampaignAbState::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CampaignAbState {
    Table,
    WorkspaceId,
    ScheduleId,
    Status,
    TestEndAt,
    WinnerSubject,
    CreatedAt,
    UpdatedAt,
}
