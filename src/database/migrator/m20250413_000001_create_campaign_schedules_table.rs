use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CampaignSchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignSchedules::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::WorkspaceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::CampaignId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::Mode)
                            .string()
                            .not_null()
                            .default("fixed_time"),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::WindowStart)
                            .string()
                            .not_null()
                            .default("09:00"),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::WindowEnd)
                            .string()
                            .not_null()
                            .default("17:00"),
                    )
                    .col(ColumnDef::new(CampaignSchedules::Timezone).string())
                    .col(
                        ColumnDef::new(CampaignSchedules::NextRunAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::AbEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(CampaignSchedules::AbSubjectA).string())
                    .col(ColumnDef::new(CampaignSchedules::AbSubjectB).string())
                    .col(ColumnDef::new(CampaignSchedules::AbSubjectC).string())
                    .col(
                        ColumnDef::new(CampaignSchedules::AbTestFraction)
                            .double()
                            .not_null()
                            .default(0.2),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::AbWaitMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::AbMetric)
                            .string()
                            .not_null()
                            .default("opens"),
                    )
                    .col(ColumnDef::new(CampaignSchedules::SegmentJson).text())
                    .col(
                        ColumnDef::new(CampaignSchedules::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignSchedules::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampaignSchedules::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CampaignSchedules {
    Table,
    Id,
    WorkspaceId,
    CampaignId,
    Status,
    Mode,
    WindowStart,
    WindowEnd,
    Timezone,
    NextRunAt,
    AbEnabled,
    AbSubjectA,
    AbSubjectB,
    AbSubjectC,
    AbTestFraction,
    AbWaitMinutes,
    AbMetric,
    SegmentJson,
    CreatedAt,
    UpdatedAt,
}
