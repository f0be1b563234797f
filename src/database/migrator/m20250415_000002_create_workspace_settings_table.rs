use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkspaceSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkspaceSettings::WorkspaceId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkspaceSettings::CompanyName).string())
                    .col(ColumnDef::new(WorkspaceSettings::DefaultFromEmail).string())
                    .col(
                        ColumnDef::new(WorkspaceSettings::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkspaceSettings::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkspaceSettings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum WorkspaceSettings {
    Table,
    WorkspaceId,
    CompanyName,
    DefaultFromEmail,
    CreatedAt,
    UpdatedAt,
}
