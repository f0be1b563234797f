use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contacts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contacts::WorkspaceId).string().not_null())
                    .col(ColumnDef::new(Contacts::Email).string().not_null())
                    .col(ColumnDef::new(Contacts::FirstName).string())
                    .col(ColumnDef::new(Contacts::LastName).string())
                    .col(
                        ColumnDef::new(Contacts::Status)
                            .string()
                            .not_null()
                            .default("Subscribed"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Unsubscribed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Contacts::Bounced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Contacts::SpamComplaint)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Contacts::LifecycleStage).string())
                    .col(
                        ColumnDef::new(Contacts::Temperature)
                            .string()
                            .not_null()
                            .default("cold"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Tags)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Contacts::Lists)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Contacts::LeadScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Contacts::BestSendHour).integer())
                    .col(ColumnDef::new(Contacts::BestSendMinute).integer())
                    .col(ColumnDef::new(Contacts::BestSendUpdatedAt).big_integer())
                    .col(ColumnDef::new(Contacts::Timezone).string())
                    .col(
                        ColumnDef::new(Contacts::OpenCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contacts::ClickCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Contacts::LastOpenAt).big_integer())
                    .col(ColumnDef::new(Contacts::LastClickAt).big_integer())
                    .col(ColumnDef::new(Contacts::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Contacts::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contacts_workspace_email")
                    .table(Contacts::Table)
                    .col(Contacts::WorkspaceId)
                    .col(Contacts::Email)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Contacts {
    Table,
    Id,
    WorkspaceId,
    Email,
    FirstName,
    LastName,
    Status,
    Unsubscribed,
    Bounced,
    SpamComplaint,
    LifecycleStage,
    Temperature,
    Tags,
    Lists,
    LeadScore,
    BestSendHour,
    BestSendMinute,
    BestSendUpdatedAt,
    Timezone,
    OpenCount,
    ClickCount,
    LastOpenAt,
    LastClickAt,
    CreatedAt,
    UpdatedAt,
}
