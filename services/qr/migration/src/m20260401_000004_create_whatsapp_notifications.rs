use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WhatsappNotifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WhatsappNotifications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WhatsappNotifications::StudentId).uuid())
                    .col(
                        ColumnDef::new(WhatsappNotifications::Phone)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WhatsappNotifications::Body).text().not_null())
                    .col(
                        ColumnDef::new(WhatsappNotifications::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(WhatsappNotifications::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(WhatsappNotifications::ProviderMessageId).string())
                    .col(ColumnDef::new(WhatsappNotifications::LastError).text())
                    .col(
                        ColumnDef::new(WhatsappNotifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(WhatsappNotifications::SentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(WhatsappNotifications::FailedAt)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(WhatsappNotifications::Table, WhatsappNotifications::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(WhatsappNotifications::Table)
                    .col(WhatsappNotifications::Status)
                    .name("idx_whatsapp_notifications_status")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WhatsappNotifications::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WhatsappNotifications {
    Table,
    Id,
    StudentId,
    Phone,
    Body,
    Status,
    Attempts,
    ProviderMessageId,
    LastError,
    CreatedAt,
    SentAt,
    FailedAt,
}

#[derive(Iden)]
enum Students {
    Table,
    Id,
}
