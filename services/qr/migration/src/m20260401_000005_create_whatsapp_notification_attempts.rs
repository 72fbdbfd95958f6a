use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WhatsappNotificationAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WhatsappNotificationAttempts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WhatsappNotificationAttempts::NotificationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WhatsappNotificationAttempts::AttemptNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WhatsappNotificationAttempts::Status)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WhatsappNotificationAttempts::ProviderMessageId).string())
                    .col(ColumnDef::new(WhatsappNotificationAttempts::Error).text())
                    .col(
                        ColumnDef::new(WhatsappNotificationAttempts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                WhatsappNotificationAttempts::Table,
                                WhatsappNotificationAttempts::NotificationId,
                            )
                            .to(WhatsappNotifications::Table, WhatsappNotifications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(WhatsappNotificationAttempts::Table)
                    .col(WhatsappNotificationAttempts::NotificationId)
                    .col(WhatsappNotificationAttempts::AttemptNumber)
                    .unique()
                    .name("uq_whatsapp_notification_attempts_notification_attempt")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(WhatsappNotificationAttempts::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum WhatsappNotificationAttempts {
    Table,
    Id,
    NotificationId,
    AttemptNumber,
    Status,
    ProviderMessageId,
    Error,
    CreatedAt,
}

#[derive(Iden)]
enum WhatsappNotifications {
    Table,
    Id,
}
