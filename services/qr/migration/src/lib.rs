use sea_orm_migration::prelude::*;

mod m20260401_000001_create_students;
mod m20260401_000002_create_access_tokens;
mod m20260401_000003_create_codes;
mod m20260401_000004_create_whatsapp_notifications;
mod m20260401_000005_create_whatsapp_notification_attempts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260401_000001_create_students::Migration),
            Box::new(m20260401_000002_create_access_tokens::Migration),
            Box::new(m20260401_000003_create_codes::Migration),
            Box::new(m20260401_000004_create_whatsapp_notifications::Migration),
            Box::new(m20260401_000005_create_whatsapp_notification_attempts::Migration),
        ]
    }
}
