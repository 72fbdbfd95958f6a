use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Codes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Codes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Codes::EventId).uuid().not_null())
                    .col(ColumnDef::new(Codes::CourseId).uuid())
                    .col(ColumnDef::new(Codes::StudentId).uuid())
                    .col(ColumnDef::new(Codes::CodeValue).string().not_null())
                    .col(ColumnDef::new(Codes::Token).string().not_null())
                    .col(ColumnDef::new(Codes::Title).string().not_null())
                    .col(
                        ColumnDef::new(Codes::IsPublished)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Codes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Codes::Table, Codes::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Codes::Table)
                    .col(Codes::CodeValue)
                    .name("idx_codes_code_value")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Codes::Table)
                    .col(Codes::Token)
                    .name("idx_codes_token")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Codes::Table)
                    .col(Codes::StudentId)
                    .name("idx_codes_student_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Codes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Codes {
    Table,
    Id,
    EventId,
    CourseId,
    StudentId,
    CodeValue,
    Token,
    Title,
    IsPublished,
    CreatedAt,
}

#[derive(Iden)]
enum Students {
    Table,
    Id,
}
