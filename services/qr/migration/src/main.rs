use sea_orm_migration::prelude::*;

use lk_qr_migration::Migrator;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
