pub use sea_orm_migration::prelude::*;

mod m20241001_000001_create_mandi_prices;
mod m20241001_000002_create_sync_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241001_000001_create_mandi_prices::Migration),
            Box::new(m20241001_000002_create_sync_status::Migration),
        ]
    }
}
