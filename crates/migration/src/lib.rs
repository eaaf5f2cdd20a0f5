//! Migrator registering table migrations in dependency order.
//! Secondary indexes are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_user_preferences;
mod m20240601_000002_create_challenge_selections;
mod m20240601_000003_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_user_preferences::Migration),
            Box::new(m20240601_000002_create_challenge_selections::Migration),
            // Indexes should always be applied last
            Box::new(m20240601_000003_add_indexes::Migration),
        ]
    }
}
