//! Create `user_preferences` table.
//! One row per user; the preference list lives in a JSONB document.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPreferences::Table)
                    .if_not_exists()
                    .col(pk_auto(UserPreferences::Id))
                    .col(integer(UserPreferences::UserId))
                    .col(json_binary(UserPreferences::Preferences))
                    .col(
                        timestamp_with_time_zone(UserPreferences::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert target: ON CONFLICT (user_id) needs a unique index
        manager
            .create_index(
                Index::create()
                    .name("uniq_user_preferences_user_id")
                    .table(UserPreferences::Table)
                    .col(UserPreferences::UserId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserPreferences::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum UserPreferences {
    Table,
    Id,
    UserId,
    Preferences,
    CreatedAt,
}
