//! Create `challenge_selections` table.
//! Raw checkbox submissions, one row per selected option.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChallengeSelections::Table)
                    .if_not_exists()
                    .col(pk_auto(ChallengeSelections::Id))
                    .col(integer_null(ChallengeSelections::ChallengeId))
                    .col(text(ChallengeSelections::OptionName))
                    .col(
                        timestamp_with_time_zone(ChallengeSelections::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ChallengeSelections::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ChallengeSelections {
    Table,
    Id,
    ChallengeId,
    OptionName,
    CreatedAt,
}
