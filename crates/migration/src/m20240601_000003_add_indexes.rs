use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // UserPreferences: GIN over the document, serves `preferences @> '["x"]'`
        manager
            .create_index(
                Index::create()
                    .name(Indexes::IdxUserPreferencesJsonb.to_string())
                    .table(UserPreferences::Table)
                    .index_type(IndexType::Custom(gin()))
                    .col(UserPreferences::Preferences)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // ChallengeSelections: lookup by challenge
        manager
            .create_index(
                Index::create()
                    .name(Indexes::IdxChallengeSelectionsChallenge.to_string())
                    .table(ChallengeSelections::Table)
                    .col(ChallengeSelections::ChallengeId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name(Indexes::IdxUserPreferencesJsonb.to_string())
                    .table(UserPreferences::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name(Indexes::IdxChallengeSelectionsChallenge.to_string())
                    .table(ChallengeSelections::Table)
                    .to_owned(),
            )
            .await
    }
}

fn gin() -> DynIden {
    Alias::new("GIN").into_iden()
}

#[derive(DeriveIden)]
enum Indexes {
    IdxUserPreferencesJsonb,
    IdxChallengeSelectionsChallenge,
}

#[derive(DeriveIden)]
enum UserPreferences { Table, Preferences }

#[derive(DeriveIden)]
enum ChallengeSelections { Table, ChallengeId }
