use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::Recipe;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(Recipe::Table)
        .col(
            ColumnDef::new(Recipe::Id)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Recipe::Name).string().not_null())
        .col(
            ColumnDef::new(Recipe::Description)
                .text()
                .not_null()
                .default(""),
        )
        .col(
            ColumnDef::new(Recipe::BaseIngredients)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(
            ColumnDef::new(Recipe::Preparations)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(
            ColumnDef::new(Recipe::ToppingsDuringBake)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(
            ColumnDef::new(Recipe::ToppingsPostBake)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(ColumnDef::new(Recipe::Tags).text().not_null().default("[]"))
        .col(ColumnDef::new(Recipe::ArchetypeUsed).string())
        .col(ColumnDef::new(Recipe::RecipeSource).string())
        .col(ColumnDef::new(Recipe::ImageUrl).string())
        .col(ColumnDef::new(Recipe::UserId).string())
        .col(ColumnDef::new(Recipe::CreatedAt).big_integer().not_null())
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(Recipe::Table).to_owned()
}

#[async_trait::async_trait]
impl sqlx_migrator::Operation<sqlx::Sqlite> for Operation {
    async fn up(
        &self,
        connection: &mut sqlx::SqliteConnection,
    ) -> Result<(), sqlx_migrator::Error> {
        let statment = up_statement().to_string(sea_query::SqliteQueryBuilder);
        sqlx::query(&statment).execute(connection).await?;

        Ok(())
    }

    async fn down(
        &self,
        connection: &mut sqlx::SqliteConnection,
    ) -> Result<(), sqlx_migrator::Error> {
        let statment = down_statement().to_string(sea_query::SqliteQueryBuilder);
        sqlx::query(&statment).execute(connection).await?;

        Ok(())
    }
}
