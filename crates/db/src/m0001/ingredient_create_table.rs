use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::Ingredient;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(Ingredient::Table)
        .col(
            ColumnDef::new(Ingredient::Id)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Ingredient::Name).string().not_null())
        .col(ColumnDef::new(Ingredient::NameKey).string().not_null())
        .col(ColumnDef::new(Ingredient::CategoryId).string().not_null())
        .col(ColumnDef::new(Ingredient::Subcategory).string())
        .col(
            ColumnDef::new(Ingredient::DefaultUnit)
                .string()
                .not_null()
                .default("g"),
        )
        .col(ColumnDef::new(Ingredient::MinWeight).double())
        .col(ColumnDef::new(Ingredient::MaxWeight).double())
        .col(
            ColumnDef::new(Ingredient::PostBake)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Ingredient::Phase)
                .string()
                .not_null()
                .default("topping"),
        )
        .col(ColumnDef::new(Ingredient::Season).text().not_null().default("[]"))
        .col(
            ColumnDef::new(Ingredient::Allergens)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(ColumnDef::new(Ingredient::Tags).text().not_null().default("[]"))
        .col(
            ColumnDef::new(Ingredient::IsCustom)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(ColumnDef::new(Ingredient::DateAdded).big_integer().not_null())
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(Ingredient::Table).to_owned()
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
