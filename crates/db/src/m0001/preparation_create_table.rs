use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::Preparation;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(Preparation::Table)
        .col(
            ColumnDef::new(Preparation::Id)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Preparation::Name).string().not_null())
        .col(ColumnDef::new(Preparation::CategoryId).string().not_null())
        .col(
            ColumnDef::new(Preparation::Description)
                .text()
                .not_null()
                .default(""),
        )
        .col(
            ColumnDef::new(Preparation::Yield)
                .integer()
                .not_null()
                .default(4),
        )
        .col(
            ColumnDef::new(Preparation::PrepTime)
                .string()
                .not_null()
                .default(""),
        )
        .col(
            ColumnDef::new(Preparation::Difficulty)
                .string()
                .not_null()
                .default("Media"),
        )
        .col(
            ColumnDef::new(Preparation::Ingredients)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(
            ColumnDef::new(Preparation::Instructions)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(ColumnDef::new(Preparation::Tips).text().not_null().default("[]"))
        .col(ColumnDef::new(Preparation::Tags).text().not_null().default("[]"))
        .col(
            ColumnDef::new(Preparation::IsCustom)
                .boolean()
                .not_null()
                .default(true),
        )
        .col(ColumnDef::new(Preparation::DateAdded).big_integer().not_null())
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(Preparation::Table).to_owned()
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
