use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::Category;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(Category::Table)
        .col(
            ColumnDef::new(Category::Id)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Category::Name).string().not_null())
        .col(ColumnDef::new(Category::NameKey).string().not_null())
        .col(ColumnDef::new(Category::Icon).string().not_null().default(""))
        .col(
            ColumnDef::new(Category::DisplayOrder)
                .integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(Category::Description)
                .text()
                .not_null()
                .default(""),
        )
        .col(ColumnDef::new(Category::CreatedAt).big_integer().not_null())
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(Category::Table).to_owned()
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
