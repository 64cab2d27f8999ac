use antigravipizza_db::table;
use sea_query::{
    Expr, ExprTrait, Func, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder,
};
use sea_query_sqlx::SqlxBinder;
use sqlx::{SqliteConnection, prelude::FromRow};
use validator::Validate;

use crate::{
    CatalogError, CatalogResult, Difficulty, Preparation, name_key,
    usage::{decode_string_list, decode_tags, decode_usages, encode_usages},
};

#[derive(FromRow)]
struct PreparationRow {
    id: String,
    name: String,
    category_id: String,
    description: String,
    #[sqlx(rename = "yield")]
    portions: i64,
    prep_time: String,
    difficulty: sqlx::types::Text<Difficulty>,
    ingredients: String,
    instructions: String,
    tips: String,
    tags: String,
    is_custom: bool,
    date_added: i64,
}

impl TryFrom<PreparationRow> for Preparation {
    type Error = CatalogError;

    fn try_from(row: PreparationRow) -> Result<Self, Self::Error> {
        let ingredients =
            decode_usages(&row.ingredients).map_err(|source| CatalogError::Decode {
                entity: "preparation",
                id: row.id.to_owned(),
                source,
            })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            description: row.description,
            portions: u32::try_from(row.portions).unwrap_or(1),
            prep_time: row.prep_time,
            difficulty: row.difficulty.0,
            ingredients,
            instructions: decode_string_list(&row.instructions),
            tips: decode_string_list(&row.tips),
            tags: decode_tags(&row.tags),
            is_custom: row.is_custom,
            date_added: row.date_added,
        })
    }
}

fn select() -> SelectStatement {
    Query::select()
        .columns([
            table::Preparation::Id,
            table::Preparation::Name,
            table::Preparation::CategoryId,
            table::Preparation::Description,
            table::Preparation::Yield,
            table::Preparation::PrepTime,
            table::Preparation::Difficulty,
            table::Preparation::Ingredients,
            table::Preparation::Instructions,
            table::Preparation::Tips,
            table::Preparation::Tags,
            table::Preparation::IsCustom,
            table::Preparation::DateAdded,
        ])
        .from(table::Preparation::Table)
        .to_owned()
}

async fn fetch_optional(
    conn: &mut SqliteConnection,
    statement: SelectStatement,
) -> CatalogResult<Option<Preparation>> {
    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let row = sqlx::query_as_with::<_, PreparationRow, _>(&sql, values)
        .fetch_optional(conn)
        .await?;

    row.map(Preparation::try_from).transpose()
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> CatalogResult<Option<Preparation>> {
    let statement = select()
        .and_where(Expr::col(table::Preparation::Id).eq(id))
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<Option<Preparation>> {
    let statement = select()
        .and_where(Expr::expr(Func::lower(Expr::col(table::Preparation::Name))).eq(name_key(name)))
        .limit(1)
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn list(conn: &mut SqliteConnection) -> CatalogResult<Vec<Preparation>> {
    let statement = select()
        .order_by(table::Preparation::Name, Order::Asc)
        .order_by(table::Preparation::Id, Order::Asc)
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let rows = sqlx::query_as_with::<_, PreparationRow, _>(&sql, values)
        .fetch_all(conn)
        .await?;

    rows.into_iter().map(Preparation::try_from).collect()
}

pub async fn upsert(
    conn: &mut SqliteConnection,
    preparation: &Preparation,
) -> CatalogResult<String> {
    preparation.validate()?;

    let statement = Query::insert()
        .into_table(table::Preparation::Table)
        .columns([
            table::Preparation::Id,
            table::Preparation::Name,
            table::Preparation::CategoryId,
            table::Preparation::Description,
            table::Preparation::Yield,
            table::Preparation::PrepTime,
            table::Preparation::Difficulty,
            table::Preparation::Ingredients,
            table::Preparation::Instructions,
            table::Preparation::Tips,
            table::Preparation::Tags,
            table::Preparation::IsCustom,
            table::Preparation::DateAdded,
        ])
        .values_panic([
            preparation.id.to_owned().into(),
            preparation.name.trim().to_owned().into(),
            preparation.category_id.to_owned().into(),
            preparation.description.to_owned().into(),
            i64::from(preparation.portions).into(),
            preparation.prep_time.to_owned().into(),
            preparation.difficulty.to_string().into(),
            encode_usages(&preparation.ingredients)?.into(),
            serde_json::to_string(&preparation.instructions)?.into(),
            serde_json::to_string(&preparation.tips)?.into(),
            serde_json::to_string(&preparation.tags)?.into(),
            preparation.is_custom.into(),
            preparation.date_added.into(),
        ])
        .on_conflict(
            OnConflict::column(table::Preparation::Id)
                .update_columns([
                    table::Preparation::Name,
                    table::Preparation::CategoryId,
                    table::Preparation::Description,
                    table::Preparation::Yield,
                    table::Preparation::PrepTime,
                    table::Preparation::Difficulty,
                    table::Preparation::Ingredients,
                    table::Preparation::Instructions,
                    table::Preparation::Tips,
                    table::Preparation::Tags,
                    table::Preparation::IsCustom,
                ])
                .to_owned(),
        )
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(preparation.id.to_owned())
}

/// Deletes a preparation no recipe uses.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> CatalogResult<bool> {
    let recipes = super::recipe::list(conn)
        .await?
        .iter()
        .filter(|r| r.preparations.iter().any(|p| p.preparation_id == id))
        .count();

    if recipes > 0 {
        return Err(CatalogError::PreparationInUse {
            id: id.to_owned(),
            recipes,
        });
    }

    let statement = Query::delete()
        .from_table(table::Preparation::Table)
        .and_where(Expr::col(table::Preparation::Id).eq(id))
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(result.rows_affected() > 0)
}
