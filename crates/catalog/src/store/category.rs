use antigravipizza_db::table;
use sea_query::{Expr, ExprTrait, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_sqlx::SqlxBinder;
use sqlx::{SqliteConnection, prelude::FromRow};
use validator::Validate;

use crate::{Category, CatalogError, CatalogResult, name_key, now_millis};

#[derive(FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    icon: String,
    display_order: i64,
    description: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            icon: row.icon,
            display_order: row.display_order,
            description: row.description,
        }
    }
}

fn select() -> SelectStatement {
    Query::select()
        .columns([
            table::Category::Id,
            table::Category::Name,
            table::Category::Icon,
            table::Category::DisplayOrder,
            table::Category::Description,
        ])
        .from(table::Category::Table)
        .to_owned()
}

async fn fetch_optional(
    conn: &mut SqliteConnection,
    statement: SelectStatement,
) -> CatalogResult<Option<Category>> {
    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let row = sqlx::query_as_with::<_, CategoryRow, _>(&sql, values)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> CatalogResult<Option<Category>> {
    let statement = select()
        .and_where(Expr::col(table::Category::Id).eq(id))
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<Option<Category>> {
    let statement = select()
        .and_where(Expr::col(table::Category::NameKey).eq(name_key(name)))
        .to_owned();

    fetch_optional(conn, statement).await
}

/// Categories in presentation order.
pub async fn list(conn: &mut SqliteConnection) -> CatalogResult<Vec<Category>> {
    let statement = select()
        .order_by(table::Category::DisplayOrder, Order::Asc)
        .order_by(table::Category::Name, Order::Asc)
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let rows = sqlx::query_as_with::<_, CategoryRow, _>(&sql, values)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn upsert(conn: &mut SqliteConnection, category: &Category) -> CatalogResult<String> {
    category.validate()?;
    if category.name.trim().is_empty() {
        return Err(CatalogError::Validation("category name is blank".to_owned()));
    }

    if let Some(existing) = find_by_name(conn, &category.name).await?
        && existing.id != category.id
    {
        return Err(CatalogError::DuplicateName {
            entity: "category",
            name: category.name.to_owned(),
            existing_id: existing.id,
        });
    }

    let statement = Query::insert()
        .into_table(table::Category::Table)
        .columns([
            table::Category::Id,
            table::Category::Name,
            table::Category::NameKey,
            table::Category::Icon,
            table::Category::DisplayOrder,
            table::Category::Description,
            table::Category::CreatedAt,
        ])
        .values_panic([
            category.id.to_owned().into(),
            category.name.trim().to_owned().into(),
            name_key(&category.name).into(),
            category.icon.to_owned().into(),
            category.display_order.into(),
            category.description.to_owned().into(),
            now_millis().into(),
        ])
        .on_conflict(
            OnConflict::column(table::Category::Id)
                .update_columns([
                    table::Category::Name,
                    table::Category::NameKey,
                    table::Category::Icon,
                    table::Category::DisplayOrder,
                    table::Category::Description,
                ])
                .to_owned(),
        )
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(category.id.to_owned())
}

/// Deletes an unreferenced category. Returns whether a row was removed.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> CatalogResult<bool> {
    let ingredients = super::ingredient::list(
        conn,
        &super::IngredientFilter {
            category_id: Some(id.to_owned()),
            ..Default::default()
        },
    )
    .await?
    .len();
    let preparations = super::preparation::list(conn)
        .await?
        .iter()
        .filter(|p| p.category_id == id)
        .count();

    if ingredients > 0 || preparations > 0 {
        return Err(CatalogError::CategoryInUse {
            id: id.to_owned(),
            ingredients,
            preparations,
        });
    }

    let statement = Query::delete()
        .from_table(table::Category::Table)
        .and_where(Expr::col(table::Category::Id).eq(id))
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(result.rows_affected() > 0)
}
