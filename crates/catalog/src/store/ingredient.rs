use antigravipizza_db::table;
use sea_query::{Expr, ExprTrait, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_sqlx::SqlxBinder;
use sqlx::{SqliteConnection, prelude::FromRow};
use validator::Validate;

use crate::{
    CatalogError, CatalogResult, Ingredient, Phase, name_key,
    usage::{decode_string_list, decode_tags},
};

#[derive(Debug, Default, Clone)]
pub struct IngredientFilter {
    pub category_id: Option<String>,
    /// Case-insensitive substring of the name.
    pub name_contains: Option<String>,
    pub tag: Option<String>,
    pub phase: Option<Phase>,
    pub custom_only: bool,
}

#[derive(FromRow)]
struct IngredientRow {
    id: String,
    name: String,
    category_id: String,
    subcategory: Option<String>,
    default_unit: String,
    min_weight: Option<f64>,
    max_weight: Option<f64>,
    post_bake: bool,
    phase: sqlx::types::Text<Phase>,
    season: String,
    allergens: String,
    tags: String,
    is_custom: bool,
    date_added: i64,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            subcategory: row.subcategory,
            default_unit: row.default_unit,
            min_weight: row.min_weight,
            max_weight: row.max_weight,
            post_bake: row.post_bake,
            phase: row.phase.0,
            season: decode_string_list(&row.season),
            allergens: decode_string_list(&row.allergens),
            tags: decode_tags(&row.tags),
            is_custom: row.is_custom,
            date_added: row.date_added,
        }
    }
}

fn select() -> SelectStatement {
    Query::select()
        .columns([
            table::Ingredient::Id,
            table::Ingredient::Name,
            table::Ingredient::CategoryId,
            table::Ingredient::Subcategory,
            table::Ingredient::DefaultUnit,
            table::Ingredient::MinWeight,
            table::Ingredient::MaxWeight,
            table::Ingredient::PostBake,
            table::Ingredient::Phase,
            table::Ingredient::Season,
            table::Ingredient::Allergens,
            table::Ingredient::Tags,
            table::Ingredient::IsCustom,
            table::Ingredient::DateAdded,
        ])
        .from(table::Ingredient::Table)
        .to_owned()
}

async fn fetch_optional(
    conn: &mut SqliteConnection,
    statement: SelectStatement,
) -> CatalogResult<Option<Ingredient>> {
    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let row = sqlx::query_as_with::<_, IngredientRow, _>(&sql, values)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> CatalogResult<Option<Ingredient>> {
    let statement = select()
        .and_where(Expr::col(table::Ingredient::Id).eq(id))
        .to_owned();

    fetch_optional(conn, statement).await
}

/// Case-insensitive, whitespace-trimmed exact name lookup.
pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<Option<Ingredient>> {
    let statement = select()
        .and_where(Expr::col(table::Ingredient::NameKey).eq(name_key(name)))
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn list(
    conn: &mut SqliteConnection,
    filter: &IngredientFilter,
) -> CatalogResult<Vec<Ingredient>> {
    let mut statement = select()
        .order_by(table::Ingredient::NameKey, Order::Asc)
        .to_owned();

    if let Some(category_id) = &filter.category_id {
        statement.and_where(Expr::col(table::Ingredient::CategoryId).eq(category_id));
    }

    if let Some(phase) = filter.phase {
        statement.and_where(Expr::col(table::Ingredient::Phase).eq(phase.as_ref()));
    }

    if filter.custom_only {
        statement.and_where(Expr::col(table::Ingredient::IsCustom).eq(true));
    }

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let rows = sqlx::query_as_with::<_, IngredientRow, _>(&sql, values)
        .fetch_all(conn)
        .await?;

    // Substring match on the name key in Rust: `%` and `_` in the fragment
    // are plain characters, not LIKE wildcards.
    let fragment = filter.name_contains.as_deref().map(name_key);

    Ok(rows
        .into_iter()
        .map(Ingredient::from)
        .filter(|i| match &fragment {
            Some(fragment) => name_key(&i.name).contains(fragment.as_str()),
            None => true,
        })
        .filter(|i| match &filter.tag {
            Some(tag) => i.tags.contains(tag),
            None => true,
        })
        .collect())
}

/// Inserts or replaces an ingredient. The category must exist and no other
/// ingredient may carry the same name.
pub async fn upsert(conn: &mut SqliteConnection, ingredient: &Ingredient) -> CatalogResult<String> {
    ingredient.validate()?;
    if ingredient.name.trim().is_empty() {
        return Err(CatalogError::Validation(
            "ingredient name is blank".to_owned(),
        ));
    }

    if super::category::find_by_id(conn, &ingredient.category_id)
        .await?
        .is_none()
    {
        return Err(CatalogError::NotFound {
            entity: "category",
            id: ingredient.category_id.to_owned(),
        });
    }

    if let Some(existing) = find_by_name(conn, &ingredient.name).await?
        && existing.id != ingredient.id
    {
        return Err(CatalogError::DuplicateName {
            entity: "ingredient",
            name: ingredient.name.to_owned(),
            existing_id: existing.id,
        });
    }

    let statement = Query::insert()
        .into_table(table::Ingredient::Table)
        .columns([
            table::Ingredient::Id,
            table::Ingredient::Name,
            table::Ingredient::NameKey,
            table::Ingredient::CategoryId,
            table::Ingredient::Subcategory,
            table::Ingredient::DefaultUnit,
            table::Ingredient::MinWeight,
            table::Ingredient::MaxWeight,
            table::Ingredient::PostBake,
            table::Ingredient::Phase,
            table::Ingredient::Season,
            table::Ingredient::Allergens,
            table::Ingredient::Tags,
            table::Ingredient::IsCustom,
            table::Ingredient::DateAdded,
        ])
        .values_panic([
            ingredient.id.to_owned().into(),
            ingredient.name.trim().to_owned().into(),
            name_key(&ingredient.name).into(),
            ingredient.category_id.to_owned().into(),
            ingredient.subcategory.to_owned().into(),
            ingredient.default_unit.to_owned().into(),
            ingredient.min_weight.into(),
            ingredient.max_weight.into(),
            ingredient.post_bake.into(),
            ingredient.phase.to_string().into(),
            serde_json::to_string(&ingredient.season)?.into(),
            serde_json::to_string(&ingredient.allergens)?.into(),
            serde_json::to_string(&ingredient.tags)?.into(),
            ingredient.is_custom.into(),
            ingredient.date_added.into(),
        ])
        .on_conflict(
            OnConflict::column(table::Ingredient::Id)
                .update_columns([
                    table::Ingredient::Name,
                    table::Ingredient::NameKey,
                    table::Ingredient::CategoryId,
                    table::Ingredient::Subcategory,
                    table::Ingredient::DefaultUnit,
                    table::Ingredient::MinWeight,
                    table::Ingredient::MaxWeight,
                    table::Ingredient::PostBake,
                    table::Ingredient::Phase,
                    table::Ingredient::Season,
                    table::Ingredient::Allergens,
                    table::Ingredient::Tags,
                    table::Ingredient::IsCustom,
                ])
                .to_owned(),
        )
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(ingredient.id.to_owned())
}

/// Deletes an ingredient nothing references anymore. Returns whether a row
/// was removed.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> CatalogResult<bool> {
    let owners = super::load_owners(conn).await?;
    let references = super::count_references(&owners)
        .get(id)
        .copied()
        .unwrap_or(0);

    if references > 0 {
        return Err(CatalogError::IngredientInUse {
            id: id.to_owned(),
            references,
        });
    }

    let statement = Query::delete()
        .from_table(table::Ingredient::Table)
        .and_where(Expr::col(table::Ingredient::Id).eq(id))
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(result.rows_affected() > 0)
}
