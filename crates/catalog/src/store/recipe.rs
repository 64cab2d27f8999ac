use antigravipizza_db::table;
use sea_query::{
    Expr, ExprTrait, Func, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder,
};
use sea_query_sqlx::SqlxBinder;
use sqlx::{SqliteConnection, prelude::FromRow};
use validator::Validate;

use crate::{
    CatalogError, CatalogResult, PreparationUsage, Recipe, name_key,
    usage::{decode_tags, decode_usages, encode_usages},
};

#[derive(FromRow)]
struct RecipeRow {
    id: String,
    name: String,
    description: String,
    base_ingredients: String,
    preparations: String,
    toppings_during_bake: String,
    toppings_post_bake: String,
    tags: String,
    archetype_used: Option<String>,
    recipe_source: Option<String>,
    image_url: Option<String>,
    user_id: Option<String>,
    created_at: i64,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = CatalogError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let decode_error = |source| CatalogError::Decode {
            entity: "recipe",
            id: row.id.to_owned(),
            source,
        };

        let preparations = match row.preparations.trim() {
            "" | "null" => vec![],
            raw => serde_json::from_str::<Vec<PreparationUsage>>(raw).map_err(decode_error)?,
        };

        Ok(Self {
            base_ingredients: decode_usages(&row.base_ingredients).map_err(decode_error)?,
            toppings_during_bake: decode_usages(&row.toppings_during_bake)
                .map_err(decode_error)?,
            toppings_post_bake: decode_usages(&row.toppings_post_bake).map_err(decode_error)?,
            preparations,
            tags: decode_tags(&row.tags),
            id: row.id,
            name: row.name,
            description: row.description,
            archetype_used: row.archetype_used,
            recipe_source: row.recipe_source,
            image_url: row.image_url,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

fn select() -> SelectStatement {
    Query::select()
        .columns([
            table::Recipe::Id,
            table::Recipe::Name,
            table::Recipe::Description,
            table::Recipe::BaseIngredients,
            table::Recipe::Preparations,
            table::Recipe::ToppingsDuringBake,
            table::Recipe::ToppingsPostBake,
            table::Recipe::Tags,
            table::Recipe::ArchetypeUsed,
            table::Recipe::RecipeSource,
            table::Recipe::ImageUrl,
            table::Recipe::UserId,
            table::Recipe::CreatedAt,
        ])
        .from(table::Recipe::Table)
        .to_owned()
}

async fn fetch_optional(
    conn: &mut SqliteConnection,
    statement: SelectStatement,
) -> CatalogResult<Option<Recipe>> {
    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let row = sqlx::query_as_with::<_, RecipeRow, _>(&sql, values)
        .fetch_optional(conn)
        .await?;

    row.map(Recipe::try_from).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> CatalogResult<Option<Recipe>> {
    let statement = select()
        .and_where(Expr::col(table::Recipe::Id).eq(id))
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<Option<Recipe>> {
    let statement = select()
        .and_where(Expr::expr(Func::lower(Expr::col(table::Recipe::Name))).eq(name_key(name)))
        .limit(1)
        .to_owned();

    fetch_optional(conn, statement).await
}

pub async fn list(conn: &mut SqliteConnection) -> CatalogResult<Vec<Recipe>> {
    let statement = select()
        .order_by(table::Recipe::Name, Order::Asc)
        .order_by(table::Recipe::Id, Order::Asc)
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let rows = sqlx::query_as_with::<_, RecipeRow, _>(&sql, values)
        .fetch_all(conn)
        .await?;

    rows.into_iter().map(Recipe::try_from).collect()
}

pub async fn upsert(conn: &mut SqliteConnection, recipe: &Recipe) -> CatalogResult<String> {
    recipe.validate()?;

    let statement = Query::insert()
        .into_table(table::Recipe::Table)
        .columns([
            table::Recipe::Id,
            table::Recipe::Name,
            table::Recipe::Description,
            table::Recipe::BaseIngredients,
            table::Recipe::Preparations,
            table::Recipe::ToppingsDuringBake,
            table::Recipe::ToppingsPostBake,
            table::Recipe::Tags,
            table::Recipe::ArchetypeUsed,
            table::Recipe::RecipeSource,
            table::Recipe::ImageUrl,
            table::Recipe::UserId,
            table::Recipe::CreatedAt,
        ])
        .values_panic([
            recipe.id.to_owned().into(),
            recipe.name.trim().to_owned().into(),
            recipe.description.to_owned().into(),
            encode_usages(&recipe.base_ingredients)?.into(),
            serde_json::to_string(&recipe.preparations)?.into(),
            encode_usages(&recipe.toppings_during_bake)?.into(),
            encode_usages(&recipe.toppings_post_bake)?.into(),
            serde_json::to_string(&recipe.tags)?.into(),
            recipe.archetype_used.to_owned().into(),
            recipe.recipe_source.to_owned().into(),
            recipe.image_url.to_owned().into(),
            recipe.user_id.to_owned().into(),
            recipe.created_at.into(),
        ])
        .on_conflict(
            OnConflict::column(table::Recipe::Id)
                .update_columns([
                    table::Recipe::Name,
                    table::Recipe::Description,
                    table::Recipe::BaseIngredients,
                    table::Recipe::Preparations,
                    table::Recipe::ToppingsDuringBake,
                    table::Recipe::ToppingsPostBake,
                    table::Recipe::Tags,
                    table::Recipe::ArchetypeUsed,
                    table::Recipe::RecipeSource,
                    table::Recipe::ImageUrl,
                    table::Recipe::UserId,
                ])
                .to_owned(),
        )
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(recipe.id.to_owned())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> CatalogResult<bool> {
    let statement = Query::delete()
        .from_table(table::Recipe::Table)
        .and_where(Expr::col(table::Recipe::Id).eq(id))
        .to_owned();

    let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(conn).await?;

    Ok(result.rows_affected() > 0)
}
