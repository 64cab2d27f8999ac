mod category_create_name_key_idx;
mod category_create_table;
mod ingredient_create_category_idx;
mod ingredient_create_name_key_idx;
mod ingredient_create_table;
mod preparation_create_table;
mod recipe_create_table;

use sqlx_migrator::vec_box;

pub struct Migration;

sqlx_migrator::sqlite_migration!(
    Migration,
    "antigravipizza",
    "m0001",
    vec_box![],
    vec_box![
        category_create_table::Operation,
        category_create_name_key_idx::Operation,
        ingredient_create_table::Operation,
        ingredient_create_name_key_idx::Operation,
        ingredient_create_category_idx::Operation,
        preparation_create_table::Operation,
        recipe_create_table::Operation
    ]
);
