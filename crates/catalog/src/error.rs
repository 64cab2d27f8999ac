use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} has an unreadable column: {source}")]
    Decode {
        entity: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{entity} name \"{name}\" is already used by {existing_id}")]
    DuplicateName {
        entity: &'static str,
        name: String,
        existing_id: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("category {id} is still used by {ingredients} ingredients and {preparations} preparations")]
    CategoryInUse {
        id: String,
        ingredients: usize,
        preparations: usize,
    },

    #[error("ingredient {id} is still referenced by {references} usages")]
    IngredientInUse { id: String, references: usize },

    #[error("preparation {id} is still used by {recipes} recipes")]
    PreparationInUse { id: String, recipes: usize },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CatalogError::Validation(errors.to_string())
    }
}
