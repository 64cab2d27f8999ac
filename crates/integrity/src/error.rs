use antigravipizza_catalog::{CatalogError, OwnerKind};
use thiserror::Error;

pub type IntegrityResult<T> = Result<T, IntegrityError>;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("usage {position} of {owner_kind} {owner_id} references missing ingredient {ingredient_id}")]
    DanglingReference {
        owner_kind: OwnerKind,
        owner_id: String,
        position: usize,
        ingredient_id: String,
    },

    #[error("usage {position} of {owner_kind} {owner_id} has neither an ingredient id nor a name")]
    MalformedUsage {
        owner_kind: OwnerKind,
        owner_id: String,
        position: usize,
    },

    #[error("no safe merge winner among {candidates:?}: {reason}")]
    AmbiguousMerge {
        candidates: Vec<String>,
        reason: String,
    },

    #[error("category \"{name}\" does not exist")]
    CategoryNotFound { name: String },

    #[error("{kind} {id} not found")]
    OwnerNotFound { kind: OwnerKind, id: String },

    #[error("ingredient {id} not found")]
    IngredientNotFound { id: String },

    #[error("stale report entry: {0}")]
    StaleTarget(String),

    #[error("ingredient {id} is still referenced by {references} usages")]
    StillReferenced { id: String, references: usize },

    #[error("invalid merge: {0}")]
    InvalidMerge(String),

    #[error("category alias table: {0}")]
    AliasTable(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntegrityError {
    /// Configuration and storage failures stop a batch. Everything else is a
    /// per-item defect that gets collected.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IntegrityError::CategoryNotFound { .. }
                | IntegrityError::AliasTable(_)
                | IntegrityError::Database(_)
                | IntegrityError::Catalog(CatalogError::Database(_))
        )
    }
}
