mod error;
mod types;

pub mod resolver;
pub mod seed;
pub mod store;
pub mod usage;

pub use error::*;
pub use resolver::{Resolution, Resolver};
pub use store::{Catalog, IngredientFilter};
pub use types::*;
pub use usage::{IngredientUsage, UsageSource};

