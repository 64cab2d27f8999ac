mod error;
mod session;

pub mod alias;
pub mod audit;
pub mod import;
pub mod instruction;
pub mod normalizer;
pub mod repair;
pub mod similarity;
pub mod tagging;

pub use alias::CategoryAliases;
pub use audit::{Report, audit};
pub use error::*;
pub use normalizer::{Failure, MergeOutcome, NormalizeSummary, Normalizer, Promotion};
pub use repair::{Outcome, RepairExecutor, Selections};
pub use session::Session;
pub use tagging::TagRule;
