pub mod query;

pub use query::{ComparisonRow, QueryService, RatePoint, TopHeroes, DEFAULT_COMPARE_DAYS};
