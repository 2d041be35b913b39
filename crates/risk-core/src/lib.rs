pub mod config;
pub mod features;
pub mod meta;
pub mod model;
pub mod pipeline;
pub mod presentation;
pub mod schema;
pub mod scorer;
pub mod tier;
pub mod util;

pub use features::{assemble, FeatureVector};
pub use meta::{FeatureKind, FeatureSchema};
pub use model::{Classifier, ModelError};
pub use pipeline::RiskContext;
pub use schema::ScoredResult;
pub use scorer::score;
pub use tier::{tier, RiskThresholds, RiskTier};
