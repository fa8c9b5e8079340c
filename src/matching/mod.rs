pub mod engine;
pub mod evaluate;
pub mod ranking;
pub mod scoring;
pub mod units;

pub use engine::{MatchEngine, MatchError, TrialFilter};
pub use ranking::{rank, RankedTrial};
pub use scoring::ScoringConfig;
