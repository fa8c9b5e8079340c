pub mod config;
pub mod models;
pub mod parser;
pub mod matching;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for library consumers (binaries, test harnesses).
/// Honors `RUST_LOG`; falls back to the library default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("trialscout v{}", config::APP_VERSION);
}

pub use matching::engine::{MatchEngine, MatchError, TrialFilter};
pub use matching::ranking::{rank, RankedTrial};
pub use models::criteria::TrialCriteriaSet;
pub use models::match_result::MatchResult;
pub use models::profile::PatientProfile;
pub use models::rule::EligibilityRule;
pub use models::trial::TrialRecord;
pub use parser::orchestrator::ParserPipeline;
