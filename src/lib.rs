pub mod config;
pub mod detector;
mod error;
pub mod imaging;
pub mod rules;
pub mod service;
pub mod triage;
pub mod visualize;

pub use config::TriageConfig;
pub use detector::{Detector, PrecomputedDetections};
pub use error::TriageError;
pub use imaging::{ImageNormalizer, NormalizedImage};
pub use rules::RuleTable;
pub use service::{TriageOutcome, TriageService};
pub use triage::{DiagnosisReport, TriageEngine};

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` level. Call once from the binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
