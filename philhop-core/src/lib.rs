pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod report;
pub mod scorer;
pub mod selector;

pub use cancel::CancellationToken;
pub use config::{HopConfig, HopLimitPolicy, Strategy};
pub use engine::{HopEngine, HopFailure, HopOutcome, HopStep, TerminalReason, TraversalState};
pub use error::{AssetError, RecordError, ScoreError, SelectError};
pub use record::{CsvRecord, Database, TraversalRecord};
pub use scorer::{Scorer, ScorerAssets, build_scorer};
pub use selector::{LinkSelector, ScoredCandidate, SelectionOutcome};

const BANNER: &str = r#"
        __    _ ____
   ____/ /_  (_) / /_  ____  ____
  / __ \ __ \/ / / __ \/ __ \/ __ \
 / /_/ / / / / / / / / / /_/ / /_/ /
/ .___/_/ /_/_/_/_/ /_/\____/ .___/
/_/                        /_/
"#;

pub fn print_banner() {
    println!("{}", BANNER);
    println!(
        "  philhop v{} - does every article lead to Philosophy?\n",
        env!("CARGO_PKG_VERSION")
    );
}
