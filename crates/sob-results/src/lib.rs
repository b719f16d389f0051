//! sob-results: post-processing and run bookkeeping.
//!
//! Provides:
//! - Converter invocation with output verification
//! - Time-history table parsing into a `SignalSet`
//! - `ObjectiveReducer` with a table of named metrics
//! - `RunManager` for run directory allocation, evaluation records and cleanup
//!
//! # Example
//!
//! ```
//! use sob_results::{ObjectiveReducer, ReductionContext, Sample, SignalSet};
//!
//! let signals = SignalSet::new().with(
//!     "intrusion",
//!     vec![Sample { t: 0.0, v: 0.0 }, Sample { t: 1.0, v: -3.5 }, Sample { t: 2.0, v: 2.0 }],
//! );
//! let reducer = ObjectiveReducer::new(ReductionContext::default());
//! assert_eq!(reducer.reduce(&signals, "max_abs").unwrap(), 3.5);
//! ```

pub mod convert;
pub mod error;
pub mod extract;
pub mod hash;
pub mod record;
pub mod reduce;
pub mod run_manager;
pub mod signal;
pub mod table;

pub use convert::Converters;
pub use error::{ResultsError, ResultsResult};
pub use extract::{Extraction, ResultExtractor, SignalRequest, SignalSource, parse_total_mass};
pub use hash::design_fingerprint;
pub use record::EvaluationRecord;
pub use reduce::{
    MetricFn, MetricInputs, MetricSpec, ObjectiveReducer, ReductionContext, parse_metric,
};
pub use run_manager::{CleanupPolicy, MAX_ALLOCATION_ATTEMPTS, RunManager, load_evaluation_at};
pub use signal::{Sample, SignalRecord, SignalSet, gradient, names, samples};
pub use table::Table;
