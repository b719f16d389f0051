//! sob-solver: drives the external two-phase explicit solver.
//!
//! Provides:
//! - `SolverExecutables` resolved from an install root, with per-binary overrides
//! - `SolverInvocation` (np, nt, working directory, timeout, cancellation)
//! - Guarded child processes that never outlive a timeout or cancellation
//! - `SolverDriver`, the starter → engine state machine returning a typed `SolverOutcome`
//! - `SlotPool`, a weighted semaphore over solver cores
//!
//! # Example
//!
//! ```
//! use sob_core::RunId;
//! use sob_solver::{Phases, SolverExecutables, SolverInvocation};
//!
//! let inv = SolverInvocation::new(
//!     SolverExecutables::from_install_root("/opt/OpenRadioss"),
//!     "/tmp/starbox_deck1",
//!     RunId::new(1),
//! )
//! .with_resources(4, 2)
//! .with_phases(Phases::StarterOnly);
//!
//! assert_eq!((inv.np, inv.nt), (1, 1));
//! ```

pub mod cancel;
pub mod driver;
pub mod error;
pub mod executables;
pub mod invocation;
pub mod listing;
pub mod outcome;
pub mod process;
pub mod slots;

pub use cancel::CancelToken;
pub use driver::{DriverState, SolverDriver};
pub use error::{SolverError, SolverResult};
pub use executables::SolverExecutables;
pub use invocation::{Phases, SolverInvocation};
pub use listing::{NORMAL_TERMINATION, raw_outputs};
pub use outcome::{FailureReason, OutputFiles, Phase, SolverOutcome};
pub use process::{ChildGuard, ProcessExit, WaitLimits, run_to_completion, run_with_stdout};
pub use slots::{SlotGuard, SlotPool};
