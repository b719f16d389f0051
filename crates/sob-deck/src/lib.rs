//! sob-deck: solver input decks for the evaluation harness.
//!
//! Provides:
//! - Per-topology deck templates (materials, impactor, supports, output requests)
//! - Fixed-width card formatting
//! - `InputDeckWriter` producing the starter deck, its includes and the engine deck
//!
//! # Example
//!
//! ```
//! use sob_core::Topology;
//! use sob_deck::DeckTemplate;
//!
//! let template = DeckTemplate::for_topology(Topology::StarBox);
//! assert_eq!(template.deck_base(), "combine");
//! assert_eq!(template.track_column().occurrence, 3);
//! ```

pub mod cards;
pub mod error;
pub mod template;
pub mod writer;

pub use error::{DeckError, DeckResult};
pub use template::{
    Axis, BoundaryCondition, ColumnKey, DeckTemplate, ForceChannel, Ground, Impactor,
    ImpactorShape, MaterialLaw, OutputRequest, ShellFormulation,
};
pub use writer::{DeckSet, InputDeckWriter};
