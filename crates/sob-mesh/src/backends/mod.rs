//! Procedural backends, one per catalog topology.

mod crash_tube;
mod star_box;
mod three_point_bending;

pub use crash_tube::CrashTubeBackend;
pub use star_box::StarBoxBackend;
pub use three_point_bending::ThreePointBendingBackend;

/// Node set names the deck templates rely on.
pub mod sets {
    pub const BASE: &str = "base";
    pub const TOP: &str = "top";
    pub const SUPPORT_START: &str = "support_start";
    pub const SUPPORT_END: &str = "support_end";
}
