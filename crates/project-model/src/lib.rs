//! Montage Project Model
//!
//! Defines the core data contracts for Montage projects:
//! - **Assets:** Imported source media and the catalog that owns them
//! - **Clips & Text:** Time-bounded instances placed on the timeline
//! - **Timeline:** The aggregate state every edit transforms, plus derivations
//!   (duration, visibility, layer order)
//! - **Project:** Top-level document persisted to disk
//!
//! Times are seconds on the virtual timeline. Text overlay positions are
//! percentages of the output frame so placement survives resolution changes.

pub mod asset;
pub mod clip;
pub mod geometry;
pub mod project;
pub mod text;
pub mod timeline;
pub mod transition;

pub use asset::*;
pub use clip::*;
pub use geometry::*;
pub use project::*;
pub use text::*;
pub use timeline::*;
pub use transition::*;
