//! Montage Editing: the Timeline Store and everything that mutates it.
//!
//! - **Edits:** Add, split, duplicate, move, trim, ripple, rolling, slide,
//!   layer swaps, deletes, and attribute changes as pure state transforms
//! - **History:** Bounded cursor-based undo/redo of timeline snapshots
//! - **Store:** Facade that applies edits and records history
//! - **Interaction:** Hit-testing, pointer grabs, and drags
//! - **Keymap:** Fixed keyboard shortcuts mapped to store commands
//!
//! This crate is pure computation with no I/O or rendering.

pub mod error;
pub mod history;
pub mod interaction;
pub mod keymap;
pub mod ops;
pub mod store;

pub use error::EditError;
pub use history::{History, HistoryStep};
pub use interaction::InteractionController;
pub use ops::{apply, EditOp, EditParams};
pub use store::TimelineStore;
