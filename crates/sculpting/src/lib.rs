//! Chisel sculpting engine.
//!
//! This crate turns pointer input into mesh deformation:
//! - [`brush`] - falloff curves and the draw/clay/flatten displacement math
//! - [`stroke`] - frame-rate-independent path resampling and touched-set
//!   accumulation
//! - [`models`] - the engine-side registry of sculptable meshes
//! - [`history`] - snapshot-based undo/redo scoped per mesh
//! - [`editor`] - the per-frame entry point tying brush, stroke, normals,
//!   and BVH refit together
//!
//! # Architecture
//!
//! The engine is single-threaded and frame-driven: collaborators hand in a
//! pointer state and a pick ray once per rendered frame, and
//! [`editor::SculptEditor::process_frame`] performs raycast, stroke
//! resampling, displacement, incremental normal refresh, and BVH refit
//! synchronously before returning the cursor transform for rendering.

pub mod brush;
pub mod editor;
pub mod history;
pub mod models;
pub mod stroke;

pub use brush::*;
pub use editor::*;
pub use history::*;
pub use models::*;
pub use stroke::*;
