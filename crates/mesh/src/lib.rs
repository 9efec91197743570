//! Chisel mesh core - deformable triangle buffers and spatial indexing.
//!
//! This crate provides the data layer the sculpting engine works against:
//! - [`mesh::TriMesh`] - flat position/normal/index buffers with build-time validation
//! - [`bvh::Bvh`] - flat-arena bounding volume hierarchy with tri-state sphere
//!   queries and partial refit
//! - [`raycast`] - Moller-Trumbore picking against the BVH
//! - [`normals`] - full and incremental vertex-normal recomputation
//! - [`generators`] - deterministic procedural meshes for tests and demos

pub mod bvh;
pub mod generators;
pub mod mesh;
pub mod normals;
pub mod raycast;

pub use bvh::*;
pub use generators::*;
pub use mesh::*;
pub use normals::*;
pub use raycast::*;
