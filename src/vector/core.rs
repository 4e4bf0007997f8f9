//! Core data structures for vector search: the vector itself and the
//! distance metrics collections are created with.

pub mod distance;
pub mod vector;
