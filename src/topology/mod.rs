//! Mesh-side vocabulary: element handles and kinds, global ids, the grid
//! access trait, structural change messages and per-element marking state.

pub mod element;
pub mod global_id;
pub mod grid;
pub mod hub;
pub mod subsets;
