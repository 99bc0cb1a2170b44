//! Interfaces, layouts and layout maps, plus their maintenance utilities.

pub mod derive;
pub mod diagnostics;
pub mod index_layout;
pub mod interface;
#[allow(clippy::module_inception)]
pub mod layout;
pub mod layout_map;
pub mod maintenance;

pub use derive::{derive_interfaces, derive_layouts};
pub use diagnostics::{log_index_layout, log_index_layout_on_all_procs};
pub use index_layout::{
    IndexInterface, IndexLayout, IndexRemap, add_entries_to_index_layout, max_index,
    replace_indices_in_interface, replace_indices_in_layout, replace_indices_in_layout_map,
};
pub use interface::{Interface, InterfaceCursor, InterfaceRole};
pub use layout::Layout;
pub use layout_map::{LayoutKey, LayoutMap, LevelKey};
pub use maintenance::{
    ErasedElementTracker, prune_missing_elements, remove_elements_from_layout,
    remove_elements_from_layouts,
};
