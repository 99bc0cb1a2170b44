//! Process-independent layouts used during redistribution.

pub mod exchange;
pub mod global_layout;

pub use exchange::{
    GlobalLayoutTicket, exchange_global_layouts, receive_global_layout, send_global_layout,
};
pub use global_layout::{
    GlobalLayout, build_layout_from_global_layout, create_global_layout,
    deserialize_and_add_global_layout, merge_global_layout, serialize_global_layout,
};
