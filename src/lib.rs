#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-layouts
//!
//! mesh-layouts keeps the distributed index layouts of a partitioned mesh
//! consistent and moves per-element data along them. Every process owns
//! one part of the mesh; an [`Interface`](layout::Interface) lists the local
//! elements it shares with one partner process, a [`Layout`](layout::Layout)
//! groups the interfaces of one role, and a [`LayoutMap`](layout::LayoutMap)
//! keeps layouts per element kind and key (usually a grid level).
//!
//! ## Features
//! - Index-stable interfaces with cursors that survive erasure of other entries
//! - Bulk index remapping and explicit maintenance passes after topology changes
//! - Process-independent [`GlobalId`](topology::global_id::GlobalId)s and
//!   [`GlobalLayout`](global::GlobalLayout)s for rebuilding interfaces after
//!   redistribution
//! - Payload-agnostic [`CommunicationPolicy`](policy::CommunicationPolicy)
//!   exchange in explicit rounds ([`InterfaceCommunicator`](algs::InterfaceCommunicator))
//! - Pluggable transport: serial, in-process threads, MPI
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-layouts = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! ## Determinism
//!
//! Layouts iterate partners in ascending rank order and interfaces in
//! insertion order. Both orders are part of the wire contract: two processes
//! that declared matching interfaces in the same order exchange values
//! position by position.

pub mod algs;
pub mod debug_invariants;
pub mod global;
pub mod layout;
pub mod layout_error;
pub mod policy;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use layout_error::LayoutError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::interface_comm::{
        CommunicationReport, ExchangeOptions, InterfaceCommunicator, exchange_layout_data,
    };
    pub use crate::algs::verify::verify_layouts;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::global::{
        GlobalLayout, build_layout_from_global_layout, create_global_layout,
        merge_global_layout,
    };
    pub use crate::layout::{
        IndexLayout, Interface, InterfaceRole, Layout, LayoutKey, LayoutMap, LevelKey,
        replace_indices_in_layout,
    };
    pub use crate::layout_error::LayoutError;
    pub use crate::policy::{BufferSize, CommunicationPolicy};
    pub use crate::topology::element::{ElementId, ElementKind};
    pub use crate::topology::global_id::{GlobalId, GlobalIdLookup, GlobalIdRegistry};
    pub use crate::topology::grid::{GridAccess, InMemoryGrid};
}
