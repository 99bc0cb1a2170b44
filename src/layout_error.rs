//! LayoutError: unified error type for mesh-layouts public APIs
//!
//! Every fallible operation in this crate returns `Result<_, LayoutError>`.
//! Variants carry the partner rank, element kind and element/global id
//! involved so a failure can be reconstructed without rerunning.

use crate::layout::interface::InterfaceRole;
use crate::topology::element::ElementKind;
use crate::topology::global_id::GlobalId;
use thiserror::Error;

/// Unified error type for layout and communication operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The same element was inserted twice into one interface.
    #[error("element `{element}` already present in interface to rank {partner}")]
    DuplicateElement { partner: usize, element: String },

    /// Strict lookup of a layout key that does not exist.
    #[error("no {kind} layout registered under key `{key}`")]
    MissingLayout { kind: ElementKind, key: String },

    /// A layout is stored under a key of the other role.
    #[error("{kind} layout under `{key}` is {found} but the key demands {expected}")]
    RoleMismatch {
        kind: ElementKind,
        key: String,
        expected: InterfaceRole,
        found: InterfaceRole,
    },

    /// Strict lookup of an interface that does not exist.
    #[error("no interface to rank {partner} in layout")]
    MissingInterface { partner: usize },

    /// A process tried to hold an interface to itself.
    #[error("rank {rank} cannot hold an interface to itself")]
    SelfInterface { rank: usize },

    /// An element has no registered global id.
    #[error("{kind} element `{element}` has no global id")]
    MissingGlobalId { kind: ElementKind, element: String },

    /// A handle does not name an element of the local mesh.
    #[error("{kind} element `{element}` does not exist in the local mesh")]
    UnknownElement { kind: ElementKind, element: String },

    /// A global id has no local element on this process.
    #[error("global id {id} is unknown on this process")]
    UnknownGlobalId { id: GlobalId },

    /// An operation needed a mesh capability that is disabled.
    #[error("mesh capability `{0}` is not enabled")]
    MissingCapability(&'static str),

    /// A policy wrote a different number of bytes than it announced.
    #[error("policy announced {expected} bytes for rank {partner} but wrote {actual}")]
    BufferSizeMismatch {
        partner: usize,
        expected: usize,
        actual: usize,
    },

    /// Incoming data could not be decoded. Unrecoverable for the round.
    #[error("malformed message from rank {neighbor}: {reason}")]
    MalformedMessage { neighbor: usize, reason: String },

    /// A policy refused incoming values because they conflict with local state.
    #[error("inconsistent data received from rank {neighbor} ({failures} interface(s) rejected)")]
    Consistency { neighbor: usize, failures: usize },

    /// Two sides of a master/slave interface pair disagree.
    #[error("interface mismatch with rank {partner}: {reason}")]
    InterfaceMismatch { partner: usize, reason: String },

    /// Transport-level failure.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },

    /// A peer rank is outside the communicator.
    #[error("rank {rank} is outside communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
}
