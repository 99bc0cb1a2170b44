//! Communication: transport, framing, interface rounds and layout checks.

pub mod communicator;
pub mod interface_comm;
pub mod verify;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, ThreadComm};
pub use interface_comm::{
    CommunicationReport, ExchangeOptions, InterfaceCommunicator, RawTicket, exchange_layout_data,
};
pub use verify::{LayoutVerification, verify_layouts};
