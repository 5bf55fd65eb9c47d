//! Service Module
//!
//! Replica acknowledgment accounting for the write coordinator.
//!
//! ## Responsibilities
//! - Describe which endpoints share a datacenter (snitches)
//! - Translate a consistency level into a required acknowledgment count
//! - Count acknowledgments and release the waiting coordinator
//!
//! ## Flow
//! ```text
//!   network threads ──response()──►┌──────────────────────┐
//!   network threads ──response()──►│ WriteResponseHandler │──► coordinator
//!   network threads ──response()──►│  policy: which count │   await_completion()
//!                                  └──────────────────────┘
//! ```
//! The handler never touches disk and the segment writer never waits on
//! the network.

mod consistency;
mod message;
mod response_handler;
mod snitch;

pub use consistency::ConsistencyLevel;
pub use message::Message;
pub use response_handler::{AllResponses, LocalDatacenter, ResponsePolicy, WriteResponseHandler};
pub use snitch::{EndpointSnitch, RackInferringSnitch, StaticSnitch};
