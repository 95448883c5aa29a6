//! VM Host IPC
//!
//! Runs a [`vmhost::VmHost`] in a separate process and talks to it over a
//! pair of pipes, so that a crashing contract engine cannot take the node
//! down with it.
//!
//! ```text
//! node process                         vm process
//! ┌──────────────────────┐  requests  ┌──────────────────────┐
//! │ VmDriver<Connector>  │ ─────────▶ │ VmPart               │
//! │ (VmExecutionHandler) │ ◀───────── │   └─ VmHost          │
//! └──────────────────────┘  responses └──────────────────────┘
//! ```
//!
//! Each frame is a little-endian `u32` length followed by a `bincode`
//! encoded [`Message`].

#![warn(missing_docs)]
#![deny(clippy::arithmetic_side_effects)]

pub mod codec;
pub mod driver;
pub mod error;
pub mod message;
pub mod vm_part;

pub use codec::{read_message, write_message, MAX_FRAME_LEN};
pub use driver::{Connector, ProcessConnector, VmDriver};
pub use error::{IpcError, Result};
pub use message::Message;
pub use vm_part::VmPart;
