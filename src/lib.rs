//! `udp-window-ftp`: reliable file transfer over UDP with a fixed
//! five-slot sliding window.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  filename   ┌──────────┐
//!  │  client  │────────────▶│  server  │
//!  └────┬─────┘             └────┬─────┘
//!       │                        │
//!  ┌────▼─────┐   SIZE/DATA  ┌───▼──────┐
//!  │ Receiver │◀─────────────│  Sender  │
//!  │ (pwrite) │─────────────▶│ (window) │
//!  └────┬─────┘     ACKs     └────┬─────┘
//!       │   1024-byte frames      │
//!  ┌────▼─────────────────────────▼────┐
//!  │  Socket  (over any Datagram impl) │
//!  └───────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     : frame layout, CRC32 checksum, encode / decode
//! - [`window`]     : five-slot selective-ack window
//! - [`state`]      : sender state machine type
//! - [`sender`]     : announce, stream, drain, terminate
//! - [`receiver`]   : size handshake and positional reassembly
//! - [`server`]     : request handling and file source
//! - [`client`]     : request issuing and file sink
//! - [`config`]     : timing knobs
//! - [`socket`]     : frame-oriented datagram socket
//! - [`simulator`]  : loss / corruption / duplication for testing
//! - [`error`]      : crate error type

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod window;

pub use config::TransferConfig;
pub use error::TransferError;
pub use receiver::{ReceiveReport, Receiver};
pub use sender::{Sender, TransferReport};
pub use socket::Socket;
