//! Host-side driver for a CAN bus bootloader.
//!
//! Boards running the bootloader answer on a fixed CAN identifier and are
//! addressed by a one-byte board id. The [`Client`] owns the request/response
//! discipline of the protocol: message numbering with resynchronization,
//! retransmission on timeouts, and the block-pipelined page transfer used to
//! program and verify flash. The [`commands`] module adds one session
//! operation per protocol subject, up to scanning a whole bus for boards.
//!
//! The bus itself is reached through the [`transport::BusAdapter`] trait;
//! with the `socketcan` feature (enabled by default) an adapter for Linux
//! SocketCAN interfaces is available.

pub mod commands;
pub mod transport;

mod board;
mod client;
mod error;
mod message;

pub use board::Board;
pub use client::{Attempts, Client, RequestOptions};
pub use error::BadFormat;
pub use error::BadIdentify;
pub use error::IdentifyError;
pub use error::ImageTooLarge;
pub use error::NoResponse;
pub use error::PageVerifyFailed;
pub use error::PageWriteFailed;
pub use error::ProgramError;
pub use error::ProtocolError;
pub use error::TransferError;
pub use error::VerifyError;
pub use error::VerifyUnsupported;
pub use message::{Message, MessageType, HOST_FRAME_ID, START_OF_BLOCK, TARGET_FRAME_ID};
