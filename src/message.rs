//! Message model and frame codec of the bootloader protocol.
//!
//! Every message travels in a single CAN frame. The first four payload bytes
//! are the header, up to four more carry data:
//!
//! | byte | meaning                      |
//! |------|------------------------------|
//! | 0    | board identifier             |
//! | 1    | `(type << 6) \| subject`     |
//! | 2    | message number               |
//! | 3    | data counter                 |
//! | 4..7 | data (0 to 4 bytes)          |

use core::fmt;

use crate::commands::subject_name;
use crate::error::BadFormat;
use crate::transport::Frame;

/// CAN identifier used for all host to target bootloader frames.
pub const HOST_FRAME_ID: u32 = 0x7FF;

/// CAN identifier the targets answer on.
pub const TARGET_FRAME_ID: u32 = 0x7FE;

/// High bit of the data counter, marking the first message of a block.
///
/// The low 7 bits count down to zero over the messages of a block; the
/// message with counter zero is acknowledged for the whole block.
pub const START_OF_BLOCK: u8 = 0x80;

/// The message type, stored in the two high bits of header byte 1.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageType {
	/// A request from the host.
	Request = 0,
	/// The target acknowledges a request.
	Success = 1,
	/// The target rejects a request.
	Error = 2,
	/// The target expected a different message number and reports its own.
	WrongNumber = 3,
}

impl MessageType {
	fn from_raw(raw: u8) -> Self {
		match raw & 0x03 {
			0 => Self::Request,
			1 => Self::Success,
			2 => Self::Error,
			_ => Self::WrongNumber,
		}
	}
}

impl fmt::Display for MessageType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Request => "request",
			Self::Success => "success",
			Self::Error => "error",
			Self::WrongNumber => "wrong_number",
		};
		f.write_str(name)
	}
}

/// A single message of the bootloader protocol.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
	/// Destination board for requests, source board for replies.
	pub board_id: u8,
	/// The message type.
	pub message_type: MessageType,
	/// The operation code (see [`crate::commands::subject`]).
	pub subject: u8,
	/// Rolling message number, used by the target to detect lost messages.
	pub number: u8,
	/// Block control byte (see [`START_OF_BLOCK`]).
	pub data_counter: u8,
	data: [u8; 4],
	data_len: u8,
}

impl Message {
	/// Create a message with an explicit type.
	pub fn new(board_id: u8, message_type: MessageType, subject: u8, number: u8, data_counter: u8, data: &[u8]) -> Self {
		debug_assert!(data.len() <= 4);
		let data_len = data.len().min(4);
		let mut buffer = [0; 4];
		buffer[..data_len].copy_from_slice(&data[..data_len]);
		Self {
			board_id,
			message_type,
			subject,
			number,
			data_counter,
			data: buffer,
			data_len: data_len as u8,
		}
	}

	/// Create a request message.
	pub fn request(board_id: u8, subject: u8, number: u8, data_counter: u8, data: &[u8]) -> Self {
		Self::new(board_id, MessageType::Request, subject, number, data_counter, data)
	}

	/// The data bytes of the message (0 to 4 bytes).
	pub fn data(&self) -> &[u8] {
		&self.data[..usize::from(self.data_len)]
	}

	/// Encode the message as an outbound CAN frame.
	pub fn to_frame(&self) -> Frame {
		let mut payload = [0; 8];
		payload[0] = self.board_id;
		payload[1] = (self.message_type as u8) << 6 | self.subject;
		payload[2] = self.number;
		payload[3] = self.data_counter;
		payload[4..4 + usize::from(self.data_len)].copy_from_slice(self.data());
		Frame::new(HOST_FRAME_ID, &payload[..4 + usize::from(self.data_len)])
	}

	/// Decode a received CAN frame.
	///
	/// Bootloader frames are plain data frames with at least the four header
	/// bytes; anything else is rejected as [`BadFormat`].
	pub fn from_frame(frame: &Frame) -> Result<Self, BadFormat> {
		let data = frame.data();
		if frame.is_extended() || frame.is_rtr() || data.len() < 4 {
			return Err(BadFormat {
				extended: frame.is_extended(),
				rtr: frame.is_rtr(),
				data_len: data.len(),
			});
		}
		Ok(Self::new(
			data[0],
			MessageType::from_raw(data[1] >> 6),
			data[1] & 0x3F,
			data[2],
			data[3],
			&data[4..],
		))
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}.{} id 0x{:x} [{:x}] {} >",
			subject_name(self.subject).to_uppercase(),
			self.message_type,
			self.board_id,
			self.number,
			self.data_counter,
		)?;
		for byte in self.data() {
			write!(f, " {:02x}", byte)?;
		}
		Ok(())
	}
}
