use std::time::Duration;

use log::debug;

use crate::client::{Attempts, RequestOptions};
use crate::error::{BadIdentify, IdentifyError, TransferError};
use crate::message::Message;
use crate::transport::BusAdapter;
use crate::Client;

use super::subject;

const IDENTIFY_TIMEOUT: Duration = Duration::from_millis(100);
const IDENTIFY_ATTEMPTS: u32 = 10;

/// The decoded reply to an identify request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identify {
	/// Bootloader type nibble.
	pub bootloader_type: u8,
	/// Bootloader version nibble.
	pub version: u8,
	/// Size of one flash page in bytes.
	pub pagesize: u16,
	/// Number of flash pages available for the application.
	pub pages: u16,
}

impl TryFrom<&Message> for Identify {
	type Error = BadIdentify;

	fn try_from(message: &Message) -> Result<Self, BadIdentify> {
		let data = message.data();
		if data.len() < 4 {
			return Err(BadIdentify::ShortResponse { len: data.len() });
		}
		let pagesize = match data[1] {
			0 => 32,
			1 => 64,
			2 => 128,
			3 => 256,
			index => return Err(BadIdentify::UnknownPagesize { index }),
		};
		Ok(Self {
			bootloader_type: data[0] >> 4,
			version: data[0] & 0x0F,
			pagesize,
			pages: u16::from(data[2]) << 8 | u16::from(data[3]),
		})
	}
}

impl<T: BusAdapter> Client<T> {
	/// Connect to the bootloader of the addressed board.
	///
	/// Sends identify requests until the bootloader answers, then fills in
	/// the board record from the reply. Blocks until a target responds; a
	/// board that never enters its bootloader keeps this retrying forever.
	pub fn identify(&mut self) -> Result<(), IdentifyError<T::Error>> {
		let options = RequestOptions {
			timeout: IDENTIFY_TIMEOUT,
			attempts: Attempts::Limited(IDENTIFY_ATTEMPTS),
			..Default::default()
		};

		let response = loop {
			if let Some(hook) = self.reset_hook.as_mut() {
				hook(&self.transport, self.board.id).map_err(IdentifyError::Send)?;
			}
			match self.transfer(subject::IDENTIFY, &[], &options) {
				Ok(response) => break response,
				Err(TransferError::Send(error)) => return Err(IdentifyError::Send(error)),
				Err(error) => debug!("identify attempt failed: {}", error),
			}
		};

		let identify = Identify::try_from(&response)?;
		self.apply_identify(&identify);
		Ok(())
	}

	pub(crate) fn apply_identify(&mut self, identify: &Identify) {
		self.board.bootloader_type = identify.bootloader_type;
		self.board.version = identify.version;
		self.board.pagesize = identify.pagesize;
		self.board.pages = identify.pages;
		self.board.connected = true;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::message::MessageType;
	use assert2::{assert, let_assert};

	#[test]
	fn test_decode_identify_reply() {
		let message = Message::new(0x10, MessageType::Success, subject::IDENTIFY, 0, 0, &[0x21, 0x02, 0x01, 0x00]);
		let_assert!(Ok(identify) = Identify::try_from(&message));
		assert!(identify.bootloader_type == 2);
		assert!(identify.version == 1);
		assert!(identify.pagesize == 128);
		assert!(identify.pages == 256);
	}

	#[test]
	fn test_decode_rejects_unknown_pagesize() {
		let message = Message::new(0x10, MessageType::Success, subject::IDENTIFY, 0, 0, &[0x21, 0x04, 0x01, 0x00]);
		let_assert!(Err(BadIdentify::UnknownPagesize { index: 4 }) = Identify::try_from(&message));
	}

	#[test]
	fn test_decode_rejects_short_replies() {
		let message = Message::new(0x10, MessageType::Success, subject::IDENTIFY, 0, 0, &[0x21, 0x02]);
		let_assert!(Err(BadIdentify::ShortResponse { len: 2 }) = Identify::try_from(&message));
	}
}
