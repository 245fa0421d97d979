use crate::message::Message;
use crate::transport::BusAdapter;
use crate::Client;

use super::subject;

impl<T: BusAdapter> Client<T> {
	/// Ask the application on the addressed board to enter its bootloader.
	///
	/// Only works if the application implements the request. It is sent once
	/// with message number zero, outside the numbered request sequence, and
	/// no reply is expected.
	pub fn start_bootloader(&self) -> Result<(), T::Error> {
		let message = Message::request(self.board.id, subject::START_BOOTLOADER, 0, 0, &[]);
		self.transport.send(&message.to_frame())
	}
}
