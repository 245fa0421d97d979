use std::time::Duration;

use crate::client::{Attempts, RequestOptions};
use crate::error::TransferError;
use crate::transport::BusAdapter;
use crate::Client;

use super::subject;

const SET_ID_TIMEOUT: Duration = Duration::from_millis(50);

impl<T: BusAdapter> Client<T> {
	/// Assign a new bus identifier to the addressed board.
	///
	/// The board may reset while storing the id and miss the retransmissions,
	/// so the request is repeated without an attempt limit until an
	/// acknowledgement arrives.
	pub fn set_board_id(&mut self, new_id: u8) -> Result<(), TransferError<T::Error>> {
		self.message_number = 0;
		self.transfer(
			subject::SET_BOARD_ID,
			&[new_id],
			&RequestOptions {
				timeout: SET_ID_TIMEOUT,
				attempts: Attempts::Unlimited,
				..Default::default()
			},
		)?;
		Ok(())
	}
}
