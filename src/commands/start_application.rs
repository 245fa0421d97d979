use crate::client::RequestOptions;
use crate::error::TransferError;
use crate::transport::BusAdapter;
use crate::Client;

use super::subject;

impl<T: BusAdapter> Client<T> {
	/// Leave the bootloader and start the application.
	pub fn start_application(&mut self) -> Result<(), TransferError<T::Error>> {
		self.transfer(subject::START_APPLICATION, &[], &RequestOptions::default())?;
		Ok(())
	}
}
