use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::board::Board;
use crate::client::{Attempts, RequestOptions};
use crate::error::TransferError;
use crate::message::{Message, START_OF_BLOCK};
use crate::transport::BusAdapter;
use crate::Client;

use super::{subject, Identify};

/// Period of the scrubber that keeps the bus attentive before a scan.
const SCRUB_PERIOD: Duration = Duration::from_millis(50);

/// Wait between starting a bootloader and probing it.
const START_DELAY: Duration = Duration::from_millis(20);

const PROBE_TIMEOUT: Duration = Duration::from_millis(100);
const PROBE_ATTEMPTS: u32 = 2;

/// Progress report of a bus scan.
#[derive(Debug)]
pub enum ScanEvent<'a> {
	/// A board answered an identify request.
	Found(&'a Board),
	/// The probed id did not answer.
	NoReply(u8),
}

impl<T: BusAdapter + Sync> Client<T> {
	/// Probe every board id on the bus.
	///
	/// While `wait_for_operator` runs (typically a prompt), a scrubber thread
	/// sends no-operation messages to board id 0 so attached boards stay
	/// responsive while the operator prepares the hardware. Afterwards every
	/// id from 1 to 254 is asked to start its bootloader and identified;
	/// `on_event` reports the outcome per id.
	///
	/// Returns the ids that answered. The board addressed before the scan is
	/// restored when the scan is done.
	pub fn scan<W, F>(&mut self, wait_for_operator: W, mut on_event: F) -> Result<Vec<u8>, T::Error>
	where
		W: FnOnce(),
		F: FnMut(ScanEvent<'_>),
	{
		let original = self.board.clone();

		let transport = &self.transport;
		let scrub_frame = Message::request(0, subject::NO_OPERATION, 0, START_OF_BLOCK, &[]).to_frame();
		let stop = AtomicBool::new(false);
		thread::scope(|scope| {
			let scrubber = scope.spawn(|| {
				while !stop.load(Ordering::Relaxed) {
					if let Err(error) = transport.send(&scrub_frame) {
						debug!("scrubbing the bus failed: {:?}", error);
					}
					thread::sleep(SCRUB_PERIOD);
				}
			});

			wait_for_operator();

			stop.store(true, Ordering::Relaxed);
			let _ = scrubber.join();
		});

		let mut found = Vec::new();
		for id in 1..=254 {
			match self.probe(id) {
				Ok(Some(identify)) => {
					self.apply_identify(&identify);
					debug!("found {}", self.board);
					on_event(ScanEvent::Found(&self.board));
					found.push(id);
				},
				Ok(None) => on_event(ScanEvent::NoReply(id)),
				Err(error) => {
					self.set_target(original);
					return Err(error);
				},
			}
		}

		self.set_target(original);
		Ok(found)
	}

	/// Start and identify the bootloader of a single board id.
	fn probe(&mut self, id: u8) -> Result<Option<Identify>, T::Error> {
		// Condition the bus before addressing the board.
		self.set_target(Board::new(0));
		self.message_number = 0;
		self.write_request(subject::NO_OPERATION, &[], START_OF_BLOCK)?;

		self.set_target(Board::new(id));
		self.start_bootloader()?;
		thread::sleep(START_DELAY);

		self.message_number = 0;
		let options = RequestOptions {
			timeout: PROBE_TIMEOUT,
			attempts: Attempts::Limited(PROBE_ATTEMPTS),
			..Default::default()
		};
		match self.transfer(subject::IDENTIFY, &[], &options) {
			Ok(response) => Ok(Identify::try_from(&response).ok()),
			Err(TransferError::Send(error)) => Err(error),
			Err(error) => {
				debug!("board {} did not answer: {}", id, error);
				Ok(None)
			},
		}
	}
}
