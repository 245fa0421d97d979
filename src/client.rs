use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::board::Board;
use crate::error::{NoResponse, ProtocolError, TransferError};
use crate::message::{Message, MessageType, START_OF_BLOCK, TARGET_FRAME_ID};
use crate::transport::{BusAdapter, FrameFilter};

/// Capacity of the inbound response queue.
///
/// The protocol is strictly request/response; the queue only has to absorb
/// stale duplicates caused by retransmitted requests.
const RESPONSE_QUEUE_DEPTH: usize = 16;

/// Settle time after the target reported a wrong message number, so trailing
/// error reports can arrive and be discarded together.
const WRONG_NUMBER_SETTLE: Duration = Duration::from_millis(100);

/// Number of transmission attempts for a request.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Attempts {
	/// Give up after the given number of attempts.
	Limited(u32),
	/// Keep retransmitting until the target answers.
	///
	/// Used when the target may reset while handling the request and miss an
	/// unknown number of retransmissions.
	Unlimited,
}

/// Retry and timeout parameters for a single request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
	/// Data counter field of the request.
	///
	/// [`START_OF_BLOCK`] for a self-contained request; the page transfer
	/// uses the counter to delimit blocks.
	pub data_counter: u8,

	/// How long to wait for a reply before retransmitting.
	pub timeout: Duration,

	/// Transmission attempts before giving up with
	/// [`NoResponse`](crate::NoResponse).
	pub attempts: Attempts,
}

impl Default for RequestOptions {
	fn default() -> Self {
		Self {
			data_counter: START_OF_BLOCK,
			timeout: Duration::from_millis(500),
			attempts: Attempts::Limited(2),
		}
	}
}

/// Outcome of waiting for the reply to one transmission.
enum Reply {
	/// The target acknowledged the request.
	Accepted(Message),
	/// The message number was adopted from the target; retransmit right away.
	Resynced,
	/// Timed out or reported out of sync; counts as a failed attempt.
	Failed,
	/// The target rejected the request for good.
	Rejected(ProtocolError),
}

/// A bootloader session with a single board.
///
/// The client owns the request/response discipline of the protocol: it keeps
/// the rolling message number, matches replies to requests, retransmits on
/// timeouts and resynchronizes the message number when a session starts in
/// the middle of a numbering sequence.
///
/// Replies are delivered by the bus adapter on its receive thread; a filter
/// registered at construction decodes them and queues them for the session.
/// Only replies from the currently addressed board pass the filter.
pub struct Client<T: BusAdapter> {
	pub(crate) transport: T,
	pub(crate) board: Board,
	pub(crate) target_id: Arc<AtomicU8>,
	pub(crate) message_number: u8,
	pub(crate) responses: Receiver<Message>,
	pub(crate) reset_hook: Option<ResetHook<T>>,
}

pub(crate) type ResetHook<T> = Box<dyn FnMut(&T, u8) -> Result<(), <T as BusAdapter>::Error> + Send>;

impl<T: BusAdapter> Client<T> {
	/// Create a client for the board with the given id.
	///
	/// Registers the bootloader reply filter with the adapter. The adapter is
	/// owned by the client; use [`Self::transport()`] to reach it.
	pub fn new(transport: T, board_id: u8) -> Self {
		let (sender, responses) = mpsc::sync_channel(RESPONSE_QUEUE_DEPTH);
		let target_id = Arc::new(AtomicU8::new(board_id));
		let filter_target = Arc::clone(&target_id);
		let filter = FrameFilter::new(TARGET_FRAME_ID, false, false, move |frame| {
			let message = match Message::from_frame(frame) {
				Ok(message) => message,
				Err(_) => return,
			};
			trace!("> {}", message);
			if message.board_id != filter_target.load(Ordering::Relaxed) {
				return;
			}
			// The callback runs on the delivery thread and must not block;
			// a full queue drops the reply and the request times out.
			let _ = sender.try_send(message);
		});
		transport.add_filter(filter);

		Self {
			transport,
			board: Board::new(board_id),
			target_id,
			message_number: 0,
			responses,
			reset_hook: None,
		}
	}

	/// The board this session is talking to.
	pub fn board(&self) -> &Board {
		&self.board
	}

	/// Get a reference to the underlying bus adapter.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Install a hook that runs before every identify request.
	///
	/// Some setups need an out-of-band frame to force the target into its
	/// bootloader; the hook receives the adapter and the addressed board id.
	pub fn set_reset_hook(&mut self, hook: impl FnMut(&T, u8) -> Result<(), T::Error> + Send + 'static) {
		self.reset_hook = Some(Box::new(hook));
	}

	/// Replace the addressed board.
	///
	/// Must only be called while no request is in flight: the reply filter
	/// reads the id from its own thread.
	pub(crate) fn set_target(&mut self, board: Board) {
		self.target_id.store(board.id, Ordering::Relaxed);
		self.board = board;
	}

	/// Send a request without waiting for a reply.
	///
	/// The message number is still consumed.
	pub fn write_request(&mut self, subject: u8, data: &[u8], data_counter: u8) -> Result<(), T::Error> {
		let message = Message::request(self.board.id, subject, self.message_number, data_counter, data);
		trace!("< {}", message);
		self.transport.send(&message.to_frame())?;
		self.message_number = self.message_number.wrapping_add(1);
		Ok(())
	}

	/// Send a request and wait for the matching reply.
	///
	/// Retransmits on timeouts until the attempts are used up. Replies whose
	/// subject does not match the request are stale leftovers of an earlier
	/// exchange and are discarded.
	///
	/// If the target reports a wrong message number on the first message of a
	/// session (local number zero), the reported number is adopted and the
	/// request retransmitted. A wrong number in mid-session means the session
	/// lost synchronization and counts as a failed attempt.
	pub fn transfer(&mut self, subject: u8, data: &[u8], options: &RequestOptions) -> Result<Message, TransferError<T::Error>> {
		let mut request = Message::request(self.board.id, subject, self.message_number, options.data_counter, data);

		// Leftovers of an earlier exchange must not be mistaken for a reply.
		self.drain_responses();

		let mut attempts_used = 0;
		loop {
			trace!("< {}", request);
			self.transport.send(&request.to_frame()).map_err(TransferError::Send)?;

			match self.await_reply(&mut request, options.timeout) {
				Reply::Accepted(response) => {
					self.message_number = self.message_number.wrapping_add(1);
					return Ok(response);
				},
				Reply::Resynced => continue,
				Reply::Rejected(error) => return Err(error.into()),
				Reply::Failed => {
					attempts_used += 1;
					if let Attempts::Limited(attempts) = options.attempts {
						if attempts_used >= attempts {
							// A lost exchange still consumes the message number.
							self.message_number = self.message_number.wrapping_add(1);
							return Err(NoResponse {
								attempts: attempts_used,
								timeout: options.timeout,
								subject,
							}
							.into());
						}
					}
				},
			}
		}
	}

	fn await_reply(&mut self, request: &mut Message, timeout: Duration) -> Reply {
		loop {
			let response = match self.responses.recv_timeout(timeout) {
				Ok(response) => response,
				Err(_) => return Reply::Failed,
			};

			if response.subject != request.subject {
				debug!("discarding stale reply ({}) while waiting for {}", response, request);
				continue;
			}

			match response.message_type {
				MessageType::Success => {
					// Quash replies to retransmissions of this request.
					self.drain_responses();
					return Reply::Accepted(response);
				},
				MessageType::WrongNumber => {
					warn!(
						"target expects message number 0x{:02x}, local number is 0x{:02x}",
						response.number, request.number
					);
					let resynced = request.number == 0;
					if resynced {
						debug!("adopting message number 0x{:02x}", response.number);
						self.message_number = response.number;
						request.number = response.number;
					}
					thread::sleep(WRONG_NUMBER_SETTLE);
					self.drain_responses();
					if resynced {
						return Reply::Resynced;
					}
					return Reply::Failed;
				},
				message_type => {
					return Reply::Rejected(ProtocolError {
						message_type,
						subject: response.subject,
					});
				},
			}
		}
	}

	pub(crate) fn drain_responses(&mut self) {
		while self.responses.try_recv().is_ok() {}
	}
}
