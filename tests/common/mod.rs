use std::sync::{Arc, Mutex};

use canboot::commands::subject;
use canboot::transport::{BusAdapter, Frame, FrameFilter};
use canboot::{Message, MessageType, HOST_FRAME_ID, START_OF_BLOCK, TARGET_FRAME_ID};

/// START_BOOTLOADER as it comes out of the 6-bit subject decode.
const WAKE_SUBJECT: u8 = subject::START_BOOTLOADER & 0x3F;

type Handler = Box<dyn FnMut(&Message) -> Vec<Message> + Send>;

/// In-process bus adapter for protocol tests.
///
/// Frames sent by the client are recorded and decoded requests handed to a
/// scripted handler; the replies it returns are delivered back through the
/// registered filters, like a target answering on the bus.
#[derive(Clone)]
pub struct MockBus {
	inner: Arc<MockBusInner>,
}

struct MockBusInner {
	filters: Mutex<Vec<FrameFilter>>,
	sent: Mutex<Vec<Frame>>,
	handler: Mutex<Handler>,
}

impl MockBus {
	pub fn new(handler: impl FnMut(&Message) -> Vec<Message> + Send + 'static) -> Self {
		Self {
			inner: Arc::new(MockBusInner {
				filters: Mutex::new(Vec::new()),
				sent: Mutex::new(Vec::new()),
				handler: Mutex::new(Box::new(handler)),
			}),
		}
	}

	/// A bus where nothing ever answers.
	pub fn silent() -> Self {
		Self::new(|_| Vec::new())
	}

	/// All frames the client sent so far.
	pub fn sent_frames(&self) -> Vec<Frame> {
		self.inner.sent.lock().unwrap().clone()
	}

	/// The bootloader messages the client sent so far.
	pub fn sent_messages(&self) -> Vec<Message> {
		self.sent_frames()
			.iter()
			.filter_map(|frame| Message::from_frame(frame).ok())
			.collect()
	}

	/// Deliver a frame to the client as if it arrived from the bus.
	pub fn inject(&self, frame: &Frame) {
		let filters = self.inner.filters.lock().unwrap();
		for filter in filters.iter() {
			if filter.matches(frame) {
				filter.deliver(frame);
			}
		}
	}

	/// Deliver a target reply to the client.
	pub fn inject_message(&self, message: &Message) {
		self.inject(&reply_frame(message));
	}
}

impl BusAdapter for MockBus {
	type Error = std::convert::Infallible;

	fn send(&self, frame: &Frame) -> Result<(), Self::Error> {
		self.inner.sent.lock().unwrap().push(frame.clone());

		if frame.id() != HOST_FRAME_ID || frame.is_extended() || frame.is_rtr() {
			return Ok(());
		}
		let request = match Message::from_frame(frame) {
			Ok(request) => request,
			Err(_) => return Ok(()),
		};
		let replies = {
			let mut handler = self.inner.handler.lock().unwrap();
			handler(&request)
		};
		for reply in replies {
			self.inject_message(&reply);
		}
		Ok(())
	}

	fn add_filter(&self, filter: FrameFilter) {
		self.inner.filters.lock().unwrap().push(filter);
	}
}

/// Encode a message the way a target would put it on the bus.
pub fn reply_frame(message: &Message) -> Frame {
	let mut payload = vec![
		message.board_id,
		(message.message_type as u8) << 6 | (message.subject & 0x3F),
		message.number,
		message.data_counter,
	];
	payload.extend_from_slice(message.data());
	Frame::new(TARGET_FRAME_ID, &payload)
}

/// A successful reply echoing the request number.
pub fn success(request: &Message, data: &[u8]) -> Message {
	Message::new(request.board_id, MessageType::Success, request.subject, request.number, 0, data)
}

/// An error reply echoing the request number.
pub fn error(request: &Message) -> Message {
	Message::new(request.board_id, MessageType::Error, request.subject, request.number, 0, &[])
}

/// Scripted bootloader target for end-to-end session tests.
///
/// Emulates the target side of the protocol: identify, the page buffer with
/// its auto-advancing write address, the block countdown, and reading back
/// flash.
pub struct MockTarget {
	pub id: u8,
	pub bootloader_type: u8,
	pub version: u8,
	pub pagesize: u16,
	pub pages: u16,
	pub flash: Vec<u8>,
	page: u16,
	quad: u8,
	countdown: Option<u8>,
}

impl MockTarget {
	pub fn new(id: u8, bootloader_type: u8, pagesize: u16, pages: u16) -> Self {
		Self {
			id,
			bootloader_type,
			version: 1,
			pagesize,
			pages,
			flash: vec![0xFF; usize::from(pagesize) * usize::from(pages)],
			page: 0,
			quad: 0,
			countdown: None,
		}
	}

	/// Wrap the target in a [`MockBus`] answering for it.
	pub fn into_bus(self) -> MockBus {
		let mut target = self;
		MockBus::new(move |request| target.handle(request))
	}

	pub fn handle(&mut self, request: &Message) -> Vec<Message> {
		if request.board_id != self.id {
			return Vec::new();
		}
		match request.subject {
			subject::IDENTIFY => {
				self.countdown = None;
				let data = [
					self.bootloader_type << 4 | self.version,
					pagesize_index(self.pagesize),
					(self.pages >> 8) as u8,
					self.pages as u8,
				];
				vec![success(request, &data)]
			},
			subject::SET_ADDRESS => {
				let data = request.data();
				self.page = u16::from(data[0]) << 8 | u16::from(data[1]);
				self.quad = data[3];
				self.countdown = None;
				vec![success(request, &[])]
			},
			subject::DATA => self.handle_data(request),
			subject::READ_FLASH => {
				let data = request.data();
				let page = u16::from(data[0]) << 8 | u16::from(data[1]);
				let start = usize::from(page) * usize::from(self.pagesize) + usize::from(data[3]) * 4;
				let quad = self.flash[start..start + 4].to_vec();
				vec![success(request, &quad)]
			},
			subject::START_APPLICATION => vec![success(request, &[])],
			subject::NO_OPERATION | WAKE_SUBJECT => Vec::new(),
			_ => vec![error(request)],
		}
	}

	fn handle_data(&mut self, request: &Message) -> Vec<Message> {
		let counter = request.data_counter;
		if counter & START_OF_BLOCK != 0 {
			self.countdown = Some(counter & 0x7F);
		} else {
			// Inside a block the counter must count down without gaps.
			match self.countdown {
				Some(previous) if previous == counter + 1 => self.countdown = Some(counter),
				_ => {
					self.countdown = None;
					return vec![error(request)];
				},
			}
		}

		let start = usize::from(self.page) * usize::from(self.pagesize) + usize::from(self.quad) * 4;
		self.flash[start..start + request.data().len()].copy_from_slice(request.data());
		self.quad += 1;

		if counter & 0x7F == 0 {
			// End of the block: acknowledge it with the page that was written.
			self.countdown = None;
			let page = self.page;
			if usize::from(self.quad) * 4 >= usize::from(self.pagesize) {
				// Page buffer full, the write address moves to the next page.
				self.page += 1;
				self.quad = 0;
			}
			return vec![success(request, &[(page >> 8) as u8, page as u8])];
		}
		Vec::new()
	}
}

fn pagesize_index(pagesize: u16) -> u8 {
	match pagesize {
		32 => 0,
		64 => 1,
		128 => 2,
		256 => 3,
		_ => 0xFF,
	}
}
