//! [`BusAdapter`] implementation on top of Linux SocketCAN.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::warn;
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};

use super::{BusAdapter, Frame, FrameFilter};

/// Poll interval of the receive thread, also bounds the shutdown latency.
const RECEIVE_POLL: Duration = Duration::from_millis(100);

/// A bus adapter backed by a SocketCAN network interface.
///
/// The adapter opens two sockets on the interface: one for sending and one
/// feeding a receive thread that dispatches inbound frames to the registered
/// filters. The receive thread is stopped and joined when the adapter is
/// dropped.
pub struct SocketcanAdapter {
	socket: CanSocket,
	filters: Arc<Mutex<Vec<FrameFilter>>>,
	stop: Arc<AtomicBool>,
	receiver: Option<JoinHandle<()>>,
}

impl SocketcanAdapter {
	/// Open a CAN interface, for example `"can0"`.
	pub fn open(interface: &str) -> io::Result<Self> {
		let socket = CanSocket::open(interface)?;
		let receive_socket = CanSocket::open(interface)?;

		let filters = Arc::new(Mutex::new(Vec::new()));
		let stop = Arc::new(AtomicBool::new(false));
		let receiver = std::thread::spawn({
			let filters = Arc::clone(&filters);
			let stop = Arc::clone(&stop);
			move || receive_loop(&receive_socket, &filters, &stop)
		});

		Ok(Self {
			socket,
			filters,
			stop,
			receiver: Some(receiver),
		})
	}
}

impl BusAdapter for SocketcanAdapter {
	type Error = io::Error;

	fn send(&self, frame: &Frame) -> io::Result<()> {
		let id = if frame.is_extended() {
			ExtendedId::new(frame.id()).map(Id::Extended)
		} else {
			u16::try_from(frame.id()).ok().and_then(StandardId::new).map(Id::Standard)
		};
		let id = id.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "CAN identifier out of range"))?;

		let can_frame = if frame.is_rtr() {
			CanFrame::new_remote(id, frame.data().len())
		} else {
			CanFrame::new(id, frame.data())
		};
		let can_frame = can_frame.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid CAN frame"))?;

		self.socket.write_frame(&can_frame)
	}

	fn add_filter(&self, filter: FrameFilter) {
		if let Ok(mut filters) = self.filters.lock() {
			filters.push(filter);
		}
	}
}

impl Drop for SocketcanAdapter {
	fn drop(&mut self) {
		self.stop.store(true, Ordering::Relaxed);
		if let Some(receiver) = self.receiver.take() {
			let _ = receiver.join();
		}
	}
}

fn receive_loop(socket: &CanSocket, filters: &Mutex<Vec<FrameFilter>>, stop: &AtomicBool) {
	while !stop.load(Ordering::Relaxed) {
		let can_frame = match socket.read_frame_timeout(RECEIVE_POLL) {
			Ok(can_frame) => can_frame,
			Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => continue,
			Err(e) => {
				warn!("receiving from the CAN bus failed: {}", e);
				break;
			},
		};
		let frame = match convert(&can_frame) {
			Some(frame) => frame,
			None => continue,
		};
		let filters = match filters.lock() {
			Ok(filters) => filters,
			Err(_) => break,
		};
		for filter in filters.iter() {
			if filter.matches(&frame) {
				filter.deliver(&frame);
			}
		}
	}
}

fn convert(can_frame: &CanFrame) -> Option<Frame> {
	let (id, extended) = match can_frame.id() {
		Id::Standard(id) => (u32::from(id.as_raw()), false),
		Id::Extended(id) => (id.as_raw(), true),
	};
	match can_frame {
		CanFrame::Data(frame) if extended => Some(Frame::extended(id, frame.data())),
		CanFrame::Data(frame) => Some(Frame::new(id, frame.data())),
		CanFrame::Remote(_) => Some(Frame::remote(id)),
		CanFrame::Error(_) => None,
	}
}
