use core::fmt;
use core::time::Duration;

use crate::commands::subject_name;
use crate::message::MessageType;

/// An inbound frame could not be parsed as a bootloader message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BadFormat {
	/// The frame used an extended identifier.
	pub extended: bool,
	/// The frame was a remote transmission request.
	pub rtr: bool,
	/// The payload length of the frame.
	pub data_len: usize,
}

/// The target answered a request with an error or an unexpected message type.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProtocolError {
	/// The type of the offending reply.
	pub message_type: MessageType,
	/// The subject of the request.
	pub subject: u8,
}

/// No valid reply arrived within the configured number of attempts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NoResponse {
	/// How often the request was transmitted.
	pub attempts: u32,
	/// The receive timeout used per attempt.
	pub timeout: Duration,
	/// The subject of the request.
	pub subject: u8,
}

/// The identify reply could not be interpreted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BadIdentify {
	/// The reply carried fewer than the four expected bytes.
	ShortResponse {
		/// Actual number of data bytes.
		len: usize,
	},
	/// The reported pagesize index has no known mapping.
	UnknownPagesize {
		/// The index from the reply.
		index: u8,
	},
}

/// A page could not be written, even after reducing the blocksize to one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PageWriteFailed {
	/// The page that failed.
	pub page: u16,
}

/// The flash contents of a page do not match the expected data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PageVerifyFailed {
	/// The page that failed.
	pub page: u16,
}

/// The image needs more pages than the target provides.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageTooLarge {
	/// Pages needed by the image.
	pub pages: u32,
	/// Pages available on the target.
	pub capacity: u16,
}

/// The connected bootloader does not implement reading back flash.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerifyUnsupported;

/// An error that can occur during a single request/response exchange.
#[derive(Debug)]
pub enum TransferError<E> {
	/// Transmitting the request on the bus failed.
	Send(E),
	/// The target rejected the request.
	Protocol(ProtocolError),
	/// The target never acknowledged the request.
	NoResponse(NoResponse),
}

/// An error that can occur while connecting to a bootloader.
#[derive(Debug)]
pub enum IdentifyError<E> {
	/// Transmitting a frame on the bus failed.
	Send(E),
	/// The identify reply could not be interpreted.
	BadIdentify(BadIdentify),
}

/// An error that can occur while programming an image.
#[derive(Debug)]
pub enum ProgramError<E> {
	/// A request could not be exchanged with the target.
	Transfer(TransferError<E>),
	/// The identify reply could not be interpreted.
	BadIdentify(BadIdentify),
	/// The image does not fit into the available flash.
	ImageTooLarge(ImageTooLarge),
	/// A page could not be written.
	PageWrite(PageWriteFailed),
}

/// An error that can occur while verifying an image.
#[derive(Debug)]
pub enum VerifyError<E> {
	/// A request could not be exchanged with the target.
	Transfer(TransferError<E>),
	/// The identify reply could not be interpreted.
	BadIdentify(BadIdentify),
	/// The connected bootloader can not read back flash.
	Unsupported(VerifyUnsupported),
	/// The image does not fit into the available flash.
	ImageTooLarge(ImageTooLarge),
	/// A page does not match the image.
	PageVerify(PageVerifyFailed),
}

impl std::error::Error for BadFormat {}
impl std::error::Error for ProtocolError {}
impl std::error::Error for NoResponse {}
impl std::error::Error for BadIdentify {}
impl std::error::Error for PageWriteFailed {}
impl std::error::Error for PageVerifyFailed {}
impl std::error::Error for ImageTooLarge {}
impl std::error::Error for VerifyUnsupported {}

impl<E: fmt::Debug + fmt::Display> std::error::Error for TransferError<E> {}
impl<E: fmt::Debug + fmt::Display> std::error::Error for IdentifyError<E> {}
impl<E: fmt::Debug + fmt::Display> std::error::Error for ProgramError<E> {}
impl<E: fmt::Debug + fmt::Display> std::error::Error for VerifyError<E> {}

impl<E> From<ProtocolError> for TransferError<E> {
	fn from(other: ProtocolError) -> Self {
		Self::Protocol(other)
	}
}

impl<E> From<NoResponse> for TransferError<E> {
	fn from(other: NoResponse) -> Self {
		Self::NoResponse(other)
	}
}

impl<E> From<BadIdentify> for IdentifyError<E> {
	fn from(other: BadIdentify) -> Self {
		Self::BadIdentify(other)
	}
}

impl<E> From<TransferError<E>> for ProgramError<E> {
	fn from(other: TransferError<E>) -> Self {
		Self::Transfer(other)
	}
}

impl<E> From<IdentifyError<E>> for ProgramError<E> {
	fn from(other: IdentifyError<E>) -> Self {
		match other {
			IdentifyError::Send(error) => Self::Transfer(TransferError::Send(error)),
			IdentifyError::BadIdentify(error) => Self::BadIdentify(error),
		}
	}
}

impl<E> From<ImageTooLarge> for ProgramError<E> {
	fn from(other: ImageTooLarge) -> Self {
		Self::ImageTooLarge(other)
	}
}

impl<E> From<PageWriteFailed> for ProgramError<E> {
	fn from(other: PageWriteFailed) -> Self {
		Self::PageWrite(other)
	}
}

impl<E> From<TransferError<E>> for VerifyError<E> {
	fn from(other: TransferError<E>) -> Self {
		Self::Transfer(other)
	}
}

impl<E> From<IdentifyError<E>> for VerifyError<E> {
	fn from(other: IdentifyError<E>) -> Self {
		match other {
			IdentifyError::Send(error) => Self::Transfer(TransferError::Send(error)),
			IdentifyError::BadIdentify(error) => Self::BadIdentify(error),
		}
	}
}

impl<E> From<VerifyUnsupported> for VerifyError<E> {
	fn from(other: VerifyUnsupported) -> Self {
		Self::Unsupported(other)
	}
}

impl<E> From<ImageTooLarge> for VerifyError<E> {
	fn from(other: ImageTooLarge) -> Self {
		Self::ImageTooLarge(other)
	}
}

impl<E> From<PageVerifyFailed> for VerifyError<E> {
	fn from(other: PageVerifyFailed) -> Self {
		Self::PageVerify(other)
	}
}

impl fmt::Display for BadFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"invalid bootloader frame (extended: {}, rtr: {}, {} data bytes)",
			self.extended, self.rtr, self.data_len
		)
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"target answered \"{}\" to a {} request",
			self.message_type,
			subject_name(self.subject)
		)
	}
}

impl fmt::Display for NoResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"no response after {} attempts with a timeout of {:.2} seconds while sending {}",
			self.attempts,
			self.timeout.as_secs_f64(),
			subject_name(self.subject)
		)
	}
}

impl fmt::Display for BadIdentify {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ShortResponse { len } => write!(f, "identify reply carries only {} data bytes", len),
			Self::UnknownPagesize { index } => write!(f, "identify reply reports unknown pagesize index {}", index),
		}
	}
}

impl fmt::Display for PageWriteFailed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "could not write page {}", self.page)
	}
}

impl fmt::Display for PageVerifyFailed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "page {} does not match the image", self.page)
	}
}

impl fmt::Display for ImageTooLarge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"image needs {} pages but the target only has {}",
			self.pages, self.capacity
		)
	}
}

impl fmt::Display for VerifyUnsupported {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "verifying requires an extended bootloader")
	}
}

impl<E: fmt::Display> fmt::Display for TransferError<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Send(e) => write!(f, "failed to send the request: {}", e),
			Self::Protocol(e) => write!(f, "{}", e),
			Self::NoResponse(e) => write!(f, "{}", e),
		}
	}
}

impl<E: fmt::Display> fmt::Display for IdentifyError<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Send(e) => write!(f, "failed to send the request: {}", e),
			Self::BadIdentify(e) => write!(f, "{}", e),
		}
	}
}

impl<E: fmt::Display> fmt::Display for ProgramError<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Transfer(e) => write!(f, "{}", e),
			Self::BadIdentify(e) => write!(f, "{}", e),
			Self::ImageTooLarge(e) => write!(f, "{}", e),
			Self::PageWrite(e) => write!(f, "{}", e),
		}
	}
}

impl<E: fmt::Display> fmt::Display for VerifyError<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Transfer(e) => write!(f, "{}", e),
			Self::BadIdentify(e) => write!(f, "{}", e),
			Self::Unsupported(e) => write!(f, "{}", e),
			Self::ImageTooLarge(e) => write!(f, "{}", e),
			Self::PageVerify(e) => write!(f, "{}", e),
		}
	}
}
