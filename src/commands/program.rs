use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::client::RequestOptions;
use crate::error::{ImageTooLarge, PageWriteFailed, ProgramError, TransferError};
use crate::message::{Message, START_OF_BLOCK};
use crate::transport::BusAdapter;
use crate::Client;

use super::subject;

/// Initial number of quads streamed per acknowledged block.
const INITIAL_BLOCKSIZE: usize = 64;

/// Grace period before retrying a failed block at a smaller blocksize.
const BACKOFF_DELAY: Duration = Duration::from_millis(300);

/// Select the 4-byte quad at the given offset.
pub(super) fn quad(data: &[u8], offset: usize) -> &[u8] {
	&data[offset * 4..offset * 4 + 4]
}

impl<T: BusAdapter> Client<T> {
	/// Program an image into the flash of the addressed board.
	///
	/// Connects to the bootloader first, then writes the segments page by
	/// page. The target keeps its write address across pages, so only the
	/// first page needs an explicit address.
	pub fn program(&mut self, segments: &[impl AsRef<[u8]>]) -> Result<(), ProgramError<T::Error>> {
		self.identify()?;

		let pagesize = usize::from(self.board.pagesize);
		let total: usize = segments.iter().map(|segment| segment.as_ref().len()).sum();
		let pages = total.div_ceil(pagesize);
		if pages > usize::from(self.board.pages) {
			return Err(ImageTooLarge {
				pages: pages as u32,
				capacity: self.board.pages,
			}
			.into());
		}
		debug!("writing {} pages of {} bytes", pages, pagesize);

		let mut address_set = false;
		let mut segment_number = 0;
		let mut offset = 0;
		for page in 0..pages {
			let segment = match segments.get(segment_number) {
				Some(segment) => segment.as_ref(),
				None => break,
			};
			let end = segment.len().min(offset + pagesize);
			self.program_page(page as u16, &segment[offset..end], address_set)?;
			offset += pagesize;
			if offset >= segment.len() {
				offset = 0;
				segment_number += 1;
				debug!("continuing with segment {}", segment_number);
			}
			address_set = true;
		}
		Ok(())
	}

	/// Program a single page of flash.
	///
	/// The data is padded to a full page with `0xFF` and streamed in blocks
	/// of up to 64 quads, acknowledged once per block. When a block fails the
	/// blocksize is halved and the remainder of the page retried; a failure
	/// at blocksize one gives up with [`PageWriteFailed`](crate::PageWriteFailed).
	pub fn program_page(&mut self, page: u16, data: &[u8], mut address_set: bool) -> Result<(), ProgramError<T::Error>> {
		let pagesize = usize::from(self.board.pagesize);
		let mut padded = data.to_vec();
		padded.resize(pagesize, 0xFF);

		let mut remaining = pagesize / 4;
		let mut blocksize = INITIAL_BLOCKSIZE;
		let mut offset = 0;
		let mut acknowledgement = None;

		while remaining > 0 {
			if blocksize > remaining {
				blocksize = remaining;
			}
			match self.write_block(page, &padded, offset, blocksize, address_set) {
				Ok(response) => {
					remaining -= blocksize;
					offset += blocksize;
					address_set = true;
					acknowledgement = Some(response);
				},
				Err(TransferError::Send(error)) => return Err(TransferError::Send(error).into()),
				Err(error) if blocksize > 1 => {
					warn!("block transfer failed: {}", error);
					blocksize /= 2;
					debug!("retrying with blocksize {}", blocksize);
					// The target lost its buffer position, re-address.
					address_set = false;
					thread::sleep(BACKOFF_DELAY);
				},
				Err(error) => {
					warn!("page transfer failed: {}", error);
					return Err(PageWriteFailed { page }.into());
				},
			}
		}

		// The block acknowledgement echoes the page that was written.
		let acknowledged_page = acknowledgement.and_then(|response| {
			let data = response.data();
			if data.len() < 2 {
				return None;
			}
			Some(u16::from(data[0]) << 8 | u16::from(data[1]))
		});
		if acknowledged_page != Some(page) {
			return Err(PageWriteFailed { page }.into());
		}
		Ok(())
	}

	/// Stream one block of quads, acknowledged by its last message.
	fn write_block(
		&mut self,
		page: u16,
		data: &[u8],
		offset: usize,
		blocksize: usize,
		address_set: bool,
	) -> Result<Message, TransferError<T::Error>> {
		if !address_set {
			self.transfer(
				subject::SET_ADDRESS,
				&[(page >> 8) as u8, page as u8, 0, offset as u8],
				&RequestOptions::default(),
			)?;
		}

		if blocksize == 1 {
			return self.transfer(subject::DATA, quad(data, offset), &RequestOptions::default());
		}

		// The first message announces how many quads follow in the block.
		let mut index = offset;
		self.write_request(subject::DATA, quad(data, index), START_OF_BLOCK | (blocksize as u8 - 1))
			.map_err(TransferError::Send)?;

		for counter in (1..=blocksize - 2).rev() {
			index += 1;
			self.write_request(subject::DATA, quad(data, index), counter as u8)
				.map_err(TransferError::Send)?;
		}

		// Only the last message of the block is acknowledged.
		index += 1;
		self.transfer(
			subject::DATA,
			quad(data, index),
			&RequestOptions {
				data_counter: 0,
				..Default::default()
			},
		)
	}
}
