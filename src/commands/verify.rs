use crate::client::RequestOptions;
use crate::error::{ImageTooLarge, PageVerifyFailed, VerifyError, VerifyUnsupported};
use crate::transport::BusAdapter;
use crate::Client;

use super::program::quad;
use super::subject;

impl<T: BusAdapter> Client<T> {
	/// Compare the flash contents of the addressed board with an image.
	///
	/// Connects to the bootloader first. Reading back flash is only
	/// implemented by the extended bootloaders; the basic type fails with
	/// [`VerifyUnsupported`](crate::VerifyUnsupported).
	pub fn verify(&mut self, segments: &[impl AsRef<[u8]>]) -> Result<(), VerifyError<T::Error>> {
		self.identify()?;

		if self.board.bootloader_type == 0 {
			return Err(VerifyUnsupported.into());
		}

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

		let mut segment_number = 0;
		let mut offset = 0;
		for page in 0..pages {
			let segment = match segments.get(segment_number) {
				Some(segment) => segment.as_ref(),
				None => break,
			};
			let end = segment.len().min(offset + pagesize);
			self.verify_page(page as u16, &segment[offset..end])?;
			offset += pagesize;
			if offset >= segment.len() {
				offset = 0;
				segment_number += 1;
			}
		}
		Ok(())
	}

	/// Read back a single page and compare it with the expected data.
	///
	/// The expected data is padded to a full page with `0xFF`, matching what
	/// [`Self::program_page`] wrote.
	pub fn verify_page(&mut self, page: u16, data: &[u8]) -> Result<(), VerifyError<T::Error>> {
		let pagesize = usize::from(self.board.pagesize);
		let mut expected = data.to_vec();
		expected.resize(pagesize, 0xFF);

		for offset in 0..pagesize / 4 {
			let response = self.transfer(
				subject::READ_FLASH,
				&[(page >> 8) as u8, page as u8, 0, offset as u8],
				&RequestOptions::default(),
			)?;
			if response.data() != quad(&expected, offset) {
				return Err(PageVerifyFailed { page }.into());
			}
		}
		Ok(())
	}
}
