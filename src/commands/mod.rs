//! The session operations of the bootloader protocol.
//!
//! Each module implements one operation as methods on
//! [`Client`](crate::Client).

mod identify;
mod program;
mod scan;
mod set_board_id;
mod start_application;
mod start_bootloader;
mod verify;

pub use identify::Identify;
pub use scan::ScanEvent;

/// Operation codes of the bootloader protocol.
#[rustfmt::skip]
pub mod subject {
	// only implemented from bootloader type 2 on
	pub const NO_OPERATION      : u8 = 0;

	pub const IDENTIFY          : u8 = 1;
	pub const SET_ADDRESS       : u8 = 2;
	pub const DATA              : u8 = 3;
	pub const START_APPLICATION : u8 = 4;

	// extended bootloaders only (type 1 and up)
	pub const READ_FLASH        : u8 = 5;
	pub const GET_FUSEBITS      : u8 = 6;
	pub const CHIP_ERASE        : u8 = 7;

	pub const READ_EEPROM       : u8 = 8;
	pub const WRITE_EEPROM      : u8 = 9;

	// only implemented from bootloader type 2 on
	pub const SET_BOARD_ID      : u8 = 10;
	pub const SET_BITRATE       : u8 = 11;

	// handled by the running application, not the bootloader
	pub const START_BOOTLOADER  : u8 = 127;
}

/// Human readable name of a subject code, for diagnostics.
pub fn subject_name(subject: u8) -> &'static str {
	match subject {
		subject::NO_OPERATION => "no_op",
		subject::IDENTIFY => "identify",
		subject::SET_ADDRESS => "set_address",
		subject::DATA => "data",
		subject::START_APPLICATION => "start_app",
		subject::READ_FLASH => "read_flash",
		subject::GET_FUSEBITS => "get_fusebit",
		subject::CHIP_ERASE => "chip_erase",
		subject::READ_EEPROM => "read_eeprom",
		subject::WRITE_EEPROM => "write_eeprom",
		subject::SET_BOARD_ID => "set_board_id",
		subject::SET_BITRATE => "set_bitrate",
		subject::START_BOOTLOADER => "start_bootloader",
		_ => "unknown",
	}
}
