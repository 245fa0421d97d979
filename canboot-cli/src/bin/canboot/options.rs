use std::path::PathBuf;

/// Program and inspect microcontroller boards over their CAN bootloader.
///
/// Every command addresses a single board by its one-byte identifier, except
/// for "scan", which probes the whole bus.
#[derive(clap::Parser)]
pub struct Options {
	/// Print more verbose messages. Can be used multiple times.
	#[clap(long, short)]
	#[clap(global = true)]
	#[clap(action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// The CAN interface to use.
	#[clap(long, short)]
	#[clap(global = true)]
	#[clap(default_value = "can0")]
	pub interface: String,

	/// Send an out-of-band reset frame before connecting to a board.
	///
	/// Needed on setups where the application does not implement the
	/// start-bootloader request.
	#[clap(long)]
	#[clap(global = true)]
	pub reset: bool,

	#[clap(subcommand)]
	pub command: Command,
}

#[derive(clap::Parser)]
pub enum Command {
	/// Write a firmware image to a board.
	Program {
		/// The board to program.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,

		/// The raw binary image to write.
		#[clap(value_name = "IMAGE")]
		image: PathBuf,

		/// Read the flash back after programming and compare it with the image.
		#[clap(long)]
		verify: bool,

		/// Start the application when the transfer is done.
		#[clap(long)]
		start: bool,
	},

	/// Compare the flash contents of a board with a firmware image.
	Verify {
		/// The board to verify.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,

		/// The raw binary image to compare against.
		#[clap(value_name = "IMAGE")]
		image: PathBuf,
	},

	/// Connect to a board and show its bootloader details.
	Identify {
		/// The board to identify.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,
	},

	/// Probe all board identifiers on the bus.
	Scan,

	/// Assign a new identifier to a board.
	SetId {
		/// The board to re-identify.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,

		/// The new identifier to assign.
		#[clap(value_name = "NEW_ID")]
		new_id: u8,
	},

	/// Let the bootloader start the application.
	StartApplication {
		/// The board to start.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,
	},

	/// Ask the application on a board to enter its bootloader.
	StartBootloader {
		/// The board to reset into its bootloader.
		#[clap(value_name = "BOARD_ID")]
		board_id: u8,
	},

	/// Write shell completions to a file or to standard output.
	ShellCompletion {
		/// The shell for which to generate completions.
		#[clap(value_name = "SHELL")]
		shell: clap_complete::Shell,

		/// The file to write the completions to, or - for standard output.
		#[clap(value_name = "PATH")]
		output: Option<PathBuf>,
	},
}
