use std::path::Path;
use std::time::{Duration, Instant};

use canboot::commands::ScanEvent;
use canboot::transport::{BusAdapter, Frame, SocketcanAdapter};
use canboot::Client;
use clap::Parser;

mod logging;
mod options;

use options::{Command, Options};

fn main() {
	let options = Options::parse();
	logging::init(env!("CARGO_CRATE_NAME"), options.verbose);
	if let Err(()) = do_main(options) {
		std::process::exit(1);
	}
}

fn do_main(options: Options) -> Result<(), ()> {
	match &options.command {
		Command::Program {
			board_id,
			image,
			verify,
			start,
		} => {
			let data = read_image(image)?;
			let mut client = open_client(&options, *board_id)?;
			let segments = [data];

			log::info!("Connecting to board {}", board_id);
			let started = Instant::now();
			client
				.program(&segments)
				.map_err(|e| log::error!("Programming failed: {}", e))?;
			log::info!("{}", client.board());
			report_rate("Programmed", segments[0].len(), started.elapsed());

			if *verify {
				let started = Instant::now();
				client
					.verify(&segments)
					.map_err(|e| log::error!("Verification failed: {}", e))?;
				report_rate("Verified", segments[0].len(), started.elapsed());
			}
			if *start {
				client
					.start_application()
					.map_err(|e| log::error!("Failed to start the application: {}", e))?;
				log::info!("Application started");
			}
		},
		Command::Verify { board_id, image } => {
			let data = read_image(image)?;
			let mut client = open_client(&options, *board_id)?;
			let segments = [data];

			log::info!("Connecting to board {}", board_id);
			let started = Instant::now();
			client
				.verify(&segments)
				.map_err(|e| log::error!("Verification failed: {}", e))?;
			log::info!("{}", client.board());
			report_rate("Verified", segments[0].len(), started.elapsed());
		},
		Command::Identify { board_id } => {
			let mut client = open_client(&options, *board_id)?;
			log::debug!("Connecting to board {}", board_id);
			client.identify().map_err(|e| log::error!("Identify failed: {}", e))?;
			log::info!("{}", client.board());
		},
		Command::Scan => {
			let mut client = open_client(&options, 0)?;
			let found = client
				.scan(wait_for_enter, |event| match event {
					ScanEvent::Found(board) => {
						println!();
						println!("Found: {}", board);
					},
					ScanEvent::NoReply(_) => {
						use std::io::Write;
						print!(".");
						let _ = std::io::stdout().flush();
					},
				})
				.map_err(|e| log::error!("Scan failed: {}", e))?;
			println!();
			log::info!("All board identifiers scanned, found {} boards", found.len());
		},
		Command::SetId { board_id, new_id } => {
			let mut client = open_client(&options, *board_id)?;
			log::debug!("Assigning id {} to board {}", new_id, board_id);
			client
				.set_board_id(*new_id)
				.map_err(|e| log::error!("Command failed: {}", e))?;
			log::info!("Ok");
		},
		Command::StartApplication { board_id } => {
			let mut client = open_client(&options, *board_id)?;
			client
				.start_application()
				.map_err(|e| log::error!("Command failed: {}", e))?;
			log::info!("Ok");
		},
		Command::StartBootloader { board_id } => {
			let client = open_client(&options, *board_id)?;
			client
				.start_bootloader()
				.map_err(|e| log::error!("Command failed: {}", e))?;
			log::info!("Ok");
		},
		Command::ShellCompletion { shell, output } => {
			write_shell_completion(*shell, output.as_deref())?;
		},
	}

	Ok(())
}

fn open_client(options: &Options, board_id: u8) -> Result<Client<SocketcanAdapter>, ()> {
	let adapter = SocketcanAdapter::open(&options.interface)
		.map_err(|e| log::error!("Failed to open CAN interface {}: {}", options.interface, e))?;
	log::debug!("Using CAN interface {}", options.interface);

	let mut client = Client::new(adapter, board_id);
	if options.reset {
		client.set_reset_hook(|transport, board_id| {
			// Out-of-band reset, addressed to the board from host id 0xFF.
			let id = 0x18 << 24 | u32::from(board_id) << 16 | 0xFF << 8 | 0x01;
			transport.send(&Frame::extended(id, &[]))
		});
	}
	Ok(client)
}

fn read_image(path: &Path) -> Result<Vec<u8>, ()> {
	std::fs::read(path).map_err(|e| log::error!("Failed to read {}: {}", path.display(), e))
}

fn wait_for_enter() {
	println!("Press \"Enter\" to start the scan");
	let mut line = String::new();
	let _ = std::io::stdin().read_line(&mut line);
}

fn report_rate(action: &str, bytes: usize, elapsed: Duration) {
	log::info!(
		"{} {} bytes in {:.2} seconds ({:.0} Byte/s)",
		action,
		bytes,
		elapsed.as_secs_f64(),
		bytes as f64 / elapsed.as_secs_f64(),
	);
}

fn write_shell_completion(shell: clap_complete::Shell, path: Option<&Path>) -> Result<(), ()> {
	use clap::CommandFactory;
	use std::io::Write;

	let mut buffer = Vec::with_capacity(4 * 1024);
	clap_complete::generate(shell, &mut Options::command(), env!("CARGO_BIN_NAME"), &mut buffer);
	if !buffer.ends_with(b"\n") {
		buffer.push(b'\n');
	}

	let path = path.unwrap_or_else(|| Path::new("-"));
	if path == Path::new("-") {
		std::io::stdout()
			.write_all(&buffer)
			.map_err(|e| log::error!("Failed to write to stdout: {}", e))?;
	} else {
		std::fs::write(path, &buffer).map_err(|e| log::error!("Failed to write {}: {}", path.display(), e))?;
	}
	Ok(())
}
