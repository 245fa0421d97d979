use std::time::Duration;

use assert2::{assert, let_assert};
use canboot::commands::subject;
use canboot::{Attempts, Client, Message, MessageType, RequestOptions, TransferError, START_OF_BLOCK};
use test_log::test;

pub mod common;

use common::{success, MockBus};

#[test]
fn test_wrong_number_on_first_message_resynchronizes() {
	let bus = MockBus::new(|request| {
		if request.number == 0 {
			vec![Message::new(0x10, MessageType::WrongNumber, request.subject, 0x42, 0, &[])]
		} else {
			vec![success(request, &[])]
		}
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let_assert!(Ok(_) = client.transfer(subject::IDENTIFY, &[], &RequestOptions::default()));

	// the request was retransmitted with the number the target reported
	let numbers: Vec<u8> = bus.sent_messages().iter().map(|m| m.number).collect();
	assert!(numbers == [0x00, 0x42]);

	// and the local number advanced past the adopted one
	let_assert!(Ok(()) = client.write_request(subject::NO_OPERATION, &[], START_OF_BLOCK));
	assert!(bus.sent_messages().last().unwrap().number == 0x43);
}

#[test]
fn test_wrong_number_in_mid_session_is_not_adopted() {
	let bus = MockBus::new(|request| {
		vec![Message::new(0x10, MessageType::WrongNumber, request.subject, 0x42, 0, &[])]
	});
	let mut client = Client::new(bus.clone(), 0x10);

	// move the local number past zero
	for _ in 0..5 {
		let_assert!(Ok(()) = client.write_request(subject::NO_OPERATION, &[], START_OF_BLOCK));
	}

	let_assert!(Err(TransferError::NoResponse(error)) = client.transfer(subject::IDENTIFY, &[], &RequestOptions::default()));
	assert!(error.attempts == 2);
	assert!(error.subject == subject::IDENTIFY);

	// both transmissions kept the local number
	let numbers: Vec<u8> = bus.sent_messages().iter().skip(5).map(|m| m.number).collect();
	assert!(numbers == [5, 5]);
}

#[test]
fn test_stale_replies_are_discarded() {
	let bus = MockBus::new(|request| {
		vec![
			Message::new(0x10, MessageType::Success, subject::SET_ADDRESS, 7, 0, &[]),
			success(request, &[0xAA]),
		]
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let_assert!(Ok(response) = client.transfer(subject::IDENTIFY, &[], &RequestOptions::default()));
	assert!(response.subject == subject::IDENTIFY);
	assert!(response.data() == [0xAA]);
}

#[test]
fn test_replies_from_other_boards_are_dropped() {
	// a different board acknowledges every request
	let bus = MockBus::new(|request| {
		vec![Message::new(0x11, MessageType::Success, request.subject, request.number, 0, &[])]
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let options = RequestOptions {
		timeout: Duration::from_millis(20),
		..Default::default()
	};
	let_assert!(Err(TransferError::NoResponse(_)) = client.transfer(subject::IDENTIFY, &[], &options));
}

#[test]
fn test_giving_up_consumes_the_message_number() {
	let bus = MockBus::silent();
	let mut client = Client::new(bus.clone(), 0x10);

	let options = RequestOptions {
		timeout: Duration::from_millis(20),
		..Default::default()
	};
	let_assert!(Err(TransferError::NoResponse(_)) = client.transfer(subject::IDENTIFY, &[], &options));

	let_assert!(Ok(()) = client.write_request(subject::NO_OPERATION, &[], START_OF_BLOCK));
	assert!(bus.sent_messages().last().unwrap().number == 1);
}

#[test]
fn test_error_replies_are_not_retried() {
	let bus = MockBus::new(|request| {
		vec![Message::new(0x10, MessageType::Error, request.subject, request.number, 0, &[])]
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let_assert!(Err(TransferError::Protocol(error)) = client.transfer(subject::IDENTIFY, &[], &RequestOptions::default()));
	assert!(error.message_type == MessageType::Error);
	assert!(error.subject == subject::IDENTIFY);
	assert!(bus.sent_messages().len() == 1);
}

#[test]
fn test_unlimited_attempts_retry_until_acknowledged() {
	let mut requests_seen = 0;
	let bus = MockBus::new(move |request| {
		requests_seen += 1;
		if requests_seen < 7 {
			Vec::new()
		} else {
			vec![success(request, &[])]
		}
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let options = RequestOptions {
		timeout: Duration::from_millis(10),
		attempts: Attempts::Unlimited,
		..Default::default()
	};
	let_assert!(Ok(_) = client.transfer(subject::NO_OPERATION, &[], &options));
	assert!(bus.sent_messages().len() == 7);
}

#[test]
fn test_set_board_id_retries_without_limit() {
	let mut requests_seen = 0;
	let bus = MockBus::new(move |request| {
		if request.subject != subject::SET_BOARD_ID {
			return Vec::new();
		}
		requests_seen += 1;
		if requests_seen < 3 {
			Vec::new()
		} else {
			vec![success(request, &[])]
		}
	});
	let mut client = Client::new(bus.clone(), 0x10);

	let_assert!(Ok(()) = client.set_board_id(5));
	let requests = bus.sent_messages();
	assert!(requests.len() == 3);
	assert!(requests.iter().all(|m| m.subject == subject::SET_BOARD_ID));
	assert!(requests.iter().all(|m| m.data() == [5]));
}

#[test]
fn test_start_bootloader_is_fire_and_forget() {
	let bus = MockBus::silent();
	let mut client = Client::new(bus.clone(), 0x10);

	let_assert!(Ok(()) = client.start_bootloader());
	let sent = bus.sent_frames();
	assert!(sent.len() == 1);
	// subject 127 does not fit the 6-bit decode, so check the raw payload:
	// board id, request type with the full 7-bit subject, number, counter
	assert!(sent[0].data() == [0x10, 0x7F, 0x00, 0x00]);

	// it does not consume a message number
	let_assert!(Ok(()) = client.write_request(subject::NO_OPERATION, &[], START_OF_BLOCK));
	assert!(bus.sent_messages().last().unwrap().number == 0);
}
