//! Protocol tests for vbus-core
//! These tests run on the host with std, but exercise no_std code

use vbus_core::{
    xor_crc, CommandByte, CommandHeader, DeviceId, ResponseHeader, Status, Tick, VbusError,
    COMMAND_HEADER_LEN,
};

#[test]
fn test_command_frame_checksum_covers_header_and_payload() {
    let payload = [0xDE, 0xAD, 0xBE, 0xEF];
    let header = CommandHeader::for_payload(CommandByte(0x21), &payload);

    let mut frame: heapless::Vec<u8, 16> = heapless::Vec::new();
    frame.extend_from_slice(&header.to_bytes()[..COMMAND_HEADER_LEN - 1]).unwrap();
    frame.extend_from_slice(&payload).unwrap();

    assert_eq!(xor_crc(&frame), header.control_crc);
}

#[test]
fn test_oversized_payload_cannot_be_framed() {
    let payload = vec![0u8; usize::from(u16::MAX) + 1];
    assert_eq!(
        CommandHeader::try_for_payload(CommandByte(0x01), &payload),
        Err(VbusError::Overflow)
    );

    let largest = &payload[..usize::from(u16::MAX)];
    let header = CommandHeader::try_for_payload(CommandByte(0x01), largest).unwrap();
    assert_eq!(header.length, u16::MAX);
    assert_eq!(header, CommandHeader::for_payload(CommandByte(0x01), largest));
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "payload longer than a command can declare")]
fn test_oversized_payload_is_fatal_in_debug() {
    let payload = vec![0u8; usize::from(u16::MAX) + 1];
    CommandHeader::for_payload(CommandByte(0x01), &payload);
}

#[test]
fn test_response_header_round_trip() {
    let dev = DeviceId::new(9).unwrap();
    let header = ResponseHeader::new(0x3C, Status::FAIL, dev, 300);
    let decoded = ResponseHeader::from_bytes(header.to_bytes());
    assert_eq!(decoded.flags(), Status::FAIL);
    assert_eq!(decoded.device(), dev);
    assert_eq!(decoded.length, 300);
}

#[test]
fn test_tick_wrapping() {
    let near_end = Tick::new(u64::MAX - 1);
    let later = near_end.wrapping_add(5);
    assert!(later < near_end);
    assert_eq!(later.elapsed_since(near_end), 5);
}
