//! Integration tests for frame splitting and reassembly.
//!
//! These go through the public API only: split a frame, check the header
//! sequence, then rebuild the frame with the reassembler a stream client
//! would use.

use driver_core::protocol::datagram::{
    split_frame, DatagramHeader, FrameReassembler, HEADER_SIZE, MAX_PAYLOAD,
};

/// Splits `frame` and returns every datagram.
fn chunks(frame: &[u8], max_payload: usize) -> Vec<Vec<u8>> {
    split_frame(frame, max_payload)
        .expect("split must succeed")
        .collect()
}

/// Feeds every datagram to a fresh reassembler and returns the rebuilt frame.
fn reassemble(datagrams: &[Vec<u8>]) -> Vec<u8> {
    let mut reassembler = FrameReassembler::new();
    let mut complete = None;
    for (i, d) in datagrams.iter().enumerate() {
        let out = reassembler.push(d).expect("push must succeed");
        if i + 1 < datagrams.len() {
            assert!(out.is_none(), "frame completed early at datagram {i}");
        }
        complete = out;
    }
    complete.expect("last datagram must complete the frame")
}

fn sample_frame(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_datagram_count_is_ceil_of_size_over_payload() {
    for (size, expected) in [(0, 1), (1, 1), (1999, 1), (2000, 1), (2001, 2), (10_000, 5), (10_001, 6)] {
        let frame = sample_frame(size);
        assert_eq!(chunks(&frame, MAX_PAYLOAD).len(), expected, "frame of {size} bytes");
    }
}

#[test]
fn test_every_payload_is_within_bound() {
    let frame = sample_frame(12_345);

    for d in chunks(&frame, MAX_PAYLOAD) {
        assert!(d.len() >= HEADER_SIZE);
        assert!(d.len() - HEADER_SIZE <= MAX_PAYLOAD);
    }
}

#[test]
fn test_only_final_datagram_has_zero_remaining() {
    let frame = sample_frame(7_000);

    let headers: Vec<DatagramHeader> = chunks(&frame, MAX_PAYLOAD)
        .iter()
        .map(|d| DatagramHeader::decode(d).expect("header"))
        .collect();

    let (last, rest) = headers.split_last().expect("at least one datagram");
    assert_eq!(last.remaining, 0);
    assert!(rest.iter().all(|h| h.remaining > 0));
}

#[test]
fn test_offset_plus_payload_plus_remaining_equals_frame_length() {
    let frame = sample_frame(5_432);

    for d in chunks(&frame, MAX_PAYLOAD) {
        let header = DatagramHeader::decode(&d).expect("header");
        let payload = (d.len() - HEADER_SIZE) as u32;
        assert_eq!(header.offset + payload + header.remaining, frame.len() as u32);
    }
}

#[test]
fn test_reassembly_reproduces_original_bytes() {
    for size in [0, 1, 2000, 2001, 64_000] {
        let frame = sample_frame(size);
        assert_eq!(reassemble(&chunks(&frame, MAX_PAYLOAD)), frame, "frame of {size} bytes");
    }
}

#[test]
fn test_small_payload_cap_still_reassembles() {
    let frame = sample_frame(100);
    let datagrams = chunks(&frame, 7);

    assert_eq!(datagrams.len(), 15);
    assert_eq!(reassemble(&datagrams), frame);
}
