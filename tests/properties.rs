//! Property-based tests for the wire protocol's round-trip laws (spec.md §8).
//!
//! These tests use proptest to generate random command frames and exec
//! responses and verify that encode/decode is the identity, independent of
//! any particular payload content.

use outpost::protocol::{self, CommandFrame, ReadCommandOutcome};
use proptest::prelude::*;
use std::io::Cursor;

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

proptest! {
    /// Encoding a command frame by hand and decoding it with `read_command`
    /// recovers the original `(code, payload)` for any code and payload.
    #[test]
    fn command_frame_round_trips(code in any::<u8>(), payload in arb_payload()) {
        let mut wire = Vec::new();
        wire.push(code);
        wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        wire.extend_from_slice(&payload);

        let mut cursor = Cursor::new(wire);
        match protocol::read_command(&mut cursor).unwrap() {
            ReadCommandOutcome::Command(CommandFrame { code: got_code, payload: got_payload }) => {
                prop_assert_eq!(got_code, code);
                prop_assert_eq!(got_payload, payload);
            }
            ReadCommandOutcome::PeerClosed => prop_assert!(false, "expected a command frame"),
        }
    }

    /// `send_response` followed by a manual parse recovers `(ret_code, payload)`.
    #[test]
    fn response_frame_round_trips(ret_code in any::<i32>(), payload in arb_payload()) {
        let mut buf = Vec::new();
        protocol::send_response(&mut buf, ret_code, &payload).unwrap();

        prop_assert_eq!(&buf[0..4], &ret_code.to_be_bytes());
        let len = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
        prop_assert_eq!(len, payload.len());
        prop_assert_eq!(&buf[8..], payload.as_slice());
    }

    /// Encoding an exec response is the identity for any exit code and any
    /// stdout/stderr byte content, including negative exit codes, which the
    /// spec preserves verbatim (signed i32 BE) rather than clamping.
    #[test]
    fn exec_response_round_trips(
        exit_code in any::<i32>(),
        stdout in arb_payload(),
        stderr in arb_payload(),
    ) {
        let encoded = protocol::encode_exec_response(exit_code, &stdout, &stderr).unwrap();

        prop_assert_eq!(encoded.len(), 12 + stdout.len() + stderr.len());
        prop_assert_eq!(&encoded[0..4], &exit_code.to_be_bytes());
        let stdout_len = u32::from_be_bytes(encoded[4..8].try_into().unwrap()) as usize;
        prop_assert_eq!(stdout_len, stdout.len());
        prop_assert_eq!(&encoded[8..8 + stdout_len], stdout.as_slice());
        let stderr_off = 8 + stdout_len;
        let stderr_len = u32::from_be_bytes(encoded[stderr_off..stderr_off + 4].try_into().unwrap()) as usize;
        prop_assert_eq!(stderr_len, stderr.len());
        prop_assert_eq!(&encoded[stderr_off + 4..], stderr.as_slice());
    }

    /// Zero-length payloads are always legal and produce no payload bytes,
    /// regardless of the command code chosen.
    #[test]
    fn zero_length_payload_round_trips(code in any::<u8>()) {
        let mut wire = Vec::new();
        wire.push(code);
        wire.extend_from_slice(&0u32.to_be_bytes());

        let mut cursor = Cursor::new(wire);
        match protocol::read_command(&mut cursor).unwrap() {
            ReadCommandOutcome::Command(f) => prop_assert!(f.payload.is_empty()),
            ReadCommandOutcome::PeerClosed => prop_assert!(false, "expected a command frame"),
        }
    }
}
