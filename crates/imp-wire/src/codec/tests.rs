//! Unit tests for the line codec.

use rstest::rstest;
use strum::IntoEnumIterator;

use super::*;

fn message(kind: MessageType, body: &str) -> Message {
    Message::new(
        NodeName::new("AGENT1").expect("source"),
        NodeName::new("AGENT2").expect("destination"),
        kind,
        body,
    )
    .expect("valid message")
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[test]
fn decodes_implicit_request() {
    let decoded = decode("AGENT1>AGENT2 move 10.5").expect("decode");
    assert_eq!(decoded.source().as_str(), "AGENT1");
    assert_eq!(decoded.destination().as_str(), "AGENT2");
    assert_eq!(decoded.kind(), MessageType::Req);
    assert_eq!(decoded.body(), "move 10.5");
}

#[test]
fn decodes_explicit_status() {
    let decoded = decode("AGENT1>AGENT2 STATUS: temp=23.4").expect("decode");
    assert_eq!(decoded.kind(), MessageType::Status);
    assert_eq!(decoded.body(), "temp=23.4");
}

#[rstest]
#[case("A>B status: t=1", MessageType::Status)]
#[case("A>B Done: ok", MessageType::Done)]
#[case("A>B error: filter jammed", MessageType::Error)]
#[case("A>B WARNING: drift", MessageType::Warning)]
#[case("A>B fatal: power lost", MessageType::Fatal)]
#[case("A>B exec: home", MessageType::Exec)]
#[case("A>B REQ: home", MessageType::Req)]
fn type_tokens_are_case_insensitive(#[case] raw: &str, #[case] expected: MessageType) {
    let decoded = decode(raw).expect("decode");
    assert_eq!(decoded.kind(), expected);
}

#[rstest]
#[case("AGENT1>AGENT2 move 10.5\r")]
#[case("AGENT1>AGENT2 move 10.5\n")]
#[case("AGENT1>AGENT2 move 10.5\r\n")]
#[case("AGENT1>AGENT2 move 10.5")]
fn trailing_terminators_are_optional(#[case] raw: &str) {
    let decoded = decode(raw).expect("decode");
    assert_eq!(decoded.body(), "move 10.5");
}

#[test]
fn unrecognised_type_token_stays_in_body() {
    let decoded = decode("OPS>CCD URGENT: abort").expect("decode");
    assert_eq!(decoded.kind(), MessageType::Req);
    assert_eq!(decoded.body(), "URGENT: abort");
}

#[test]
fn colon_after_first_word_is_not_a_type_token() {
    let decoded = decode("OPS>CCD set mode: fast").expect("decode");
    assert_eq!(decoded.kind(), MessageType::Req);
    assert_eq!(decoded.body(), "set mode: fast");
}

#[rstest]
#[case::no_separator("nosuchseparator body")]
#[case::empty_body("A>B")]
#[case::blank_body("A>B    \r\n")]
#[case::empty_source(">B body")]
#[case::empty_destination("A> body")]
#[case::two_separators("A>B>C body")]
#[case::typed_without_body("A>B DONE:")]
#[case::name_too_long("ABCDEFGHI>B body")]
#[case::empty_line("")]
fn rejects_malformed_lines(#[case] raw: &str) {
    let error = decode(raw).expect_err("must be rejected");
    assert!(matches!(error, DecodeError::MalformedMessage { .. }));
}

#[test]
fn validation_failures_keep_their_source() {
    let error = decode("ABCDEFGHI>B body").expect_err("must be rejected");
    let DecodeError::MalformedMessage { source, .. } = error;
    assert!(matches!(
        source,
        Some(MessageError::NodeNameTooLong { max: 8, .. })
    ));
}

#[test]
fn decode_bytes_rejects_invalid_utf8() {
    let error = decode_bytes(b"A>B \xff\xfe").expect_err("must be rejected");
    assert!(error.to_string().contains("UTF-8"));
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[test]
fn request_omits_type_token() {
    assert_eq!(
        encode(&message(MessageType::Req, "move 10.5")),
        "AGENT1>AGENT2 move 10.5\r"
    );
}

#[test]
fn typed_messages_carry_type_token() {
    assert_eq!(
        encode(&message(MessageType::Done, "pos=10.5")),
        "AGENT1>AGENT2 DONE: pos=10.5\r"
    );
}

#[test]
fn request_resembling_a_type_token_is_encoded_explicitly() {
    let encoded = encode(&message(MessageType::Req, "status: now"));
    assert_eq!(encoded, "AGENT1>AGENT2 REQ: status: now\r");
}

#[test]
fn every_type_round_trips() {
    for kind in MessageType::iter() {
        for body in ["move 10.5", "temp=23.4 hum=40", "DONE: nested", "a:b"] {
            let original = message(kind, body);
            let decoded = decode(&encode(&original)).expect("decode");
            assert_eq!(decoded, original, "round trip failed for {kind} {body:?}");
        }
    }
}
