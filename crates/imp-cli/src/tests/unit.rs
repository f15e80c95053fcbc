//! Unit tests for argument handling and address parsing.

use std::ffi::OsString;
use std::process::ExitCode;

use rstest::rstest;

use crate::address::AgentAddress;
use crate::run;

fn invoke(args: &[&str]) -> (ExitCode, String, String) {
    let args = std::iter::once("impctl")
        .chain(args.iter().copied())
        .map(OsString::from);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run(args, &mut stdout, &mut stderr);
    (
        exit,
        String::from_utf8(stdout).expect("stdout utf8"),
        String::from_utf8(stderr).expect("stderr utf8"),
    )
}

#[rstest]
#[case("ccd-host:9001", "ccd-host", "9001")]
#[case("ccd-host:imp", "ccd-host", "imp")]
#[case("ccd-host", "ccd-host", "9779")]
#[case("[::1]:9001", "::1", "9001")]
#[case("[::1]", "::1", "9779")]
#[case("fe80::1", "fe80::1", "9779")]
fn agent_addresses_parse(#[case] raw: &str, #[case] host: &str, #[case] service: &str) {
    let address = AgentAddress::parse(raw).expect("valid address");
    assert_eq!(address.host, host);
    assert_eq!(address.service, service);
}

#[rstest]
#[case(":9001")]
#[case("ccd-host:")]
#[case("[::1")]
#[case("[::1]9001")]
fn unusable_agent_addresses_are_rejected(#[case] raw: &str) {
    assert!(AgentAddress::parse(raw).is_err());
}

#[test]
fn help_is_printed_to_stdout() {
    let (exit, stdout, stderr) = invoke(&["--help"]);
    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(stdout.contains("Usage"), "stdout: {stdout}");
    assert!(stderr.is_empty());
}

#[test]
fn missing_body_is_a_usage_error() {
    let (exit, _, stderr) = invoke(&["127.0.0.1:9", "CCD"]);
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(stderr.starts_with("impctl: "), "stderr: {stderr}");
}

#[test]
fn unknown_message_type_is_a_usage_error() {
    let (exit, _, stderr) = invoke(&["--type", "SHOUT", "127.0.0.1:9", "CCD", "ping"]);
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(stderr.contains("unknown message type 'SHOUT'"), "stderr: {stderr}");
}

#[test]
fn invalid_destination_is_reported_before_connecting() {
    let (exit, _, stderr) = invoke(&["127.0.0.1:9", "TOOLONGNAME", "ping"]);
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(stderr.contains("invalid message"), "stderr: {stderr}");
}

#[test]
fn zero_timeout_is_rejected() {
    let (exit, _, _) = invoke(&["--timeout-ms", "0", "127.0.0.1:9", "CCD", "ping"]);
    assert_eq!(exit, ExitCode::FAILURE);
}
