//! Unit tests for line framing.

use std::io::{self, Read, Write};

use rstest::rstest;

use super::*;

/// In-memory stream that hands out input in fixed-size pieces and accepts
/// output a few bytes at a time.
#[derive(Debug, Default)]
struct ScriptedStream {
    input: Vec<u8>,
    position: usize,
    read_chunk: usize,
    write_chunk: usize,
    interrupt_next_write: bool,
    output: Vec<u8>,
}

impl ScriptedStream {
    fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.to_vec(),
            read_chunk: 3,
            write_chunk: 2,
            ..Self::default()
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.input[self.position..];
        let count = remaining.len().min(buf.len()).min(self.read_chunk);
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupt_next_write {
            self.interrupt_next_write = false;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let count = buf.len().min(self.write_chunk);
        self.output.extend_from_slice(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FailingStream;

impl Read for FailingStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::ConnectionReset))
    }
}

impl Write for FailingStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn read_all(input: &[u8], max_len: usize) -> Vec<Vec<u8>> {
    let mut channel = LineChannel::new(ScriptedStream::with_input(input), max_len);
    let mut lines = Vec::new();
    while let Some(line) = channel.read_line().expect("read") {
        lines.push(line.into_bytes());
    }
    lines
}

#[rstest]
#[case::carriage_returns(b"A>B one\rA>B two\r".as_slice())]
#[case::line_feeds(b"A>B one\nA>B two\n".as_slice())]
#[case::crlf(b"A>B one\r\nA>B two\r\n".as_slice())]
fn frames_each_terminator_style(#[case] input: &[u8]) {
    assert_eq!(
        read_all(input, 64),
        vec![b"A>B one".to_vec(), b"A>B two".to_vec()]
    );
}

#[test]
fn clean_end_of_stream_yields_none() {
    let mut channel = LineChannel::new(ScriptedStream::with_input(b""), 64);
    assert!(channel.read_line().expect("read").is_none());
}

#[test]
fn unterminated_tail_is_returned_before_eof() {
    assert_eq!(read_all(b"A>B tail", 64), vec![b"A>B tail".to_vec()]);
}

#[test]
fn long_line_is_truncated_and_the_rest_discarded() {
    let lines = read_all(b"0123456789abcdef\rnext\r", 6);
    assert_eq!(lines, vec![b"012345".to_vec(), b"next".to_vec()]);
}

#[test]
fn truncated_line_is_marked_and_the_next_is_not() {
    let stream = ScriptedStream::with_input(b"0123456789abcdef\rnext\r");
    let mut channel = LineChannel::new(stream, 6);

    let long = channel.read_line().expect("read").expect("first line");
    assert!(long.is_truncated());
    assert_eq!(long.bytes(), b"012345");

    let next = channel.read_line().expect("read").expect("second line");
    assert!(!next.is_truncated());
    assert_eq!(next.bytes(), b"next");
}

#[test]
fn unterminated_overlong_tail_is_marked_truncated() {
    let mut channel = LineChannel::new(ScriptedStream::with_input(b"abcdefgh"), 4);
    let tail = channel.read_line().expect("read").expect("tail");
    assert!(tail.is_truncated());
    assert_eq!(tail.bytes(), b"abcd");
}

#[test]
fn line_exactly_at_limit_is_kept_whole() {
    let mut channel = LineChannel::new(ScriptedStream::with_input(b"abcdef\r"), 6);
    let line = channel.read_line().expect("read").expect("line");
    assert!(!line.is_truncated());
    assert_eq!(line.into_bytes(), b"abcdef".to_vec());
}

#[test]
fn zero_limit_is_raised_to_one_byte() {
    let channel = LineChannel::new(ScriptedStream::with_input(b""), 0);
    assert_eq!(channel.max_len(), 1);
}

#[test]
fn read_failure_is_reported() {
    let mut channel = LineChannel::new(FailingStream, 16);
    let error = channel.read_line().expect_err("read must fail");
    assert!(matches!(error, ChannelError::Read { .. }));
}

#[test]
fn partial_and_interrupted_writes_are_completed() {
    let mut stream = ScriptedStream::with_input(b"");
    stream.interrupt_next_write = true;
    let mut channel = LineChannel::new(stream, 16);

    let written = channel.write_line("CCD>OPS DONE: ok\r").expect("write");

    assert_eq!(written, 17);
    assert_eq!(channel.get_ref().output, b"CCD>OPS DONE: ok\r");
}

#[test]
fn write_failure_is_reported() {
    let mut channel = LineChannel::new(FailingStream, 16);
    let error = channel.write_line("x\r").expect_err("write must fail");
    assert!(matches!(error, ChannelError::Write { .. }));
}
