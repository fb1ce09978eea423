/*
 * parser.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a synchronous HTTP client library.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked
//! or read until close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Largest status line or header line accepted.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: &str);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn complete(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the caller must call set_body_mode().
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
}

/// How much body is left in `ParseState::Body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLength {
    Remaining(u64),
    UntilClose,
}

/// Push parser for an HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked
/// as complete tokens are parsed.
pub struct ResponseParser {
    state: ParseState,
    body: BodyLength,
    chunk_remaining: u64,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
fn parse_status_line(line: &str) -> io::Result<(u16, &str)> {
    let mut parts = line.splitn(3, ' ');
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(invalid("malformed status line")),
    }
    let code = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|c| (100..1000).contains(c))
        .ok_or_else(|| invalid("malformed status code"))?;
    Ok((code, parts.next().unwrap_or("").trim()))
}

/// `name: value`, trimmed. Lines without a colon are dropped.
fn split_field(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').map(|(name, value)| (name.trim(), value.trim()))
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            body: BodyLength::UntilClose,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Body is delimited by the connection closing.
    pub fn is_read_until_close(&self) -> bool {
        self.state == ParseState::Body && self.body == BodyLength::UntilClose
    }

    /// Offset of the first CRLF in buf, or None.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Take the next line without its CRLF, or None if it is not complete yet.
    fn take_line(buf: &mut BytesMut) -> io::Result<Option<String>> {
        let line_end = match Self::find_crlf(buf) {
            Some(n) => n,
            None => {
                if buf.len() > MAX_LINE_LENGTH {
                    return Err(invalid("response line too long"));
                }
                return Ok(None);
            }
        };
        let line = buf.split_to(line_end + 2);
        // header values are bytes; keep what we can
        Ok(Some(String::from_utf8_lossy(&line[..line_end]).into_owned()))
    }

    /// Consume and parse as much as possible from buf. Partial data remains in buf.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line = match Self::take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let (code, reason) = parse_status_line(&line)?;
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line = match Self::take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = split_field(&line) {
                        handler.header(name, value);
                    }
                }
                ParseState::Body => match self.body {
                    BodyLength::Remaining(remaining) => {
                        let n = remaining.min(buf.len() as u64) as usize;
                        if n > 0 {
                            handler.body_chunk(&buf.split_to(n));
                        }
                        let left = remaining - n as u64;
                        self.body = BodyLength::Remaining(left);
                        if left == 0 {
                            handler.complete();
                            self.state = ParseState::Idle;
                        }
                    }
                    BodyLength::UntilClose => {
                        handler.body_chunk(&buf.split_to(buf.len()));
                        return Ok(());
                    }
                },
                ParseState::ChunkSize => {
                    let line = match Self::take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let hex_part = line.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining =
                        u64::from_str_radix(hex_part, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if self.chunk_remaining > 0 {
                        let to_read = (self.chunk_remaining.min(buf.len() as u64)) as usize;
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.chunk_remaining -= to_read as u64;
                    }
                    if self.chunk_remaining > 0 {
                        return Ok(());
                    }
                    // trailing CRLF of the chunk
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line = match Self::take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        handler.complete();
                        self.state = ParseState::Idle;
                    } else if let Some((name, value)) = split_field(&line) {
                        handler.trailer(name, value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
            }
        }
        Ok(())
    }

    /// Called after the headers (state HeadersComplete). `no_body` is for responses that
    /// never carry one (HEAD, 1xx, 204, 304).
    pub fn set_body_mode(&mut self, content_length: Option<u64>, chunked: bool, no_body: bool) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        // chunked wins over Content-Length (RFC 9112 6.3)
        (self.body, self.state) = match (no_body, chunked, content_length) {
            (true, _, _) | (false, false, Some(0)) => (BodyLength::Remaining(0), ParseState::Idle),
            (false, true, _) => (BodyLength::UntilClose, ParseState::ChunkSize),
            (false, false, Some(n)) => (BodyLength::Remaining(n), ParseState::Body),
            (false, false, None) => (BodyLength::UntilClose, ParseState::Body),
        };
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, String)>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        trailers: Vec<(String, String)>,
        complete: bool,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, reason: &str) {
            self.status = Some((code, reason.to_string()));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.to_string(), value.to_string()));
        }
        fn complete(&mut self) {
            self.complete = true;
        }
    }

    #[test]
    fn content_length_body_in_pieces() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(parser.state(), ParseState::Headers);
        buf.extend_from_slice(b"\r\nhel");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        parser.set_body_mode(Some(5), false, false);
        parser.receive(&mut buf, &mut rec).unwrap();
        buf.extend_from_slice(b"lo");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status, Some((200, "OK".to_string())));
        assert_eq!(rec.headers, vec![("Content-Length".to_string(), "5".to_string())]);
        assert_eq!(rec.body, b"hello");
        assert!(rec.complete);
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn chunked_body_with_trailer() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(None, true, false);
        buf.extend_from_slice(b"5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Sum: 1\r\n\r\n");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body, b"hello world");
        assert_eq!(rec.trailers, vec![("X-Sum".to_string(), "1".to_string())]);
        assert!(rec.complete);
    }

    #[test]
    fn status_without_reason() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 204\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status, Some((204, String::new())));
        parser.set_body_mode(None, false, true);
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn read_until_close() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nsome"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(None, false, false);
        assert!(parser.is_read_until_close());
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body, b"some");
        assert!(!rec.complete);
    }

    #[test]
    fn garbage_is_rejected() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());

        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\nzz\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(None, true, false);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 99\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(Some(99), true, false);
        buf.extend_from_slice(b"2\r\nok\r\n0\r\n\r\n");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body, b"ok");
        assert_eq!(parser.state(), ParseState::Idle);
    }
}
