/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream carrying a single HTTP/1.1 exchange.
//!
//! The request head is written, then the body through `body()` (framed with
//! Content-Length or chunked), then the response head is parsed with the H1 push
//! parser and the rest of the stream is handed out as a body reader.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use log::trace;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use url::Url;

use super::h1::{H1ResponseHandler, ParseState, ResponseParser};
use super::headers::{self, parse_header_int, Headers};
use super::request::Method;

const READ_CHUNK: usize = 8192;

/// Unified stream: plain TCP or TLS.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl HttpStream {
    /// TLS handshake over an established TCP stream. Completes the handshake before
    /// returning so certificate failures surface here.
    pub fn connect_tls(
        tcp: TcpStream,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
    ) -> io::Result<HttpStream> {
        let conn = ClientConnection::new(config, server_name)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut tls = StreamOwned::new(conn, tcp);
        while tls.conn.is_handshaking() {
            tls.conn.complete_io(&mut tls.sock)?;
        }
        trace!(
            "TLS established: {:?}",
            tls.conn.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(HttpStream::Tls(Box::new(tls)))
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, HttpStream::Tls(_))
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            HttpStream::Plain(s) => s,
            HttpStream::Tls(s) => &s.sock,
        }
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.read(buf),
            HttpStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for HttpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.write(buf),
            HttpStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            HttpStream::Plain(s) => s.flush(),
            HttpStream::Tls(s) => s.flush(),
        }
    }
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpStream::Plain(_) => f.write_str("HttpStream::Plain"),
            HttpStream::Tls(_) => f.write_str("HttpStream::Tls"),
        }
    }
}

/// How the request body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    None,
    Fixed(u64),
    Chunked,
}

/// Everything needed to write the request line and headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub framing: Framing,
}

impl RequestHead {
    /// `path?query` for the request line.
    pub fn origin_form(&self) -> String {
        let mut target = self.url.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(q) = self.url.query() {
            target.push('?');
            target.push_str(q);
        }
        target
    }

    /// Full URL without fragment, for requests through a proxy.
    pub fn absolute_form(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    /// `host[:port]`, port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or("");
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub code: u16,
    pub message: String,
    pub headers: Headers,
}

/// One HTTP exchange over some transport. Obtained from a `ConnectionFactory`.
pub trait Connection: Send {
    fn is_secure(&self) -> bool;

    fn write_head(&mut self, head: &RequestHead) -> io::Result<()>;

    /// Sink for the request body, framed as announced in the head.
    fn body(&mut self) -> &mut dyn Write;

    /// End the body (chunked terminator) and flush.
    fn finish_body(&mut self) -> io::Result<()>;

    fn read_head(&mut self) -> io::Result<ResponseHead>;

    /// Body of a successful response.
    fn input_stream(self: Box<Self>) -> io::Result<Box<dyn Read + Send>>;

    /// Body of an error response, if the server sent one.
    fn error_stream(self: Box<Self>) -> Option<Box<dyn Read + Send>>;
}

/// Collects the status line and headers from the parser.
#[derive(Default)]
struct HeadCollector {
    code: u16,
    message: String,
    headers: Headers,
}

impl H1ResponseHandler for HeadCollector {
    fn status(&mut self, code: u16, reason: &str) {
        self.code = code;
        self.message = reason.to_string();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn body_chunk(&mut self, _data: &[u8]) {}
}

/// Read a response head from `stream`, leaving any body bytes that arrived with it in `buf`.
/// Interim 1xx responses are skipped.
pub fn read_response_head(
    stream: &mut dyn Read,
    parser: &mut ResponseParser,
    buf: &mut BytesMut,
) -> io::Result<ResponseHead> {
    loop {
        let mut collector = HeadCollector::default();
        parser.reset();
        loop {
            parser.receive(buf, &mut collector)?;
            if parser.state() == ParseState::HeadersComplete {
                break;
            }
            let mut tmp = [0u8; READ_CHUNK];
            let n = stream.read(&mut tmp)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response head",
                ));
            }
            buf.extend_from_slice(&tmp[..n]);
        }
        if (100..200).contains(&collector.code) && collector.code != 101 {
            trace!("skipping interim response {}", collector.code);
            continue;
        }
        return Ok(ResponseHead {
            code: collector.code,
            message: collector.message,
            headers: collector.headers,
        });
    }
}

/// HTTP/1.1 connection over an `HttpStream`.
pub struct HttpConnection {
    stream: HttpStream,
    /// Talking to a proxy: request targets are absolute URLs.
    via_proxy: bool,
    proxy_authorization: Option<String>,
    method: Method,
    framing: Framing,
    read_buf: BytesMut,
    parser: ResponseParser,
}

impl HttpConnection {
    pub fn new(stream: HttpStream) -> Self {
        Self {
            stream,
            via_proxy: false,
            proxy_authorization: None,
            method: Method::Get,
            framing: Framing::None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
        }
    }

    /// Plain HTTP through a forward proxy.
    pub fn through_proxy(stream: HttpStream, proxy_authorization: Option<String>) -> Self {
        let mut conn = Self::new(stream);
        conn.via_proxy = true;
        conn.proxy_authorization = proxy_authorization;
        conn
    }

    fn into_body_reader(self) -> BodyReader {
        BodyReader {
            stream: self.stream,
            parser: self.parser,
            buf: self.read_buf,
            pending: BytesMut::new(),
            eof: false,
        }
    }
}

impl Connection for HttpConnection {
    fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    fn write_head(&mut self, head: &RequestHead) -> io::Result<()> {
        let target = if self.via_proxy {
            head.absolute_form()
        } else {
            head.origin_form()
        };
        let mut req = format!("{} {} HTTP/1.1\r\n", head.method.as_str(), target);
        if !head.headers.contains(headers::HOST) {
            req.push_str(&format!("Host: {}\r\n", head.host_header()));
        }
        for (k, v) in head.headers.iter() {
            req.push_str(k);
            req.push_str(": ");
            req.push_str(v);
            req.push_str("\r\n");
        }
        match head.framing {
            Framing::Fixed(n) if !head.headers.contains(headers::CONTENT_LENGTH) => {
                req.push_str(&format!("Content-Length: {}\r\n", n));
            }
            Framing::Chunked => req.push_str("Transfer-Encoding: chunked\r\n"),
            _ => {}
        }
        if let (true, Some(auth)) = (self.via_proxy, &self.proxy_authorization) {
            req.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
        }
        req.push_str("\r\n");
        self.method = head.method;
        self.framing = head.framing;
        self.stream.write_all(req.as_bytes())
    }

    fn body(&mut self) -> &mut dyn Write {
        self
    }

    fn finish_body(&mut self) -> io::Result<()> {
        if self.framing == Framing::Chunked {
            self.stream.write_all(b"0\r\n\r\n")?;
        }
        self.stream.flush()
    }

    fn read_head(&mut self) -> io::Result<ResponseHead> {
        let head = read_response_head(&mut self.stream, &mut self.parser, &mut self.read_buf)?;
        let content_length = head
            .headers
            .get(headers::CONTENT_LENGTH)
            .and_then(parse_header_int)
            .map(|n| n as u64);
        let chunked = head
            .headers
            .get_all(headers::TRANSFER_ENCODING)
            .any(|v| v.to_ascii_lowercase().contains("chunked"));
        let no_body = self.method == Method::Head || head.code == 204 || head.code == 304;
        self.parser.set_body_mode(content_length, chunked, no_body);
        Ok(head)
    }

    fn input_stream(self: Box<Self>) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.into_body_reader()))
    }

    fn error_stream(self: Box<Self>) -> Option<Box<dyn Read + Send>> {
        Some(Box::new(self.into_body_reader()))
    }
}

/// Request body writes, framed.
impl Write for HttpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.framing == Framing::Chunked {
            self.stream.write_all(format!("{:x}\r\n", buf.len()).as_bytes())?;
            self.stream.write_all(buf)?;
            self.stream.write_all(b"\r\n")?;
            Ok(buf.len())
        } else {
            self.stream.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Sink that queues decoded body bytes.
struct BodySink<'a> {
    out: &'a mut BytesMut,
}

impl H1ResponseHandler for BodySink<'_> {
    fn status(&mut self, _code: u16, _reason: &str) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
    }
}

/// Response body with transfer framing removed. Dropping it closes the connection.
pub struct BodyReader {
    stream: HttpStream,
    parser: ResponseParser,
    buf: BytesMut,
    pending: BytesMut,
    eof: bool,
}

impl Read for BodyReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if !self.pending.is_empty() {
                let n = out.len().min(self.pending.len());
                out[..n].copy_from_slice(&self.pending[..n]);
                self.pending.advance(n);
                return Ok(n);
            }
            if self.eof || self.parser.state() == ParseState::Idle {
                return Ok(0);
            }
            if !self.buf.is_empty() {
                let before = self.buf.len();
                let mut sink = BodySink {
                    out: &mut self.pending,
                };
                self.parser.receive(&mut self.buf, &mut sink)?;
                if !self.pending.is_empty()
                    || self.buf.len() != before
                    || self.parser.state() == ParseState::Idle
                {
                    continue;
                }
            }
            let mut tmp = [0u8; READ_CHUNK];
            let n = match self.stream.read(&mut tmp) {
                Ok(n) => n,
                // TLS peers often close without close_notify
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && self.parser.is_read_until_close() => 0,
                Err(e) => return Err(e),
            };
            if n == 0 {
                if self.parser.is_read_until_close() {
                    self.eof = true;
                    return Ok(0);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before end of response body",
                ));
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        trace!("closing HTTP connection");
        let _ = self.stream.tcp().shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn head(method: Method, url: &str) -> RequestHead {
        RequestHead {
            method,
            url: Url::parse(url).unwrap(),
            headers: Headers::new(),
            framing: Framing::None,
        }
    }

    #[test]
    fn request_targets() {
        let h = head(Method::Get, "http://example.com:8080/a/b?x=1#frag");
        assert_eq!(h.origin_form(), "/a/b?x=1");
        assert_eq!(h.absolute_form(), "http://example.com:8080/a/b?x=1");
        assert_eq!(h.host_header(), "example.com:8080");
        let h = head(Method::Get, "https://example.com");
        assert_eq!(h.origin_form(), "/");
        assert_eq!(h.host_header(), "example.com");
    }

    #[test]
    fn head_skips_interim_responses() {
        let wire = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nLocation: /x\r\nContent-Length: 2\r\n\r\nok";
        let mut stream = Cursor::new(wire.to_vec());
        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::new();
        let head = read_response_head(&mut stream, &mut parser, &mut buf).unwrap();
        assert_eq!(head.code, 201);
        assert_eq!(head.message, "Created");
        assert_eq!(head.headers.get("location"), Some("/x"));
        assert_eq!(&buf[..], b"ok");
    }

    #[test]
    fn truncated_head_is_an_error() {
        let mut stream = Cursor::new(b"HTTP/1.1 200 OK\r\nContent-".to_vec());
        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::new();
        let err = read_response_head(&mut stream, &mut parser, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
