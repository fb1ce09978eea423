/*
 * response.rs
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

//! HTTP response: status, headers and a body that is either read live or materialized once.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::Path;

use flate2::bufread::GzDecoder;
use url::Url;

use super::connection::ResponseHead;
use super::headers::{HeaderFields, Headers};
use crate::charset::Charset;
use crate::error::{HttpError, Result};

type Body = Box<dyn Read + Send>;

/// Gunzips lazily, so an empty body (HEAD, 204, 304) reads as empty instead of failing.
enum GzipBody {
    Start(BufReader<Body>),
    Decoding(GzDecoder<BufReader<Body>>),
    Done,
}

impl Read for GzipBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self {
                GzipBody::Start(reader) => {
                    if reader.fill_buf()?.is_empty() {
                        *self = GzipBody::Done;
                        return Ok(0);
                    }
                    if let GzipBody::Start(reader) = std::mem::replace(self, GzipBody::Done) {
                        *self = GzipBody::Decoding(GzDecoder::new(reader));
                    }
                }
                GzipBody::Decoding(decoder) => return decoder.read(buf),
                GzipBody::Done => return Ok(0),
            }
        }
    }
}

pub struct Response {
    code: u16,
    message: String,
    headers: Headers,
    fields: HeaderFields,
    url: Option<Url>,
    stream: Option<Body>,
    content: Vec<u8>,
    consumed: bool,
}

impl Response {
    /// Wrap a response head and its body. A gzip content-encoding is undone transparently.
    pub fn new(head: ResponseHead, body: Option<Body>) -> Self {
        let fields = HeaderFields::parse(&head.headers);
        let stream = body.map(|b| -> Body {
            if fields.is_gzip() {
                Box::new(GzipBody::Start(BufReader::new(b)))
            } else {
                b
            }
        });
        Self {
            code: head.code,
            message: head.message,
            headers: head.headers,
            fields,
            url: None,
            stream,
            content: Vec::new(),
            consumed: false,
        }
    }

    pub(crate) fn set_url(&mut self, url: Url) {
        self.url = Some(url);
    }

    /// URL that produced this response (the last one when redirects were followed).
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status in [200, 400).
    pub fn is_successful(&self) -> bool {
        (200..400).contains(&self.code)
    }

    /// Declared Content-Length, -1 when unknown.
    pub fn content_length(&self) -> i64 {
        self.fields.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.fields.content_type.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers_model(&self) -> &HeaderFields {
        &self.fields
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// The body: live from the connection until `as_bytes` has been called, then from memory.
    pub fn as_stream(&mut self) -> Box<dyn Read + Send + '_> {
        if self.consumed {
            return Box::new(Cursor::new(self.content.as_slice()));
        }
        match self.stream.as_mut() {
            Some(s) => Box::new(s),
            None => Box::new(io::empty()),
        }
    }

    /// The whole body. The first call drains and closes the connection; later calls return
    /// the same bytes. If the drain fails the bytes read so far are kept.
    pub fn as_bytes(&mut self) -> Result<&[u8]> {
        if !self.consumed {
            self.consumed = true;
            if let Some(mut stream) = self.stream.take() {
                stream
                    .read_to_end(&mut self.content)
                    .map_err(HttpError::ReadDrain)?;
            }
        }
        Ok(&self.content)
    }

    /// Body decoded as UTF-8.
    pub fn as_string(&mut self) -> Result<String> {
        self.as_string_with(Charset::Utf8)
    }

    pub fn as_string_with(&mut self, charset: Charset) -> Result<String> {
        Ok(charset.decode(self.as_bytes()?))
    }

    /// Copy the body to `out`, returning the number of bytes copied.
    pub fn copy_to(&mut self, out: &mut dyn Write) -> Result<u64> {
        let mut stream = self.as_stream();
        Ok(io::copy(&mut stream, out)?)
    }

    /// Write the body to a file, creating or truncating it.
    pub fn save_to_file(&mut self, path: &Path) -> Result<u64> {
        let mut file = File::create(path)?;
        let n = self.copy_to(&mut file)?;
        file.flush()?;
        Ok(n)
    }

    /// Release the connection without reading the rest of the body.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response{{code={}, message={}, content_length={}, content_type={}, content_encoding={}, headers={}, consumed={}}}",
            self.code,
            self.message,
            self.fields.content_length,
            self.fields.content_type.as_deref().unwrap_or("-"),
            self.fields.content_encoding.as_deref().unwrap_or("-"),
            self.headers.len(),
            self.consumed
        )
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn head(code: u16, headers: &[(&str, &str)]) -> ResponseHead {
        ResponseHead {
            code,
            message: "Status".to_string(),
            headers: headers.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Fails after yielding some bytes.
    struct Flaky {
        sent: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.sent = true;
            buf[..3].copy_from_slice(b"par");
            Ok(3)
        }
    }

    /// Counts reads and records when it is dropped.
    struct Tracked {
        data: Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    impl Read for Tracked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.data.read(buf)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn gzip_is_transparent() {
        let body = gzip(b"hello");
        let mut r = Response::new(
            head(200, &[("Content-Encoding", "gzip")]),
            Some(Box::new(Cursor::new(body))),
        );
        assert_eq!(r.as_string().unwrap(), "hello");
    }

    #[test]
    fn empty_gzip_body_reads_empty() {
        let mut r = Response::new(
            head(204, &[("Content-Encoding", "gzip")]),
            Some(Box::new(io::empty())),
        );
        assert_eq!(r.as_bytes().unwrap(), b"");
    }

    #[test]
    fn as_bytes_is_memoized() {
        let mut r = Response::new(head(200, &[]), Some(Box::new(Cursor::new(b"abc".to_vec()))));
        let first = r.as_bytes().unwrap().to_vec();
        assert!(r.is_consumed());
        let second = r.as_bytes().unwrap().to_vec();
        assert_eq!(first, b"abc");
        assert_eq!(first, second);
        let mut again = Vec::new();
        r.as_stream().read_to_end(&mut again).unwrap();
        assert_eq!(again, b"abc");
    }

    #[test]
    fn live_stream_is_released_after_first_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let body = Tracked {
            data: Cursor::new(b"payload".to_vec()),
            reads: reads.clone(),
            dropped: dropped.clone(),
        };
        let mut r = Response::new(head(200, &[]), Some(Box::new(body)));
        assert_eq!(r.as_bytes().unwrap(), b"payload");
        assert!(dropped.load(Ordering::SeqCst));
        let seen = reads.load(Ordering::SeqCst);
        assert_eq!(r.as_bytes().unwrap(), b"payload");
        assert_eq!(r.as_string().unwrap(), "payload");
        assert_eq!(reads.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn drain_failure_keeps_partial_content() {
        let mut r = Response::new(head(200, &[]), Some(Box::new(Flaky { sent: false })));
        let err = r.as_bytes().unwrap_err();
        assert!(matches!(err, HttpError::ReadDrain(_)));
        assert!(r.is_consumed());
        assert_eq!(r.as_bytes().unwrap(), b"par");
    }

    #[test]
    fn status_classification() {
        assert!(Response::new(head(200, &[]), None).is_successful());
        assert!(Response::new(head(304, &[]), None).is_successful());
        assert!(!Response::new(head(404, &[]), None).is_successful());
        assert!(!Response::new(head(199, &[]), None).is_successful());
    }

    #[test]
    fn accessors() {
        let mut r = Response::new(
            head(200, &[("Content-Type", "text/plain"), ("Content-Length", "3"), ("X-A", "1"), ("x-a", "2")]),
            Some(Box::new(Cursor::new(b"abc".to_vec()))),
        );
        assert_eq!(r.content_type(), Some("text/plain"));
        assert_eq!(r.content_length(), 3);
        assert_eq!(r.header("X-A"), Some("1"));
        assert_eq!(r.header("missing"), None);
        let mut out = Vec::new();
        assert_eq!(r.copy_to(&mut out).unwrap(), 3);
        r.close();
        assert!(r.to_string().contains("code=200"));
    }
}
