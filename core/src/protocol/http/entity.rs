/*
 * entity.rs
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

//! Request bodies.

use std::io::{self, Read, Write};

/// A request body that knows its content type and, if possible, its length.
///
/// When `content_length` returns None the body is sent with chunked transfer encoding.
pub trait Entity: Send {
    fn content_type(&self) -> Option<String>;

    /// Length in bytes. Takes `&mut self` because computing it may finalize the body.
    fn content_length(&mut self) -> Option<u64>;

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()>;

    /// Whether `write_to` can be called again with the same result.
    fn is_repeatable(&self) -> bool {
        true
    }
}

/// In-memory body.
pub struct BytesEntity {
    data: Vec<u8>,
    content_type: Option<String>,
}

impl BytesEntity {
    pub fn new(data: impl Into<Vec<u8>>, content_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            content_type,
        }
    }

    pub fn text(text: &str, content_type: impl Into<String>) -> Self {
        Self::new(text.as_bytes(), Some(content_type.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Entity for BytesEntity {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn content_length(&mut self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.data)
    }
}

/// Body copied from a reader. Without a known length it goes out chunked.
pub struct StreamEntity {
    source: Box<dyn Read + Send>,
    length: Option<u64>,
    content_type: Option<String>,
}

impl StreamEntity {
    pub fn new(source: Box<dyn Read + Send>, length: Option<u64>, content_type: Option<String>) -> Self {
        Self {
            source,
            length,
            content_type,
        }
    }
}

impl Entity for StreamEntity {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn content_length(&mut self) -> Option<u64> {
        self.length
    }

    fn is_repeatable(&self) -> bool {
        false
    }

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        match self.length {
            Some(n) => {
                let copied = io::copy(&mut (&mut self.source).take(n), out)?;
                if copied < n {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("entity source ended after {} of {} bytes", copied, n),
                    ));
                }
                Ok(())
            }
            None => io::copy(&mut self.source, out).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_entity_reports_length() {
        let mut e = BytesEntity::text("{\"a\":1}", "application/json");
        assert_eq!(e.content_length(), Some(7));
        assert_eq!(e.content_type().as_deref(), Some("application/json"));
        let mut out = Vec::new();
        e.write_to(&mut out).unwrap();
        assert_eq!(out, b"{\"a\":1}");
        assert!(e.is_repeatable());
    }

    #[test]
    fn stream_entity_with_short_source_fails() {
        let mut e = StreamEntity::new(Box::new(io::Cursor::new(b"abc".to_vec())), Some(5), None);
        let mut out = Vec::new();
        let err = e.write_to(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn stream_entity_without_length_copies_everything() {
        let mut e = StreamEntity::new(Box::new(io::Cursor::new(b"abcdef".to_vec())), None, None);
        assert_eq!(e.content_length(), None);
        assert!(!e.is_repeatable());
        let mut out = Vec::new();
        e.write_to(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }
}
