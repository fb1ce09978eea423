/*
 * multipart.rs
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

//! `multipart/form-data` body builder (RFC 7578).
//!
//! Parts are serialized into an in-memory buffer as they are added. The closing
//! delimiter is appended the first time the length or the body is asked for.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::entity::Entity;
use crate::error::{HttpError, Result};

pub const BOUNDARY_LENGTH: usize = 30;
pub const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

pub struct MultipartBody {
    boundary: String,
    buf: BytesMut,
    finished: bool,
}

impl MultipartBody {
    pub fn new() -> Self {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LENGTH)
            .map(char::from)
            .collect();
        Self::with_boundary(boundary)
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: BytesMut::with_capacity(4096),
            finished: false,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn add_text_part(&mut self, key: &str, value: &str) {
        self.add_text_part_with_type(key, value, DEFAULT_TEXT_CONTENT_TYPE);
    }

    pub fn add_text_part_with_type(&mut self, key: &str, value: &str, content_type: &str) {
        self.add_text_bytes(key, value.as_bytes(), content_type);
    }

    /// Text part whose value is already encoded in some charset.
    pub fn add_text_bytes(&mut self, key: &str, value: &[u8], content_type: &str) {
        self.write_delimiter();
        self.put_line(&format!(
            "Content-Disposition: form-data; name=\"{}\"",
            quote_escape(key)
        ));
        self.put_line(&format!("Content-Type: {}", content_type));
        self.put_line("");
        self.buf.put_slice(value);
        self.put_line("");
    }

    /// Binary part. The source is read to the end now.
    pub fn add_binary_part(
        &mut self,
        key: &str,
        filename: &str,
        source: &mut dyn Read,
        content_type: &str,
    ) -> Result<()> {
        let mut data = Vec::new();
        source
            .read_to_end(&mut data)
            .map_err(|e| HttpError::PartUnavailable {
                name: key.to_string(),
                source: e,
            })?;
        self.add_binary_bytes(key, filename, &data, content_type);
        Ok(())
    }

    pub fn add_binary_bytes(&mut self, key: &str, filename: &str, data: &[u8], content_type: &str) {
        self.write_delimiter();
        self.put_line(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            quote_escape(key),
            quote_escape(filename)
        ));
        self.put_line(&format!("Content-Type: {}", content_type));
        self.put_line("Content-Transfer-Encoding: binary");
        self.put_line("");
        self.buf.put_slice(data);
        self.put_line("");
    }

    /// File part, named after the file. Fails with `PartUnavailable` if the file cannot be read.
    pub fn add_file_part(&mut self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let mut file = File::open(path).map_err(|e| HttpError::PartUnavailable {
            name: key.to_string(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| super::params::DEFAULT_FILENAME.to_string());
        self.add_binary_part(key, &filename, &mut file, content_type)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Total length including the closing delimiter.
    pub fn content_length(&mut self) -> u64 {
        self.finish();
        self.buf.len() as u64
    }

    pub fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.finish();
        out.write_all(&self.buf)
    }

    /// The complete body.
    pub fn as_bytes(&mut self) -> &[u8] {
        self.finish();
        &self.buf
    }

    /// Length of `--{boundary}--\r\n`.
    fn closing_len(&self) -> usize {
        self.boundary.len() + 6
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.buf.put_slice(b"--");
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"--\r\n");
        self.finished = true;
    }

    /// Opens the next part. A part added after the body was finished goes before the
    /// closing delimiter, which is written again on the next `finish`.
    fn write_delimiter(&mut self) {
        if self.finished {
            let end = self.buf.len() - self.closing_len();
            self.buf.truncate(end);
            self.finished = false;
        }
        self.buf.put_slice(b"--");
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"\r\n");
    }

    fn put_line(&mut self, line: &str) {
        self.buf.put_slice(line.as_bytes());
        self.buf.put_slice(b"\r\n");
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for MultipartBody {
    fn content_type(&self) -> Option<String> {
        Some(MultipartBody::content_type(self))
    }

    fn content_length(&mut self) -> Option<u64> {
        Some(MultipartBody::content_length(self))
    }

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        MultipartBody::write_to(self, out)
    }
}

/// Field names and filenames go inside quotes; a literal quote becomes %22 and
/// line breaks are dropped.
fn quote_escape(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .replace('"', "%22")
}
