/*
 * params.rs
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

//! Request parameters: query parameters, scalar form fields and binary parts.
//!
//! Scalar fields become a form-urlencoded body, or `text/plain` parts when there is at
//! least one binary part and the body has to be multipart.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use super::entity::{BytesEntity, Entity};
use super::multipart::MultipartBody;
use crate::charset::Charset;
use crate::error::{HttpError, Result};
use crate::uri;

pub const DEFAULT_FILENAME: &str = "nofilename";
pub const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/octet-stream";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where a binary part's bytes come from.
pub enum ByteSource {
    Bytes(Vec<u8>),
    File(File),
    Stream(Box<dyn Read + Send>),
}

impl ByteSource {
    fn reader(self) -> Box<dyn Read + Send> {
        match self {
            ByteSource::Bytes(b) => Box::new(Cursor::new(b)),
            ByteSource::File(f) => Box::new(f),
            ByteSource::Stream(s) => s,
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            ByteSource::File(_) => f.write_str("File"),
            ByteSource::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct BodyPart {
    pub source: ByteSource,
    pub content_type: String,
    pub filename: String,
}

impl BodyPart {
    pub fn new(source: ByteSource, content_type: Option<&str>, filename: Option<&str>) -> Self {
        Self {
            source,
            content_type: content_type.unwrap_or(DEFAULT_BINARY_CONTENT_TYPE).to_string(),
            filename: filename.unwrap_or(DEFAULT_FILENAME).to_string(),
        }
    }
}

/// Parameter container. All three collections keep insertion order; putting an existing
/// key again replaces its value in place.
#[derive(Debug, Default)]
pub struct Params {
    queries: Vec<(String, String)>,
    params: Vec<(String, String)>,
    parts: Vec<(String, BodyPart)>,
}

fn put_pair<T>(list: &mut Vec<(String, T)>, key: String, value: T) {
    match list.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => list.push((key, value)),
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query parameter, always appended to the URL whatever the method.
    pub fn put_query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        put_pair(&mut self.queries, key.into(), value.into());
        self
    }

    /// Scalar parameter: query string for GET/DELETE/HEAD, body for POST/PUT.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        put_pair(&mut self.params, key.into(), value.into());
        self
    }

    pub fn put_all<K, V, I>(&mut self, pairs: I) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.put(k, v);
        }
        self
    }

    pub fn put_bytes(
        &mut self,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        content_type: Option<&str>,
        filename: Option<&str>,
    ) -> &mut Self {
        let part = BodyPart::new(ByteSource::Bytes(data.into()), content_type, filename);
        put_pair(&mut self.parts, key.into(), part);
        self
    }

    /// File part. The file is opened now; the filename defaults to the file's own name.
    pub fn put_file(
        &mut self,
        key: impl Into<String>,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<&mut Self> {
        let key = key.into();
        let file = File::open(path).map_err(|e| HttpError::PartUnavailable {
            name: key.clone(),
            source: e,
        })?;
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let part = BodyPart::new(ByteSource::File(file), content_type, filename.as_deref());
        put_pair(&mut self.parts, key, part);
        Ok(self)
    }

    pub fn put_stream(
        &mut self,
        key: impl Into<String>,
        source: Box<dyn Read + Send>,
        content_type: Option<&str>,
        filename: Option<&str>,
    ) -> &mut Self {
        let part = BodyPart::new(ByteSource::Stream(source), content_type, filename);
        put_pair(&mut self.parts, key.into(), part);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) {
        self.params.retain(|(k, _)| k != key);
        self.parts.retain(|(k, _)| k != key);
    }

    pub fn queries(&self) -> &[(String, String)] {
        &self.queries
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn has_binary_parts(&self) -> bool {
        !self.parts.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty() && self.params.is_empty() && self.parts.is_empty()
    }

    /// Build the request body. Binary parts are moved out (their sources are read once).
    ///
    /// None when there are neither scalar parameters nor parts.
    pub fn to_entity(&mut self, charset: Charset) -> Result<Option<Box<dyn Entity>>> {
        if self.has_binary_parts() {
            let mut body = MultipartBody::new();
            for (key, part) in std::mem::take(&mut self.parts) {
                let mut reader = part.source.reader();
                body.add_binary_part(&key, &part.filename, &mut reader, &part.content_type)?;
            }
            let text_type = format!("text/plain; charset={}", charset.name());
            for (key, value) in &self.params {
                body.add_text_bytes(key, &charset.encode(value), &text_type);
            }
            return Ok(Some(Box::new(body)));
        }
        if self.params.is_empty() {
            return Ok(None);
        }
        let form = uri::encode_params_with_charset(&self.params, charset);
        Ok(Some(Box::new(BytesEntity::new(
            charset.encode(&form),
            Some(FORM_CONTENT_TYPE.to_string()),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(entity: &mut Box<dyn Entity>) -> Vec<u8> {
        let mut out = Vec::new();
        entity.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn last_write_wins_in_place() {
        let mut p = Params::new();
        p.put("a", "1").put("b", "2").put("a", "3");
        assert_eq!(p.params(), &[("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]);
        assert_eq!(p.get("a"), Some("3"));
    }

    #[test]
    fn form_body_from_scalars() {
        let mut p = Params::new();
        p.put("key1", "value1").put("key2", "value2");
        let mut entity = p.to_entity(Charset::Utf8).unwrap().unwrap();
        assert_eq!(entity.content_type().as_deref(), Some(FORM_CONTENT_TYPE));
        assert_eq!(entity.content_length(), Some(23));
        assert_eq!(body_of(&mut entity), b"key1=value1&key2=value2");
    }

    #[test]
    fn nothing_to_send() {
        let mut p = Params::new();
        p.put_query("q", "only-in-url");
        assert!(p.to_entity(Charset::Utf8).unwrap().is_none());
    }

    #[test]
    fn binary_part_forces_multipart() {
        let mut p = Params::new();
        p.put("title", "t");
        p.put_bytes("blob", vec![1u8, 2, 3], None, None);
        assert!(p.has_binary_parts());
        let mut entity = p.to_entity(Charset::Utf8).unwrap().unwrap();
        let ct = entity.content_type().unwrap();
        assert!(ct.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&body_of(&mut entity)).into_owned();
        let blob = body.find("name=\"blob\"; filename=\"nofilename\"").unwrap();
        let title = body.find("name=\"title\"").unwrap();
        assert!(blob < title);
        assert!(body.contains("Content-Type: application/octet-stream"));
        assert!(body.contains("Content-Type: text/plain; charset=UTF-8"));
    }

    #[test]
    fn file_part_opened_eagerly() {
        let mut p = Params::new();
        let err = p
            .put_file("upload", Path::new("/nonexistent/postino.bin"), None)
            .unwrap_err();
        assert!(matches!(err, HttpError::PartUnavailable { .. }));
        assert!(!p.has_binary_parts());
    }
}
