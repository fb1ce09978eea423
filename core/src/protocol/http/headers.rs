/*
 * headers.rs
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

//! Raw header collection and the typed view over the response headers we care about.

use chrono::{DateTime, Utc};

use super::date::parse_http_date;

pub const CACHE_CONTROL: &str = "Cache-Control";
pub const DATE: &str = "Date";
pub const EXPIRES: &str = "Expires";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const ETAG: &str = "ETag";
pub const PRAGMA: &str = "Pragma";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const AGE: &str = "Age";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const LOCATION: &str = "Location";
pub const COOKIE: &str = "Cookie";
pub const USER_AGENT: &str = "User-Agent";
pub const REFERER: &str = "Referer";
pub const AUTHORIZATION: &str = "Authorization";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const CONNECTION: &str = "Connection";
pub const HOST: &str = "Host";
pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const CACHE_CONTROL_NO_CACHE: &str = "no-cache";

/// Ordered header collection. Names keep their original case; lookups ignore it.
/// A name may appear more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single one, keeping the position of the first.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => {
                self.entries[i].1 = value;
                let mut seen = false;
                self.entries.retain(|(n, _)| {
                    if n.eq_ignore_ascii_case(name) {
                        let keep = !seen;
                        seen = true;
                        keep
                    } else {
                        true
                    }
                });
            }
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

/// Typed view of the caching, cookie and entity headers of a response.
///
/// Built in one pass. Malformed numbers and dates degrade to defaults and never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub cache_control: Option<String>,
    /// `Pragma: no-cache` was present.
    pub no_cache: bool,
    /// From the `Date` header.
    pub served: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub set_cookies: Vec<String>,
    /// Seconds; 0 when absent or malformed.
    pub age: i64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub transfer_encoding: Option<String>,
    /// -1 when absent or malformed.
    pub content_length: i64,
}

impl Default for HeaderFields {
    fn default() -> Self {
        Self {
            cache_control: None,
            no_cache: false,
            served: None,
            expires: None,
            last_modified: None,
            etag: None,
            set_cookies: Vec::new(),
            age: 0,
            content_type: None,
            content_encoding: None,
            transfer_encoding: None,
            content_length: -1,
        }
    }
}

impl HeaderFields {
    pub fn parse(headers: &Headers) -> Self {
        let mut fields = HeaderFields::default();
        for (name, value) in headers.iter() {
            let value = value.trim();
            if name.eq_ignore_ascii_case(CACHE_CONTROL) {
                fields.cache_control = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(DATE) {
                fields.served = parse_http_date(value);
            } else if name.eq_ignore_ascii_case(EXPIRES) {
                fields.expires = parse_http_date(value);
            } else if name.eq_ignore_ascii_case(LAST_MODIFIED) {
                fields.last_modified = parse_http_date(value);
            } else if name.eq_ignore_ascii_case(ETAG) {
                fields.etag = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(PRAGMA) {
                if value.eq_ignore_ascii_case(CACHE_CONTROL_NO_CACHE) {
                    fields.no_cache = true;
                }
            } else if name.eq_ignore_ascii_case(SET_COOKIE) {
                fields.set_cookies.push(value.to_string());
            } else if name.eq_ignore_ascii_case(AGE) {
                fields.age = parse_header_int(value).unwrap_or(0);
            } else if name.eq_ignore_ascii_case(CONTENT_TYPE) {
                fields.content_type = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(CONTENT_ENCODING) {
                fields.content_encoding = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(TRANSFER_ENCODING) {
                fields.transfer_encoding = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                fields.content_length = parse_header_int(value).unwrap_or(-1);
            }
        }
        fields
    }

    /// True when the body is gzip-encoded.
    pub fn is_gzip(&self) -> bool {
        self.content_encoding
            .as_deref()
            .map(|e| e.split(',').any(|t| t.trim().eq_ignore_ascii_case("gzip")))
            .unwrap_or(false)
    }

    pub fn is_chunked(&self) -> bool {
        self.transfer_encoding
            .as_deref()
            .map(|e| e.split(',').any(|t| t.trim().eq_ignore_ascii_case("chunked")))
            .unwrap_or(false)
    }
}

/// Parse a non-negative header integer. Negative values clamp to 0, values too large for
/// `i64` clamp to `i64::MAX`. Anything that is not an optionally signed run of digits is None.
pub fn parse_header_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if negative {
        return Some(0);
    }
    Some(digits.parse::<i64>().unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lookup_ignores_case_and_keeps_order() {
        let mut h = Headers::new();
        h.append("Set-Cookie", "a=1");
        h.append("content-type", "text/plain");
        h.append("SET-COOKIE", "b=2");
        assert_eq!(h.get("Content-Type"), Some("text/plain"));
        assert_eq!(h.get("set-cookie"), Some("a=1"));
        assert_eq!(h.get_all("Set-Cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(h.len(), 3);
        assert_eq!(h.get("X-Missing"), None);
    }

    #[test]
    fn set_collapses_duplicates() {
        let mut h: Headers = vec![("A", "1"), ("B", "2"), ("a", "3")].into_iter().collect();
        h.set("A", "9");
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![("A", "9"), ("B", "2")]);
        h.remove("b");
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn fields_from_typical_response() {
        let h: Headers = vec![
            ("Date", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("cache-control", "max-age=60"),
            ("Pragma", "no-cache"),
            ("ETag", "\"abc\""),
            ("Set-Cookie", "sid=1"),
            ("Set-Cookie", "theme=dark"),
            ("Age", "12"),
            ("Content-Type", "text/html"),
            ("Content-Encoding", "gzip"),
            ("Content-Length", "1024"),
            ("X-Unknown", "ignored"),
        ]
        .into_iter()
        .collect();
        let f = HeaderFields::parse(&h);
        assert_eq!(f.served, Some(Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()));
        assert_eq!(f.cache_control.as_deref(), Some("max-age=60"));
        assert!(f.no_cache);
        assert_eq!(f.etag.as_deref(), Some("\"abc\""));
        assert_eq!(f.set_cookies, vec!["sid=1", "theme=dark"]);
        assert_eq!(f.age, 12);
        assert_eq!(f.content_length, 1024);
        assert!(f.is_gzip());
        assert!(!f.is_chunked());
    }

    #[test]
    fn malformed_values_degrade() {
        let h: Headers = vec![
            ("Age", "soon"),
            ("Content-Length", "lots"),
            ("Expires", "0"),
            ("Last-Modified", "yesterday"),
        ]
        .into_iter()
        .collect();
        let f = HeaderFields::parse(&h);
        assert_eq!(f.age, 0);
        assert_eq!(f.content_length, -1);
        assert_eq!(f.expires, None);
        assert_eq!(f.last_modified, None);
        assert_eq!(HeaderFields::parse(&Headers::new()).content_length, -1);
    }

    #[test]
    fn integers_clamp() {
        assert_eq!(parse_header_int("-5"), Some(0));
        assert_eq!(parse_header_int("99999999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_header_int(" 42 "), Some(42));
        assert_eq!(parse_header_int("4 2"), None);
        assert_eq!(parse_header_int(""), None);
    }
}
