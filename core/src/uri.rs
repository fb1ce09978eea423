/*
 * uri.rs
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

//! Query-string and form-body encoding. Keys and values are percent-encoded with the
//! `application/x-www-form-urlencoded` table, then a few sequences are rewritten so the
//! result is also safe in a URL query (space as `%20`, `*` as `%2A`, `~` literal).

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::charset::Charset;

/// Form-encoding table: everything except alphanumerics and `. - * _` is encoded.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// Applied in order after form encoding.
const ENCODING_RULES: &[(&str, &str)] = &[("*", "%2A"), ("+", "%20"), ("%7E", "~")];

pub const QUERY_STRING_SEPARATOR: char = '?';
pub const PARAM_SEPARATOR: &str = "&";
pub const PAIR_SEPARATOR: &str = "=";

/// Percent-encode UTF-8 text for a query string or form body.
pub fn encode(plain: &str) -> String {
    encode_bytes(plain.as_bytes())
}

/// Percent-encode text using the bytes of another charset.
pub fn encode_with_charset(plain: &str, charset: Charset) -> String {
    encode_bytes(&charset.encode(plain))
}

fn encode_bytes(bytes: &[u8]) -> String {
    let mut encoded = percent_encode(bytes, FORM).to_string();
    for (from, to) in ENCODING_RULES {
        if encoded.contains(from) {
            encoded = encoded.replace(from, to);
        }
    }
    encoded
}

/// Decode one form-encoded component (`+` is a space).
pub fn decode(encoded: &str) -> String {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Join `key=value` pairs with `&`, both sides encoded. Empty input gives an empty string.
pub fn encode_params(params: &[(String, String)]) -> String {
    encode_params_with_charset(params, Charset::Utf8)
}

pub fn encode_params_with_charset(params: &[(String, String)], charset: Charset) -> String {
    params
        .iter()
        .map(|(k, v)| {
            let mut pair = encode_with_charset(k, charset);
            pair.push_str(PAIR_SEPARATOR);
            pair.push_str(&encode_with_charset(v, charset));
            pair
        })
        .collect::<Vec<_>>()
        .join(PARAM_SEPARATOR)
}

/// Split a query string (without the leading `?`) back into decoded pairs.
pub fn decode_params(query: &str) -> Vec<(String, String)> {
    query
        .split(PARAM_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once(PAIR_SEPARATOR) {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Append encoded parameters to a URL, with `?` if it has no query yet, else `&`.
/// A fragment, if present, stays at the end. Empty URL or empty params: URL unchanged.
pub fn append_query_string(url: &str, params: &[(String, String)]) -> String {
    if url.is_empty() || params.is_empty() {
        return url.to_string();
    }
    let query = encode_params(params);
    if query.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let mut out = String::with_capacity(url.len() + query.len() + 1);
    out.push_str(base);
    if base.contains(QUERY_STRING_SEPARATOR) {
        if !base.ends_with(QUERY_STRING_SEPARATOR) && !base.ends_with(PARAM_SEPARATOR) {
            out.push_str(PARAM_SEPARATOR);
        }
    } else {
        out.push(QUERY_STRING_SEPARATOR);
    }
    out.push_str(&query);
    out.push_str(fragment);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn encode_rewrites_star_plus_tilde() {
        assert_eq!(encode("a*b"), "a%2Ab");
        assert_eq!(encode("a b"), "a%20b");
        assert_eq!(encode("a~b"), "a~b");
        assert_eq!(encode("a+b"), "a%2Bb");
        assert_eq!(encode("x=1&y"), "x%3D1%26y");
        assert_eq!(encode("safe.-_"), "safe.-_");
    }

    #[test]
    fn encode_non_ascii_as_utf8() {
        assert_eq!(encode("\u{4e2d}"), "%E4%B8%AD");
        assert_eq!(encode_with_charset("caf\u{e9}", Charset::Latin1), "caf%E9");
    }

    #[test]
    fn encode_params_in_insertion_order() {
        let p = pairs(&[("key1", "value1"), ("key2", "value 2")]);
        assert_eq!(encode_params(&p), "key1=value1&key2=value%202");
        assert_eq!(encode_params(&[]), "");
    }

    #[test]
    fn append_uses_question_mark_then_ampersand() {
        let p = pairs(&[("a", "1")]);
        assert_eq!(append_query_string("http://h/p", &p), "http://h/p?a=1");
        assert_eq!(append_query_string("http://h/p?x=y", &p), "http://h/p?x=y&a=1");
        assert_eq!(append_query_string("http://h/p?", &p), "http://h/p?a=1");
        assert_eq!(append_query_string("http://h/p#top", &p), "http://h/p?a=1#top");
    }

    #[test]
    fn append_leaves_url_alone_without_params() {
        assert_eq!(append_query_string("http://h/p", &[]), "http://h/p");
        assert_eq!(append_query_string("", &pairs(&[("a", "1")])), "");
    }

    #[test]
    fn params_survive_encode_decode() {
        let p = pairs(&[("name", "J. Doe"), ("q", "a&b=c"), ("star", "*~+")]);
        let url = append_query_string("http://example.com/search", &p);
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        assert_eq!(decode_params(query), p);
    }
}
