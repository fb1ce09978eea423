/*
 * request.rs
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

//! HTTP request: method, URL, headers, parameters or body, and transport settings.
//!
//! Built with `RequestBuilder`, executed once by a `Call`.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use url::Url;

use super::client::Proxy;
use super::cookie::CookieStore;
use super::entity::{BytesEntity, Entity, StreamEntity};
use super::handler::{Interceptor, ProgressCallback};
use super::headers::{self, Headers};
use super::params::Params;
use crate::charset::Charset;
use crate::error::{HttpError, Result};
use crate::uri;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// POST and PUT carry a body; the others put scalar parameters in the query string.
    pub fn permits_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured request. Header names are case-insensitive and the first value set for a
/// name is kept.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Headers,
    pub(crate) params: Params,
    pub(crate) entity: Option<Box<dyn Entity>>,
    pub(crate) charset: Charset,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) use_caches: bool,
    pub(crate) keep_alive: bool,
    pub(crate) follow_redirects: bool,
    pub(crate) trust_all_certs: bool,
    pub(crate) trust_all_hosts: bool,
    pub(crate) proxy: Option<Proxy>,
    pub(crate) cookie_store: Option<Arc<dyn CookieStore>>,
    pub(crate) progress: Option<Box<dyn ProgressCallback>>,
    pub(crate) interceptor: Option<Arc<dyn Interceptor>>,
    pub(crate) debug: bool,
}

impl Request {
    pub fn get(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Head, url)
    }

    fn with_defaults(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            params: Params::new(),
            entity: None,
            charset: Charset::Utf8,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            use_caches: false,
            keep_alive: false,
            follow_redirects: false,
            trust_all_certs: false,
            trust_all_hosts: false,
            proxy: None,
            cookie_store: None,
            progress: None,
            interceptor: None,
            debug: false,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Base URL, without the parameters added by `complete_url`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Add a header unless one with the same name is already present.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.headers.contains(&name) {
            self.headers.append(name, value);
        }
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn use_caches(&self) -> bool {
        self.use_caches
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn trust_all_certs(&self) -> bool {
        self.trust_all_certs
    }

    pub fn trust_all_hosts(&self) -> bool {
        self.trust_all_hosts
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Base URL plus query parameters, plus the scalar parameters for methods without a body.
    pub fn complete_url(&self) -> String {
        let mut query: Vec<(String, String)> = self.params.queries().to_vec();
        if !self.method.permits_body() {
            query.extend(self.params.params().iter().cloned());
        }
        uri::append_query_string(&self.url, &query)
    }

    /// `complete_url` parsed. Malformed URLs and schemes other than http/https are
    /// configuration errors.
    pub fn parsed_url(&self) -> Result<Url> {
        parse_http_url(&self.complete_url())
    }
}

pub(crate) fn parse_http_url(s: &str) -> Result<Url> {
    let url = Url::parse(s).map_err(|e| HttpError::configuration(format!("invalid URL {}: {}", s, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HttpError::configuration(format!("unsupported URL scheme: {}", other)));
        }
    }
    if url.host_str().map(|h| h.is_empty()).unwrap_or(true) {
        return Err(HttpError::configuration(format!("URL has no host: {}", s)));
    }
    Ok(url)
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request{{{} {}", self.method, self.complete_url())?;
        write!(f, ", headers=[")?;
        for (i, (k, v)) in self.headers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if k.eq_ignore_ascii_case(headers::AUTHORIZATION) {
                write!(f, "{}: ***", k)?;
            } else {
                write!(f, "{}: {}", k, v)?;
            }
        }
        write!(
            f,
            "], params={}, parts={}, entity={}, charset={}, connect_timeout={:?}, read_timeout={:?}, follow_redirects={}, keep_alive={}, trust_all_certs={}, trust_all_hosts={}, proxy={}}}",
            self.params.params().len(),
            self.params.has_binary_parts(),
            self.entity.is_some(),
            self.charset,
            self.connect_timeout,
            self.read_timeout,
            self.follow_redirects,
            self.keep_alive,
            self.trust_all_certs,
            self.trust_all_hosts,
            self.proxy.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "none".to_string()),
        )
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Builds a `Request`. Methods take and return the builder by value.
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            request: Request::with_defaults(method, url.into()),
        }
    }

    /// First value wins: a header already set is not replaced.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.add_header(name, value);
        self
    }

    pub fn headers<K, V, I>(mut self, headers: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in headers {
            self.request.add_header(k, v);
        }
        self
    }

    pub fn user_agent(self, agent: impl Into<String>) -> Self {
        self.header(headers::USER_AGENT, agent)
    }

    pub fn referer(self, referer: impl Into<String>) -> Self {
        self.header(headers::REFERER, referer)
    }

    pub fn authorization(self, value: impl Into<String>) -> Self {
        self.header(headers::AUTHORIZATION, value)
    }

    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
        self.authorization(format!("Basic {}", token))
    }

    pub fn accept_gzip_encoding(self) -> Self {
        self.header(headers::ACCEPT_ENCODING, "gzip")
    }

    /// Query parameter, in the URL whatever the method.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.put_query(key, value);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.put(key, value);
        self
    }

    pub fn params<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.request.params.put_all(pairs);
        self
    }

    pub fn part_bytes(
        mut self,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        content_type: Option<&str>,
        filename: Option<&str>,
    ) -> Self {
        self.request.params.put_bytes(key, data, content_type, filename);
        self
    }

    /// File part. Fails now with `PartUnavailable` if the file cannot be opened.
    pub fn part_file(mut self, key: impl Into<String>, path: impl AsRef<Path>, content_type: Option<&str>) -> Result<Self> {
        self.request.params.put_file(key, path.as_ref(), content_type)?;
        Ok(self)
    }

    pub fn part_stream(
        mut self,
        key: impl Into<String>,
        source: impl Read + Send + 'static,
        content_type: Option<&str>,
        filename: Option<&str>,
    ) -> Self {
        self.request
            .params
            .put_stream(key, Box::new(source), content_type, filename);
        self
    }

    /// Raw body; replaces anything the parameters would have produced.
    pub fn entity(mut self, entity: Box<dyn Entity>) -> Self {
        self.request.entity = Some(entity);
        self
    }

    pub fn body_bytes(self, data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.entity(Box::new(BytesEntity::new(data, Some(content_type.into()))))
    }

    pub fn body_string(self, text: &str, content_type: impl Into<String>) -> Self {
        let charset = self.request.charset;
        self.body_bytes(charset.encode(text), content_type)
    }

    /// Body streamed from a reader; chunked when `length` is None.
    pub fn body_stream(
        self,
        source: impl Read + Send + 'static,
        length: Option<u64>,
        content_type: impl Into<String>,
    ) -> Self {
        self.entity(Box::new(StreamEntity::new(
            Box::new(source),
            length,
            Some(content_type.into()),
        )))
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.request.charset = charset;
        self
    }

    pub fn charset_name(self, name: &str) -> Result<Self> {
        Ok(self.charset(Charset::for_name(name)?))
    }

    /// Zero means no timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.request.connect_timeout = timeout;
        self
    }

    /// Zero means no timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.request.read_timeout = timeout;
        self
    }

    pub fn use_caches(mut self, use_caches: bool) -> Self {
        self.request.use_caches = use_caches;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.request.keep_alive = keep_alive;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.request.follow_redirects = follow;
        self
    }

    pub fn trust_all_certs(mut self, trust: bool) -> Self {
        self.request.trust_all_certs = trust;
        self
    }

    pub fn trust_all_hosts(mut self, trust: bool) -> Self {
        self.request.trust_all_hosts = trust;
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.request.proxy = Some(proxy);
        self
    }

    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.request.cookie_store = Some(store);
        self
    }

    pub fn progress(mut self, callback: impl ProgressCallback + 'static) -> Self {
        self.request.progress = Some(Box::new(callback));
        self
    }

    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.request.interceptor = Some(Arc::new(interceptor));
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.request.debug = debug;
        self
    }

    /// Validate the URL and return the request.
    pub fn build(self) -> Result<Request> {
        self.request.parsed_url()?;
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_params_go_to_query_string() {
        let req = Request::get("http://example.com/search")
            .param("q", "rust lang")
            .query("page", "2")
            .build()
            .unwrap();
        assert_eq!(req.complete_url(), "http://example.com/search?page=2&q=rust%20lang");
        assert_eq!(req.complete_url(), req.complete_url());
    }

    #[test]
    fn post_params_stay_out_of_url() {
        let req = Request::post("http://example.com/form?x=1")
            .param("key1", "value1")
            .query("token", "t")
            .build()
            .unwrap();
        assert_eq!(req.complete_url(), "http://example.com/form?x=1&token=t");
    }

    #[test]
    fn first_header_value_wins() {
        let req = Request::get("http://example.com/")
            .header("Accept", "text/html")
            .header("accept", "application/json")
            .user_agent("postino/0.1")
            .build()
            .unwrap();
        assert_eq!(req.header("ACCEPT"), Some("text/html"));
        assert_eq!(req.headers().len(), 2);
    }

    #[test]
    fn defaults() {
        let req = Request::delete("https://example.com/item/1").build().unwrap();
        assert_eq!(req.method(), Method::Delete);
        assert_eq!(req.connect_timeout(), Duration::from_secs(20));
        assert_eq!(req.read_timeout(), Duration::from_secs(20));
        assert!(!req.keep_alive());
        assert!(!req.follow_redirects());
        assert!(!req.use_caches());
        assert!(!req.trust_all_certs() && !req.trust_all_hosts());
        assert_eq!(req.charset(), Charset::Utf8);
    }

    #[test]
    fn malformed_url_is_configuration_error() {
        for bad in ["not a url", "ftp://example.com/file", "http://"] {
            let err = Request::get(bad).build().unwrap_err();
            assert!(matches!(err, HttpError::Configuration(_)), "{}", bad);
        }
    }

    #[test]
    fn basic_auth_header_and_display_masks_it() {
        let req = Request::get("http://example.com/")
            .basic_auth("user", "pass")
            .build()
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("Basic dXNlcjpwYXNz"));
        assert!(!req.to_string().contains("dXNlcjpwYXNz"));
    }

    #[test]
    fn unknown_charset_name() {
        assert!(Request::post("http://example.com/").charset_name("x-unknown").is_err());
    }
}
