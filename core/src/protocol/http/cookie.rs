/*
 * cookie.rs
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

//! Cookie store (RFC 6265, simplified).
//!
//! Cookies are only accepted from the server that sets them: a `Domain` attribute
//! must domain-match the request host.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use url::Url;

use super::date::parse_http_date;

/// Supplies the `Cookie` header for outgoing requests and receives `Set-Cookie` values.
pub trait CookieStore: Send + Sync {
    /// Value for the `Cookie` header of a request to `url`, if any cookies apply.
    fn cookie_header(&self, url: &Url) -> Option<String>;

    /// Offer the `Set-Cookie` values of a response from `url`.
    fn store_cookies(&self, url: &Url, set_cookies: &[String]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lower-case, without a leading dot.
    pub domain: String,
    /// No `Domain` attribute: only sent back to exactly this host.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// Parse one `Set-Cookie` value received from `url`. None if malformed or
    /// rejected by the original-server policy.
    pub fn parse(set_cookie: &str, url: &Url) -> Option<Cookie> {
        let host = url.host_str()?.to_ascii_lowercase();
        let mut attrs = set_cookie.split(';');
        let (name, value) = attrs.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host.clone(),
            host_only: true,
            path: default_path(url.path()),
            secure: false,
            expires: None,
        };
        let mut max_age: Option<i64> = None;
        for attr in attrs {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            if key.eq_ignore_ascii_case("domain") {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                if domain.is_empty() {
                    continue;
                }
                if !domain_matches(&host, &domain) {
                    warn!("rejecting cookie {} for domain {} from host {}", name, domain, host);
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            } else if key.eq_ignore_ascii_case("path") {
                if val.starts_with('/') {
                    cookie.path = val.to_string();
                }
            } else if key.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("max-age") {
                max_age = val.parse::<i64>().ok();
            } else if key.eq_ignore_ascii_case("expires") {
                if let Some(dt) = parse_http_date(val) {
                    cookie.expires = Some(dt);
                }
            }
        }
        // Max-Age wins over Expires
        if let Some(secs) = max_age {
            cookie.expires = if secs <= 0 {
                Some(DateTime::<Utc>::MIN_UTC)
            } else {
                Utc::now().checked_add_signed(Duration::seconds(secs.min(i64::MAX / 1000)))
            };
        }
        Some(cookie)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|e| e <= now).unwrap_or(false)
    }

    fn matches(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };
        let host_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };
        host_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || (host.ends_with(domain) && host[..host.len() - domain.len()].ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Directory of the request path, `/` when there is none.
fn default_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// In-memory cookie store.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Mutex<Vec<Cookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired cookies currently held.
    pub fn cookies(&self) -> Vec<Cookie> {
        let now = Utc::now();
        match self.cookies.lock() {
            Ok(guard) => guard.iter().filter(|c| !c.is_expired(now)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.cookies.lock() {
            guard.clear();
        }
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookie_header(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let guard = self.cookies.lock().ok()?;
        let mut matching: Vec<&Cookie> = guard
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .collect();
        if matching.is_empty() {
            return None;
        }
        // longer paths first (RFC 6265 5.4)
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn store_cookies(&self, url: &Url, set_cookies: &[String]) {
        let Ok(mut guard) = self.cookies.lock() else {
            return;
        };
        let now = Utc::now();
        for value in set_cookies {
            let Some(cookie) = Cookie::parse(value, url) else {
                continue;
            };
            guard.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            if !cookie.is_expired(now) {
                guard.push(cookie);
            }
        }
        guard.retain(|c| !c.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn round_trip_to_same_host() {
        let store = MemoryCookieStore::new();
        let origin = url("http://example.com/login");
        store.store_cookies(&origin, &["sid=abc; Path=/; HttpOnly".to_string()]);
        assert_eq!(store.cookie_header(&url("http://example.com/home")).as_deref(), Some("sid=abc"));
        assert_eq!(store.cookie_header(&url("http://other.org/")), None);
        assert_eq!(store.cookie_header(&url("http://sub.example.com/")), None);
    }

    #[test]
    fn domain_cookie_reaches_subdomains() {
        let store = MemoryCookieStore::new();
        store.store_cookies(&url("http://www.example.com/"), &["a=1; Domain=.example.com".to_string()]);
        assert_eq!(store.cookie_header(&url("http://api.example.com/")).as_deref(), Some("a=1"));
    }

    #[test]
    fn foreign_domain_is_rejected() {
        let store = MemoryCookieStore::new();
        store.store_cookies(&url("http://example.com/"), &["evil=1; Domain=bank.com".to_string()]);
        assert!(store.cookies().is_empty());
        store.store_cookies(&url("http://notexample.com/"), &["x=1; Domain=example.com".to_string()]);
        assert!(store.cookies().is_empty());
    }

    #[test]
    fn expiry_and_replacement() {
        let store = MemoryCookieStore::new();
        let u = url("http://example.com/");
        store.store_cookies(&u, &["a=1".to_string(), "b=2; Max-Age=3600".to_string()]);
        store.store_cookies(&u, &["a=2".to_string()]);
        store.store_cookies(&u, &["b=gone; Max-Age=0".to_string()]);
        assert_eq!(store.cookie_header(&u).as_deref(), Some("a=2"));
        store.store_cookies(&u, &["c=old; Expires=Sun, 06 Nov 1994 08:49:37 GMT".to_string()]);
        assert_eq!(store.cookies().len(), 1);
    }

    #[test]
    fn secure_and_path_rules() {
        let store = MemoryCookieStore::new();
        let u = url("https://example.com/app/login");
        store.store_cookies(&u, &["s=1; Secure".to_string(), "p=2; Path=/app".to_string()]);
        assert_eq!(store.cookie_header(&url("http://example.com/app/x")).as_deref(), Some("p=2"));
        assert_eq!(store.cookie_header(&url("https://example.com/apple")), None);
        let header = store.cookie_header(&url("https://example.com/app/x")).unwrap();
        assert!(header.contains("s=1") && header.contains("p=2"));
    }
}
