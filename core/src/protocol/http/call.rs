/*
 * call.rs
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

//! One execution of a request.
//!
//! `execute` runs the interceptor, opens a connection, writes the head and body, reads the
//! response head and wraps the body. The response is kept: executing again returns it
//! without touching the network.

use std::io::{Read, Write};

use log::{debug, trace, warn};
use url::Url;

use super::client::{ConnectSettings, HttpClient};
use super::connection::{Connection, Framing, RequestHead, ResponseHead};
use super::entity::Entity;
use super::handler::{ProgressCallback, ProgressWriter};
use super::headers::{self, Headers};
use super::request::{parse_http_url, Method, Request};
use super::response::Response;
use crate::error::{HttpError, Result};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 20;

pub struct Call {
    client: HttpClient,
    request: Request,
    response: Option<Response>,
    /// Built from the entity or params on the first attempt and reused by later ones.
    body: Option<Box<dyn Entity>>,
    body_prepared: bool,
    body_sent: bool,
}

fn is_redirect(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

fn check_headers(headers: &Headers) -> Result<()> {
    for (name, value) in headers.iter() {
        let bad_name = name.is_empty()
            || name
                .bytes()
                .any(|b| b <= b' ' || b == b':' || b >= 0x7f);
        if bad_name || value.contains(&['\r', '\n'][..]) {
            return Err(HttpError::configuration(format!("invalid header: {:?}", name)));
        }
    }
    Ok(())
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

impl Call {
    pub(crate) fn new(client: HttpClient, request: Request) -> Self {
        Self {
            client,
            request,
            response: None,
            body: None,
            body_prepared: false,
            body_sent: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn is_executed(&self) -> bool {
        self.response.is_some()
    }

    /// Perform the exchange, or return the response of the earlier one.
    pub fn execute(&mut self) -> Result<&mut Response> {
        if self.response.is_none() {
            let response = self.perform()?;
            self.response = Some(response);
        }
        match self.response.as_mut() {
            Some(r) => Ok(r),
            None => Err(HttpError::transport("no response")),
        }
    }

    /// Execute if needed and take the response.
    pub fn into_response(mut self) -> Result<Response> {
        match self.response.take() {
            Some(r) => Ok(r),
            None => self.perform(),
        }
    }

    pub fn code(&mut self) -> Result<u16> {
        Ok(self.execute()?.code())
    }

    pub fn message(&mut self) -> Result<String> {
        Ok(self.execute()?.message().to_string())
    }

    pub fn as_bytes(&mut self) -> Result<&[u8]> {
        self.execute()?.as_bytes()
    }

    pub fn as_string(&mut self) -> Result<String> {
        self.execute()?.as_string()
    }

    pub fn as_stream(&mut self) -> Result<Box<dyn Read + Send + '_>> {
        Ok(self.execute()?.as_stream())
    }

    pub fn copy_to(&mut self, out: &mut dyn Write) -> Result<u64> {
        self.execute()?.copy_to(out)
    }

    fn perform(&mut self) -> Result<Response> {
        if let Some(interceptor) = self.request.interceptor.clone() {
            interceptor.intercept(&mut self.request);
        }
        let first_url = self.request.parsed_url()?;
        check_headers(&self.request.headers)?;
        self.prepare_body()?;
        if self.request.debug {
            debug!("[Request] {}", self.request);
        }
        let settings = ConnectSettings {
            connect_timeout: self.request.connect_timeout,
            read_timeout: self.request.read_timeout,
            trust_all_certs: self.request.trust_all_certs,
            trust_all_hosts: self.request.trust_all_hosts,
            tls: self.client.tls().clone(),
        };

        let mut body = self.body.take();
        let result = self.run(&first_url, &mut body, &settings);
        self.body = body;
        result
    }

    fn prepare_body(&mut self) -> Result<()> {
        if !self.body_prepared {
            if self.request.method.permits_body() {
                self.body = match self.request.entity.take() {
                    Some(e) => Some(e),
                    None => self.request.params.to_entity(self.request.charset)?,
                };
            }
            self.body_prepared = true;
        }
        if self.body_sent {
            if let Some(body) = &self.body {
                if !body.is_repeatable() {
                    return Err(HttpError::configuration(
                        "request body was consumed by an earlier attempt",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Follow the exchange through redirects to the final response.
    fn run(
        &mut self,
        first_url: &Url,
        body: &mut Option<Box<dyn Entity>>,
        settings: &ConnectSettings,
    ) -> Result<Response> {
        let mut method = self.request.method;
        let mut send_body = body.is_some();
        let mut url = first_url.clone();
        let mut hops = 0;
        loop {
            let same = same_origin(&url, first_url);
            let entity = if send_body { body.as_mut() } else { None };
            let (head, conn) = self.exchange(&url, method, entity, same, settings)?;
            self.store_cookies(&url, &head);

            if self.request.follow_redirects && is_redirect(head.code) {
                if let Some(next) = self.redirect_target(&url, &head, method, send_body)? {
                    if hops >= MAX_REDIRECTS {
                        return Err(HttpError::transport(format!(
                            "too many redirects (more than {})",
                            MAX_REDIRECTS
                        )));
                    }
                    drop(conn);
                    if (head.code == 303 && method != Method::Head)
                        || (matches!(head.code, 301 | 302) && method == Method::Post)
                    {
                        method = Method::Get;
                        send_body = false;
                    }
                    trace!("redirect {} -> {}", head.code, next);
                    url = next;
                    hops += 1;
                    continue;
                }
            }

            let stream = if (200..400).contains(&head.code) {
                Some(conn.input_stream()?)
            } else {
                conn.error_stream()
            };
            let mut response = Response::new(head, stream);
            response.set_url(url);
            if self.request.debug {
                debug!("[Response] {}", response);
            }
            return Ok(response);
        }
    }

    /// Where to go next, or None to hand the redirect response back to the caller.
    fn redirect_target(&self, url: &Url, head: &ResponseHead, method: Method, has_body: bool) -> Result<Option<Url>> {
        let location = match head.headers.get(headers::LOCATION) {
            Some(l) if !l.trim().is_empty() => l.trim(),
            _ => return Ok(None),
        };
        // a consumed body cannot be sent again
        let keeps_method = matches!(head.code, 307 | 308) || (matches!(head.code, 301 | 302) && method != Method::Post);
        if keeps_method && has_body {
            warn!("not following {} for a request with a body", head.code);
            return Ok(None);
        }
        let next = url
            .join(location)
            .map_err(|e| HttpError::configuration(format!("invalid redirect location {}: {}", location, e)))?;
        Ok(Some(parse_http_url(next.as_str())?))
    }

    fn store_cookies(&self, url: &Url, head: &ResponseHead) {
        if let Some(store) = &self.request.cookie_store {
            let set_cookies: Vec<String> = head
                .headers
                .get_all(headers::SET_COOKIE)
                .map(str::to_string)
                .collect();
            if !set_cookies.is_empty() {
                store.store_cookies(url, &set_cookies);
            }
        }
    }

    /// One request/response round trip up to the end of the response head.
    fn exchange(
        &mut self,
        url: &Url,
        method: Method,
        entity: Option<&mut Box<dyn Entity>>,
        keep_auth: bool,
        settings: &ConnectSettings,
    ) -> Result<(ResponseHead, Box<dyn Connection>)> {
        let request = &mut self.request;
        let mut conn = self
            .client
            .factory()
            .open(url, request.proxy.as_ref(), settings)?;
        let secure = conn.is_secure();
        if url.scheme() == "https" && !secure {
            return Err(HttpError::transport(format!("connection to {} is not secure", url)));
        }
        trace!("connected to {} ({})", url, if secure { "tls" } else { "plain" });

        let mut headers = request.headers.clone();
        if !keep_auth {
            headers.remove(headers::AUTHORIZATION);
        }
        if let Some(store) = &request.cookie_store {
            if !headers.contains(headers::COOKIE) {
                if let Some(cookie) = store.cookie_header(url) {
                    headers.append(headers::COOKIE, cookie);
                }
            }
        }
        let defaults = self.client.defaults();
        if let Some(agent) = &defaults.user_agent {
            if !headers.contains(headers::USER_AGENT) {
                headers.append(headers::USER_AGENT, agent.as_str());
            }
        }
        if defaults.accept_gzip && !headers.contains(headers::ACCEPT_ENCODING) {
            headers.append(headers::ACCEPT_ENCODING, "gzip");
        }
        if !headers.contains(headers::CONNECTION) {
            headers.append(
                headers::CONNECTION,
                if request.keep_alive { "keep-alive" } else { "close" },
            );
        }

        let mut entity = entity;
        let framing = match entity.as_mut() {
            Some(e) => {
                if let Some(ct) = e.content_type() {
                    headers.set(headers::CONTENT_TYPE, ct);
                }
                headers.remove(headers::CONTENT_LENGTH);
                headers.remove(headers::TRANSFER_ENCODING);
                match e.content_length() {
                    Some(n) => Framing::Fixed(n),
                    None => Framing::Chunked,
                }
            }
            None => Framing::None,
        };
        let total = match framing {
            Framing::Fixed(n) => Some(n),
            _ => None,
        };

        conn.write_head(&RequestHead {
            method,
            url: url.clone(),
            headers,
            framing,
        })?;
        if let Some(e) = entity {
            self.body_sent = true;
            let callback: Option<&mut dyn ProgressCallback> = match request.progress.as_mut() {
                Some(p) => Some(&mut **p),
                None => None,
            };
            let mut writer = ProgressWriter::new(conn.body(), callback, total);
            e.write_to(&mut writer)?;
            trace!("wrote {} body bytes", writer.written());
        }
        conn.finish_body()?;
        let head = conn.read_head()?;
        trace!("{} {} -> {} {}", method, url, head.code, head.message);
        Ok((head, conn))
    }
}
