/*
 * client.rs
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

//! HTTP client: opens connections through a `ConnectionFactory` and hands out calls.

use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use bytes::BytesMut;
use log::trace;
use url::Url;

use super::call::Call;
use super::connection::{read_response_head, Connection, HttpConnection, HttpStream};
use super::h1::ResponseParser;
use super::request::{Method, Request, RequestBuilder};
use super::response::Response;
use crate::config::ClientDefaults;
use crate::error::{HttpError, Result};
use crate::net::{self, TlsConfig};

/// HTTP forward proxy, optionally with basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Proxy {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
}

impl Proxy {
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `Proxy-Authorization` value when credentials are set.
    pub fn authorization(&self) -> Option<String> {
        self.credentials.as_ref().map(|(user, password)| {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
            format!("Basic {}", token)
        })
    }

    fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.port == 0 {
            return Err(HttpError::configuration(format!("invalid proxy {}", self)));
        }
        if self.host.contains(&['\r', '\n', '/', ' '][..]) {
            return Err(HttpError::configuration("invalid proxy host"));
        }
        Ok(())
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// credentials stay out of logs
impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

/// Per-request transport settings given to the factory.
#[derive(Clone)]
pub struct ConnectSettings {
    /// Zero means no timeout.
    pub connect_timeout: Duration,
    /// Zero means no timeout.
    pub read_timeout: Duration,
    pub trust_all_certs: bool,
    pub trust_all_hosts: bool,
    pub tls: Arc<TlsConfig>,
}

/// Opens a connection for a URL, optionally through a proxy.
pub trait ConnectionFactory: Send + Sync {
    fn open(&self, url: &Url, proxy: Option<&Proxy>, settings: &ConnectSettings) -> Result<Box<dyn Connection>>;
}

/// `std::net` TCP, rustls for https.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnectionFactory;

fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() {
        None
    } else {
        Some(d)
    }
}

fn connect_tcp(host: &str, port: u16, settings: &ConnectSettings) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {}", host),
        ));
    }
    let mut last_err = None;
    for addr in addrs {
        trace!("connecting to {}", addr);
        let attempt = match non_zero(settings.connect_timeout) {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(tcp) => {
                tcp.set_read_timeout(non_zero(settings.read_timeout))?;
                tcp.set_write_timeout(non_zero(settings.read_timeout))?;
                tcp.set_nodelay(true)?;
                return Ok(tcp);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "connect failed")))
}

/// Ask the proxy for a tunnel to `host:port`.
fn open_tunnel(tcp: &mut TcpStream, host: &str, port: u16, proxy: &Proxy) -> io::Result<()> {
    let mut req = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
        host = host,
        port = port
    );
    if let Some(auth) = proxy.authorization() {
        req.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
    }
    req.push_str("\r\n");
    tcp.write_all(req.as_bytes())?;
    tcp.flush()?;
    let mut parser = ResponseParser::new();
    let mut buf = BytesMut::new();
    let head = read_response_head(tcp, &mut parser, &mut buf)?;
    if !(200..300).contains(&head.code) {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("proxy CONNECT failed: {} {}", head.code, head.message),
        ));
    }
    trace!("tunnel to {}:{} established through {}", host, port, proxy);
    Ok(())
}

impl ConnectionFactory for DefaultConnectionFactory {
    fn open(&self, url: &Url, proxy: Option<&Proxy>, settings: &ConnectSettings) -> Result<Box<dyn Connection>> {
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::configuration(format!("URL has no host: {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::configuration(format!("URL has no port: {}", url)))?;
        let secure = url.scheme() == "https";
        if let Some(p) = proxy {
            p.validate()?;
        }
        let (connect_host, connect_port) = match proxy {
            Some(p) => (p.host(), p.port()),
            None => (host, port),
        };
        let mut tcp = connect_tcp(connect_host, connect_port, settings)?;

        if !secure {
            let stream = HttpStream::Plain(tcp);
            return Ok(match proxy {
                Some(p) => Box::new(HttpConnection::through_proxy(stream, p.authorization())),
                None => Box::new(HttpConnection::new(stream)),
            });
        }

        if let Some(p) = proxy {
            open_tunnel(&mut tcp, host, port, p)?;
        }
        let config = settings
            .tls
            .client_config(settings.trust_all_certs, settings.trust_all_hosts)?;
        // IPv6 literals come bracketed from the URL
        let name = net::server_name(host.trim_start_matches('[').trim_end_matches(']'))?;
        let stream = HttpStream::connect_tls(tcp, config, name)?;
        Ok(Box::new(HttpConnection::new(stream)))
    }
}

/// Entry point: builds requests with the configured defaults and executes them.
///
/// Cheap to clone; clones share the connection factory and TLS configurations.
#[derive(Clone)]
pub struct HttpClient {
    factory: Arc<dyn ConnectionFactory>,
    tls: Arc<TlsConfig>,
    defaults: ClientDefaults,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            factory: Arc::new(DefaultConnectionFactory),
            tls: Arc::new(TlsConfig::new()),
            defaults: ClientDefaults::default(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_tls(mut self, tls: Arc<TlsConfig>) -> Self {
        self.tls = tls;
        self
    }

    /// Defaults applied to every builder from `request`.
    pub fn with_defaults(mut self, defaults: ClientDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &ClientDefaults {
        &self.defaults
    }

    pub fn tls(&self) -> &Arc<TlsConfig> {
        &self.tls
    }

    pub(crate) fn factory(&self) -> &dyn ConnectionFactory {
        self.factory.as_ref()
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        self.defaults.apply(RequestBuilder::new(method, url))
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Delete, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Head, url)
    }

    pub fn new_call(&self, request: Request) -> Call {
        Call::new(self.clone(), request)
    }

    /// Execute a request and return its response.
    pub fn execute(&self, request: Request) -> Result<Response> {
        let mut call = self.new_call(request);
        call.execute()?;
        call.into_response()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("tls", &self.tls)
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_credentials_use_basic_scheme() {
        let p = Proxy::http("proxy.local", 3128).with_credentials("Aladdin", "open sesame");
        assert_eq!(p.authorization().as_deref(), Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="));
        assert_eq!(p.to_string(), "proxy.local:3128");
        assert!(!format!("{:?}", p).contains("sesame"));
        assert_eq!(Proxy::http("proxy.local", 3128).authorization(), None);
    }

    #[test]
    fn invalid_proxy_is_configuration_error() {
        let settings = ConnectSettings {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            trust_all_certs: false,
            trust_all_hosts: false,
            tls: Arc::new(TlsConfig::new()),
        };
        let url = Url::parse("http://example.com/").unwrap();
        let err = DefaultConnectionFactory
            .open(&url, Some(&Proxy::http("", 8080)), &settings)
            .err()
            .unwrap();
        assert!(matches!(err, HttpError::Configuration(_)));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let settings = ConnectSettings {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            trust_all_certs: false,
            trust_all_hosts: false,
            tls: Arc::new(TlsConfig::new()),
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = DefaultConnectionFactory.open(&url, None, &settings).err().unwrap();
        assert!(err.is_transport());
    }
}
