/*
 * config.rs
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

//! Client defaults: settings applied to every request builder an `HttpClient` hands out.
//! Stored as XML in ~/.postino/config.xml:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <postino>
//!   <http connect-timeout-ms="20000" read-timeout-ms="20000" charset="UTF-8"
//!         follow-redirects="false" keep-alive="false" user-agent="postino/0.1"/>
//! </postino>
//! ```
//!
//! All XML read/write uses the quick_xml parser/writer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::charset::Charset;
use crate::error::{HttpError, Result};
use crate::protocol::http::request::{RequestBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

const ROOT_ELEMENT: &str = "postino";
const HTTP_ELEMENT: &str = "http";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDefaults {
    /// Zero means no timeout.
    pub connect_timeout: Duration,
    /// Zero means no timeout.
    pub read_timeout: Duration,
    /// Sent when the request sets no User-Agent of its own.
    pub user_agent: Option<String>,
    /// Ask for gzip when the request sets no Accept-Encoding of its own.
    pub accept_gzip: bool,
    pub charset: Charset,
    pub follow_redirects: bool,
    pub keep_alive: bool,
    pub trust_all_certs: bool,
    pub trust_all_hosts: bool,
    pub debug: bool,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: None,
            accept_gzip: false,
            charset: Charset::Utf8,
            follow_redirects: false,
            keep_alive: false,
            trust_all_certs: false,
            trust_all_hosts: false,
            debug: false,
        }
    }
}

/// Default config directory: ~/.postino.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".postino"))
}

/// Default config path: ~/.postino/config.xml.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("config.xml"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(HttpError::configuration(format!("{}: not a boolean: {}", name, other))),
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| HttpError::configuration(format!("{}: not a number of milliseconds: {}", name, value)))
}

impl ClientDefaults {
    /// Copy the scalar settings onto a fresh builder. Header defaults are added when the
    /// request is executed, so headers set on the builder take precedence.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .charset(self.charset)
            .follow_redirects(self.follow_redirects)
            .keep_alive(self.keep_alive)
            .trust_all_certs(self.trust_all_certs)
            .trust_all_hosts(self.trust_all_hosts)
            .debug(self.debug)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    /// Parse `<postino><http .../></postino>`. Unknown attributes are ignored.
    pub fn from_xml(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut defaults = Self::default();
        let mut in_root = false;
        loop {
            match reader.read_event() {
                Err(e) => return Err(HttpError::configuration(format!("XML parse error: {}", e))),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let name = e.name();
                    if name.as_ref() == ROOT_ELEMENT.as_bytes() {
                        in_root = true;
                    } else if in_root && name.as_ref() == HTTP_ELEMENT.as_bytes() {
                        defaults.read_attributes(&e)?;
                    }
                }
                Ok(Event::End(e)) => {
                    if e.name().as_ref() == ROOT_ELEMENT.as_bytes() {
                        in_root = false;
                    }
                }
                _ => {}
            }
        }
        Ok(defaults)
    }

    fn read_attributes(&mut self, element: &BytesStart<'_>) -> Result<()> {
        for attr in element.attributes() {
            let attr = attr.map_err(|e| HttpError::configuration(format!("XML attribute error: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| HttpError::configuration(e.to_string()))?;
            match key.as_str() {
                "connect-timeout-ms" => self.connect_timeout = parse_millis(&key, &value)?,
                "read-timeout-ms" => self.read_timeout = parse_millis(&key, &value)?,
                "user-agent" => {
                    self.user_agent = Some(value.trim().to_string()).filter(|s| !s.is_empty())
                }
                "accept-gzip" => self.accept_gzip = parse_bool(&key, &value)?,
                "charset" => self.charset = Charset::for_name(value.trim())?,
                "follow-redirects" => self.follow_redirects = parse_bool(&key, &value)?,
                "keep-alive" => self.keep_alive = parse_bool(&key, &value)?,
                "trust-all-certs" => self.trust_all_certs = parse_bool(&key, &value)?,
                "trust-all-hosts" => self.trust_all_hosts = parse_bool(&key, &value)?,
                "debug" => self.debug = parse_bool(&key, &value)?,
                other => warn!("ignoring unknown config attribute {}", other),
            }
        }
        Ok(())
    }

    /// Serialize as XML (UTF-8).
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        let connect = self.connect_timeout.as_millis().to_string();
        let read = self.read_timeout.as_millis().to_string();
        let mut http = BytesStart::new(HTTP_ELEMENT);
        http.push_attribute(("connect-timeout-ms", connect.as_str()));
        http.push_attribute(("read-timeout-ms", read.as_str()));
        http.push_attribute(("charset", self.charset.name()));
        if let Some(agent) = &self.user_agent {
            http.push_attribute(("user-agent", agent.as_str()));
        }
        for (name, value) in [
            ("accept-gzip", self.accept_gzip),
            ("follow-redirects", self.follow_redirects),
            ("keep-alive", self.keep_alive),
            ("trust-all-certs", self.trust_all_certs),
            ("trust-all-hosts", self.trust_all_hosts),
            ("debug", self.debug),
        ] {
            http.push_attribute((name, if value { "true" } else { "false" }));
        }
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| HttpError::configuration(e.to_string()))?;
        writer
            .write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))
            .map_err(|e| HttpError::configuration(e.to_string()))?;
        writer
            .write_event(Event::Empty(http))
            .map_err(|e| HttpError::configuration(e.to_string()))?;
        writer
            .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
            .map_err(|e| HttpError::configuration(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }

    /// Write to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}
