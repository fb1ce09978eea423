/*
 * lib.rs
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

//! Postino core: a synchronous HTTP/1.1 client.
//!
//! - `protocol::http`: request builder, form and multipart bodies, header model, cookie
//!   store, executor and a response wrapper that undoes gzip transparently.
//! - `uri`: URL encoding of parameters.
//! - `net`: TLS configuration, including the trust-all bypasses.
//! - `config`: client defaults stored as XML.

pub mod charset;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod uri;

pub use charset::Charset;
pub use config::ClientDefaults;
pub use error::{HttpError, Result};
pub use protocol::http::{
    Call, HttpClient, Method, MultipartBody, Params, Proxy, Request, RequestBuilder, Response,
};
