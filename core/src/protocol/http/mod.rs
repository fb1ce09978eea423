/*
 * mod.rs
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

//! HTTP/1.1 client with blocking I/O.
//!
//! Design:
//! - `RequestBuilder` configures a `Request`; `HttpClient::new_call` wraps it in a `Call`
//!   that executes once and keeps its `Response`.
//! - Connections come from a `ConnectionFactory`; the default one uses `std::net` and rustls.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer and multipart assembly).
//! - The response head is push-parsed by the h1 state machine; the body is then read
//!   as a stream framed by Content-Length, chunked encoding or connection close.

mod handler;

pub mod call;
pub mod client;
pub mod connection;
pub mod cookie;
pub mod date;
pub mod entity;
pub mod h1;
pub mod headers;
pub mod multipart;
pub mod params;
pub mod request;
pub mod response;

pub use call::Call;
pub use client::{ConnectionFactory, DefaultConnectionFactory, HttpClient, Proxy};
pub use connection::{Connection, HttpConnection, HttpStream};
pub use cookie::{Cookie, CookieStore, MemoryCookieStore};
pub use date::{format_http_date, parse_http_date};
pub use entity::{BytesEntity, Entity, StreamEntity};
pub use handler::{Interceptor, ProgressCallback, ProgressWriter};
pub use headers::{HeaderFields, Headers};
pub use multipart::MultipartBody;
pub use params::Params;
pub use request::{Method, Request, RequestBuilder};
pub use response::Response;
