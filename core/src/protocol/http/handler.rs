/*
 * handler.rs
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

//! Request callbacks: upload progress and request interception.
//!
//! Both run synchronously on the thread executing the call.

use std::io::{self, Write};

use super::request::Request;

/// Upload progress. Called after every write of the request body.
pub trait ProgressCallback: Send {
    /// `current` bytes written so far, out of `total` when the body length is known.
    fn on_progress(&mut self, current: u64, total: Option<u64>);
}

impl<F> ProgressCallback for F
where
    F: FnMut(u64, Option<u64>) + Send,
{
    fn on_progress(&mut self, current: u64, total: Option<u64>) {
        self(current, total)
    }
}

/// Runs before the connection is opened and may change the request (sign it, add headers).
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &mut Request);
}

impl<F> Interceptor for F
where
    F: Fn(&mut Request) + Send + Sync,
{
    fn intercept(&self, request: &mut Request) {
        self(request)
    }
}

/// Writer that reports the running byte count to a progress callback.
pub struct ProgressWriter<'a> {
    inner: &'a mut dyn Write,
    callback: Option<&'a mut dyn ProgressCallback>,
    written: u64,
    total: Option<u64>,
}

impl<'a> ProgressWriter<'a> {
    pub fn new(
        inner: &'a mut dyn Write,
        callback: Option<&'a mut dyn ProgressCallback>,
        total: Option<u64>,
    ) -> Self {
        Self {
            inner,
            callback,
            written: 0,
            total,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Write for ProgressWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if let Some(cb) = self.callback.as_mut() {
            cb.on_progress(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
