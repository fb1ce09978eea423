/*
 * error.rs
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

//! Request, transport and body errors.

use std::io;

/// Errors from building, executing or reading an HTTP exchange.
///
/// HTTP error statuses (4xx, 5xx) are not errors: they come back as a normal
/// `Response`. Only configuration, transport and body-source problems end up here.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Malformed URL, unsupported charset, invalid header or proxy setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// DNS, connect, read or write failure, TLS failure, malformed response head.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A body part source could not be opened when the part was added.
    #[error("body part '{name}' unavailable: {source}")]
    PartUnavailable {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Reading a response body into memory failed part way.
    #[error("failed to read response body: {0}")]
    ReadDrain(#[source] io::Error),
}

impl HttpError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(io::Error::new(io::ErrorKind::Other, msg.into()))
    }

    /// True for errors that a caller could reasonably retry by issuing a new call.
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_maps_to_transport() {
        fn fails() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("read timed out"));
    }

    #[test]
    fn part_unavailable_names_the_part() {
        let err = HttpError::PartUnavailable {
            name: "avatar".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "body part 'avatar' unavailable: no such file");
        assert!(!err.is_transport());
    }
}
