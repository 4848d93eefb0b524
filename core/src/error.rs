/*
 * error.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a mail client for Exchange WebDAV servers.
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

//! Connection and protocol errors.

use std::fmt;
use std::io;

/// Errors from configuration, sign-on, and DAV operations.
///
/// No operation retries automatically: every failure is surfaced to the
/// caller on first occurrence.
#[derive(Debug)]
pub enum Error {
    /// Missing or unparsable configuration (host, credentials, mailbox,
    /// limit, timeouts, local bind address).
    Config(String),
    /// Sign-on failed: both the capability probe and the form sign-on
    /// were rejected.
    Auth(String),
    /// Operation attempted in the wrong connection state (not connected,
    /// or connect while already open).
    State(String),
    /// Non-success HTTP status on a DAV operation, or an unparsable XML
    /// response.
    Protocol(String),
    /// Underlying transport or file I/O failure.
    Transport(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(m) => write!(f, "configuration error: {}", m),
            Error::Auth(m) => write!(f, "authentication failed: {}", m),
            Error::State(m) => write!(f, "invalid state: {}", m),
            Error::Protocol(m) => write!(f, "protocol error: {}", m),
            Error::Transport(m) => write!(f, "transport error: {}", m),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Protocol(format!("XML parse error: {}", e))
    }
}
