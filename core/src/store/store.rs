/*
 * store.rs
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

//! `MailStore`: the account-level object. Owns the connection and hands
//! out folders.

use std::sync::Arc;

use crate::config::{ConnectionConfig, Settings};
use crate::error::Error;
use crate::protocol::dav::{DavConnection, FolderKind};

use super::folder::MailFolder;

pub struct MailStore {
    connection: Arc<DavConnection>,
}

impl MailStore {
    /// Resolve settings and create a disconnected store.
    pub fn new(settings: Settings) -> Result<Self, Error> {
        let config = ConnectionConfig::resolve(settings)?;
        Ok(MailStore {
            connection: Arc::new(DavConnection::new(config)),
        })
    }

    pub fn connect(&self) -> Result<(), Error> {
        self.connection.connect()
    }

    pub fn disconnect(&self) -> Result<(), Error> {
        self.connection.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn default_folder(&self) -> &'static str {
        FolderKind::Inbox.name()
    }

    /// Open a folder by name, listing its messages. Unrecognized names
    /// open the inbox.
    pub fn open_folder(&self, name: &str) -> Result<MailFolder, Error> {
        MailFolder::open(Arc::clone(&self.connection), FolderKind::from_name(name))
    }

    /// Send an RFC 822 message. Any `Bcc` header is stripped from the
    /// stored copy and its recipients are patched onto the draft as a
    /// server-side property instead, so they never appear in the message
    /// text delivered to the other recipients.
    pub fn send(&self, message: &[u8]) -> Result<(), Error> {
        let (message, bcc) = strip_bcc(message);
        self.connection.send(&message, &bcc)
    }
}

/// Remove the `Bcc` header (with continuation lines) from the header block
/// and return its addresses. The body is left untouched.
fn strip_bcc(message: &[u8]) -> (Vec<u8>, Vec<String>) {
    let mut out = Vec::with_capacity(message.len());
    let mut recipients = Vec::new();
    let mut in_headers = true;
    let mut in_bcc = false;
    let mut bcc_value = String::new();
    for line in split_lines(message) {
        if !in_headers {
            out.extend_from_slice(line);
            continue;
        }
        let trimmed = trim_line(line);
        if trimmed.is_empty() {
            in_headers = false;
            in_bcc = false;
            out.extend_from_slice(line);
            continue;
        }
        if in_bcc && (line.starts_with(b" ") || line.starts_with(b"\t")) {
            bcc_value.push_str(&String::from_utf8_lossy(trimmed));
            continue;
        }
        in_bcc = false;
        if let Some(value) = header_value(trimmed, "bcc") {
            in_bcc = true;
            bcc_value.push_str(value.trim());
            continue;
        }
        out.extend_from_slice(line);
    }
    for address in bcc_value.split(',') {
        let address = address.trim();
        if !address.is_empty() {
            recipients.push(address.to_string());
        }
    }
    (out, recipients)
}

fn header_value<'a>(line: &'a [u8], name: &str) -> Option<&'a str> {
    let text = std::str::from_utf8(line).ok()?;
    let (header, value) = text.split_once(':')?;
    if header.trim().eq_ignore_ascii_case(name) {
        Some(value)
    } else {
        None
    }
}

// Lines including their terminators, so reassembly preserves the original
// line endings.
fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
        i += 1;
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcc_header_is_stripped_and_parsed() {
        let message = b"From: a@x.com\r\nBcc: b@y.com, c@z.com\r\nSubject: hi\r\n\r\nbody\r\n";
        let (stripped, bcc) = strip_bcc(message);
        let text = String::from_utf8(stripped).unwrap();
        assert!(!text.to_lowercase().contains("bcc"));
        assert!(text.contains("From: a@x.com"));
        assert!(text.contains("Subject: hi"));
        assert!(text.ends_with("\r\n\r\nbody\r\n"));
        assert_eq!(bcc, vec!["b@y.com", "c@z.com"]);
    }

    #[test]
    fn folded_bcc_header_is_stripped_entirely() {
        let message = b"Bcc: b@y.com,\r\n c@z.com\r\nSubject: hi\r\n\r\nbody";
        let (stripped, bcc) = strip_bcc(message);
        let text = String::from_utf8(stripped).unwrap();
        assert_eq!(text, "Subject: hi\r\n\r\nbody");
        assert_eq!(bcc, vec!["b@y.com", "c@z.com"]);
    }

    #[test]
    fn message_without_bcc_is_unchanged() {
        let message = b"Subject: hi\r\n\r\nBcc: not a header here\r\n";
        let (stripped, bcc) = strip_bcc(message);
        assert_eq!(stripped, message);
        assert!(bcc.is_empty());
    }
}
