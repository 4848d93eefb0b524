/*
 * escape.rs
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

//! Percent-escaping of message URLs returned by the server.
//!
//! Exchange hands back hrefs containing raw spaces, brackets and non-ASCII
//! characters that must be escaped before they can go on a request line.
//! The allow table below is the exact set the server round-trips; note that
//! `%` itself is not in it, so escaping an already-escaped URL re-encodes
//! the `%` signs. Callers must escape a server-supplied URL exactly once.
//!
//! Non-ASCII characters are escaped per UTF-16 code unit: one `%HH` when
//! the unit fits in a byte, otherwise `%HH%LL` with the high byte first.
//! That is what the server expects for the mailbox URLs it generates.

/// Characters that pass through unescaped: ASCII alphanumerics plus
/// `- _ . ! ~ * ' ( ) : @ & = + $ , ; /`. Everything else, including
/// `[ \ ] ^` and `%`, is escaped.
static ALLOWED: [bool; 128] = build_allowed();

const fn build_allowed() -> [bool; 128] {
    let mut table = [false; 128];
    let mut i = b'a';
    while i <= b'z' {
        table[i as usize] = true;
        i += 1;
    }
    let mut i = b'@';
    while i <= b'Z' {
        table[i as usize] = true;
        i += 1;
    }
    let mut i = b'0';
    while i <= b'9' {
        table[i as usize] = true;
        i += 1;
    }
    let extra = b"-_.!~*'():@&=+$,;/";
    let mut i = 0;
    while i < extra.len() {
        table[extra[i] as usize] = true;
        i += 1;
    }
    table
}

/// Escape a message URL for use on a request line.
pub fn escape(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut units = [0u16; 2];
    for c in url.chars() {
        if (c as u32) < 128 && ALLOWED[c as usize] {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            let unit = *unit;
            if unit <= 0xFF {
                out.push_str(&format!("%{:02X}", unit));
            } else {
                out.push_str(&format!("%{:02X}%{:02X}", unit >> 8, unit & 0xFF));
            }
        }
    }
    out
}
