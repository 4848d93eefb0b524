/*
 * parse.rs
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

//! Streaming extraction from multistatus responses.
//!
//! One event loop serves every response shape: element start resets a text
//! accumulator, text appends, element end commits (namespace, local name,
//! accumulated text) to a callback. Only leaf text survives, which is all
//! the discovery and listing responses carry. A malformed document aborts
//! the whole parse; partial results are never returned.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::Error;

use super::queries::{DAV_NAMESPACE, HTTPMAIL_NAMESPACE};

/// Run the event loop, calling `commit(namespace, local_name, text)` at
/// every element end.
fn for_each_element<R, F>(source: R, mut commit: F) -> Result<(), Error>
where
    R: BufRead,
    F: FnMut(&str, &str, &str),
{
    let mut reader = NsReader::from_reader(source);
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        buf.clear();
        match reader.read_resolved_event_into(&mut buf)? {
            (_, Event::Start(_)) => text.clear(),
            (_, Event::Text(e)) => text.push_str(&e.unescape()?),
            (resolve, Event::End(e)) => {
                let ns = match &resolve {
                    ResolveResult::Bound(ns) => std::str::from_utf8(ns.0)
                        .map_err(|_| Error::protocol("non-UTF-8 namespace in response"))?,
                    _ => "",
                };
                let local = std::str::from_utf8(e.local_name().into_inner())
                    .map_err(|_| Error::protocol("non-UTF-8 element name in response"))?
                    .to_string();
                commit(ns, &local, text.trim());
                text.clear();
            }
            (resolve, Event::Empty(e)) => {
                let ns = match &resolve {
                    ResolveResult::Bound(ns) => std::str::from_utf8(ns.0)
                        .map_err(|_| Error::protocol("non-UTF-8 namespace in response"))?,
                    _ => "",
                };
                let local = std::str::from_utf8(e.local_name().into_inner())
                    .map_err(|_| Error::protocol("non-UTF-8 element name in response"))?
                    .to_string();
                commit(ns, &local, "");
            }
            (_, Event::Eof) => return Ok(()),
            _ => {}
        }
    }
}

/// Hrefs of a listing response, in document order.
pub fn extract_hrefs<R: BufRead>(source: R) -> Result<Vec<String>, Error> {
    let mut hrefs = Vec::new();
    for_each_element(source, |ns, local, text| {
        if ns == DAV_NAMESPACE && local == "href" && !text.is_empty() {
            hrefs.push(text.to_string());
        }
    })?;
    Ok(hrefs)
}

/// The five well-known folder properties of a discovery response. Each
/// field stays `None` when its element is absent; the caller decides
/// whether that is fatal.
#[derive(Debug, Default)]
pub struct DiscoveredFolders {
    pub inbox: Option<String>,
    pub drafts: Option<String>,
    pub sendmsg: Option<String>,
    pub outbox: Option<String>,
    pub sentitems: Option<String>,
}

pub fn extract_folders<R: BufRead>(source: R) -> Result<DiscoveredFolders, Error> {
    let mut folders = DiscoveredFolders::default();
    for_each_element(source, |ns, local, text| {
        if ns != HTTPMAIL_NAMESPACE || text.is_empty() {
            return;
        }
        let value = Some(text.to_string());
        match local {
            "inbox" => folders.inbox = value,
            "drafts" => folders.drafts = value,
            "sendmsg" => folders.sendmsg = value,
            "outbox" => folders.outbox = value,
            "sentitems" => folders.sentitems = value,
            _ => {}
        }
    })?;
    Ok(folders)
}
