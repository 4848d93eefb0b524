/*
 * mod.rs
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

//! Exchange WebDAV client: sign-on, folder discovery, message listing,
//! fetch, send and batch mutations over XML-over-HTTP.
//!
//! Design:
//! - One `DavConnection` per account; all operations serialize on a single
//!   session mutex so cookie state and folder URIs stay coherent.
//! - Requests are described by `DavRequest` (arbitrary verb, replace/append
//!   header semantics) and executed through the `Transport` trait; the
//!   production transport wraps a blocking `reqwest` client with redirects
//!   disabled and a cookie store enabled.
//! - Request bodies and response parsing use quick_xml exclusively.
//! - Fetched message bodies spill to unlinked-on-close temp files (see
//!   `cache`), never into memory.

mod cache;
mod connection;
mod parse;
mod queries;
mod request;

pub use cache::{CachedBodyStream, FolderScope};
pub use connection::{DavConnection, FolderKind, FolderUris, MessageHandle};
pub use request::{Credentials, DavRequest, DavResponse, HttpTransport, Transport};
