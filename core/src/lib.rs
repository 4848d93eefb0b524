/*
 * lib.rs
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

//! Core engine for the Postino mail client.
//!
//! Speaks the Exchange WebDAV ("httpmail") XML-over-HTTP mail interface:
//! form or domain-credential sign-on, folder discovery via PROPFIND, SEARCH
//! listing with SQL-like filters, GET body fetch with on-disk caching, the
//! PUT/PROPPATCH/MOVE send pipeline, and batched BDELETE/BPROPPATCH
//! mutations. All I/O is synchronous and blocking; one mutex per connection
//! serializes every operation.

pub mod config;
pub mod error;
pub mod escape;
pub mod protocol;
pub mod store;

pub use config::{ConnectionConfig, Settings};
pub use error::Error;
pub use protocol::dav::{
    CachedBodyStream, DavConnection, FolderKind, FolderScope, MessageHandle,
};
pub use store::{MailFolder, MailMessage, MailStore};
