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

//! Mailbox objects over a WebDAV connection: `MailStore` owns the
//! connection, `MailFolder` a listing plus the temp-file scope for fetched
//! bodies, `MailMessage` one listed message. Everything is synchronous and
//! serializes on the connection's session lock.

mod folder;
mod message;
mod store;

pub use folder::MailFolder;
pub use message::MailMessage;
pub use store::MailStore;
