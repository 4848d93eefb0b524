/*
 * message.rs
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

//! One listed message. Holds its server handle and a deleted flag; the
//! flag takes effect when the folder is closed with expunge.

use crate::protocol::dav::MessageHandle;

#[derive(Debug, Clone)]
pub struct MailMessage {
    handle: MessageHandle,
    deleted: bool,
}

impl MailMessage {
    pub(crate) fn new(handle: MessageHandle) -> Self {
        MailMessage {
            handle,
            deleted: false,
        }
    }

    /// 1-based position in the listing that produced this message.
    pub fn sequence(&self) -> u32 {
        self.handle.sequence
    }

    pub fn url(&self) -> &str {
        &self.handle.url
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    pub(crate) fn handle(&self) -> &MessageHandle {
        &self.handle
    }
}
