/*
 * folder.rs
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

//! An open folder: a point-in-time listing plus the scope tracking every
//! body stream fetched through it. Closing the folder expunges flagged
//! messages (delete or mark-read, per configuration) and reclaims any
//! stream the consumer left open.

use std::sync::Arc;

use crate::error::Error;
use crate::protocol::dav::{CachedBodyStream, DavConnection, FolderKind, FolderScope};

use super::message::MailMessage;

pub struct MailFolder {
    connection: Arc<DavConnection>,
    kind: FolderKind,
    scope: FolderScope,
    messages: Vec<MailMessage>,
    open: bool,
}

impl MailFolder {
    pub(crate) fn open(connection: Arc<DavConnection>, kind: FolderKind) -> Result<Self, Error> {
        let messages = connection
            .list_messages(kind)?
            .into_iter()
            .map(MailMessage::new)
            .collect();
        Ok(MailFolder {
            connection,
            kind,
            scope: FolderScope::new(),
            messages,
            open: true,
        })
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[MailMessage] {
        &self.messages
    }

    /// Message by 1-based sequence number.
    pub fn message(&self, sequence: u32) -> Option<&MailMessage> {
        self.messages.get(sequence.checked_sub(1)? as usize)
    }

    pub fn message_mut(&mut self, sequence: u32) -> Option<&mut MailMessage> {
        self.messages.get_mut(sequence.checked_sub(1)? as usize)
    }

    /// Fetch a message body. The returned stream is registered with this
    /// folder and will not outlive it.
    pub fn content(&self, message: &MailMessage) -> Result<CachedBodyStream, Error> {
        if !self.open {
            return Err(Error::state("folder is closed"));
        }
        self.connection.fetch(message.handle(), Some(&self.scope))
    }

    /// Close the folder. With `expunge`, messages flagged deleted are
    /// batch-deleted (or marked read, per configuration) first. Any body
    /// streams still open are force-closed either way.
    pub fn close(&mut self, expunge: bool) -> Result<(), Error> {
        if !self.open {
            return Ok(());
        }
        let result = if expunge {
            let flagged: Vec<_> = self
                .messages
                .iter()
                .filter(|m| m.is_deleted())
                .map(|m| m.handle().clone())
                .collect();
            self.connection.delete_or_mark_read(&flagged)
        } else {
            Ok(())
        };
        self.scope.close_all();
        self.open = false;
        self.messages.clear();
        result
    }
}

impl Drop for MailFolder {
    fn drop(&mut self) {
        self.scope.close_all();
    }
}
