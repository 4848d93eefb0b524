/*
 * cache.rs
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

//! Temp-file-backed message body streams.
//!
//! A fetched body is spilled to a temp file and handed out as a
//! [`CachedBodyStream`]. The backing file is deleted exactly once: on
//! explicit [`close`](CachedBodyStream::close), on drop, or when the
//! owning [`FolderScope`] is torn down. Deletion failures are swallowed;
//! after close the stream only returns errors. The scope holds weak
//! references only, so a stream dropped by its consumer does not linger in
//! the scope.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, Weak};

use tempfile::NamedTempFile;

use crate::error::Error;

struct Shared {
    // None once closed; NamedTempFile deletes on drop.
    file: Mutex<Option<NamedTempFile>>,
}

impl Shared {
    fn close(&self) {
        // Taking the file out drops it, which unlinks the temp path.
        // A second close finds None and does nothing.
        if let Ok(mut guard) = self.file.lock() {
            guard.take();
        }
    }
}

/// Seekable stream over a fetched message body.
pub struct CachedBodyStream {
    shared: Arc<Shared>,
}

impl CachedBodyStream {
    /// Spill `source` to a fresh temp file and wrap it. Registers with
    /// `scope` when one is supplied.
    pub fn spill(
        mut source: impl Read,
        scope: Option<&FolderScope>,
    ) -> Result<Self, Error> {
        let mut file = NamedTempFile::new()?;
        io::copy(&mut source, file.as_file_mut())?;
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        let shared = Arc::new(Shared {
            file: Mutex::new(Some(file)),
        });
        if let Some(scope) = scope {
            scope.register(&shared);
        }
        Ok(CachedBodyStream { shared })
    }

    /// Delete the backing file. Best-effort: a deletion failure is
    /// swallowed, and a second close is a no-op.
    pub fn close(&self) {
        self.shared.close();
    }

    fn with_file<T>(
        &self,
        op: impl FnOnce(&mut File) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut guard = self
            .shared
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "stream lock poisoned"))?;
        match guard.as_mut() {
            Some(file) => op(file.as_file_mut()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "stream is closed",
            )),
        }
    }
}

impl Read for CachedBodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_file(|file| file.read(buf))
    }
}

impl Seek for CachedBodyStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.with_file(|file| file.seek(pos))
    }
}

impl Drop for CachedBodyStream {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Tracks the body streams handed out for one folder so that closing the
/// folder reclaims every temp file, even for streams the consumer forgot
/// to close.
#[derive(Default)]
pub struct FolderScope {
    streams: Mutex<Vec<Weak<Shared>>>,
}

impl FolderScope {
    pub fn new() -> Self {
        FolderScope::default()
    }

    fn register(&self, shared: &Arc<Shared>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.retain(|weak| weak.upgrade().is_some());
            streams.push(Arc::downgrade(shared));
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_count(&self) -> usize {
        self.streams.lock().map(|streams| streams.len()).unwrap_or(0)
    }

    /// Force-close every registered stream still alive.
    pub fn close_all(&self) {
        if let Ok(mut streams) = self.streams.lock() {
            for weak in streams.drain(..) {
                if let Some(shared) = weak.upgrade() {
                    shared.close();
                }
            }
        }
    }
}

impl Drop for FolderScope {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spilled_body_reads_back() {
        let mut stream = CachedBodyStream::spill(&b"hello body"[..], None).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello body");
    }

    #[test]
    fn stream_is_seekable() {
        let mut stream = CachedBodyStream::spill(&b"0123456789"[..], None).unwrap();
        stream.seek(SeekFrom::Start(5)).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "56789");
    }

    #[test]
    fn close_deletes_file_and_is_idempotent() {
        let stream = CachedBodyStream::spill(&b"x"[..], None).unwrap();
        let path = {
            let guard = stream.shared.file.lock().unwrap();
            guard.as_ref().unwrap().path().to_path_buf()
        };
        assert!(path.exists());
        stream.close();
        assert!(!path.exists());
        stream.close();
    }

    #[test]
    fn drop_without_close_deletes_file() {
        let stream = CachedBodyStream::spill(&b"x"[..], None).unwrap();
        let path = {
            let guard = stream.shared.file.lock().unwrap();
            guard.as_ref().unwrap().path().to_path_buf()
        };
        assert!(path.exists());
        drop(stream);
        assert!(!path.exists());
    }

    #[test]
    fn read_after_close_fails() {
        let mut stream = CachedBodyStream::spill(&b"x"[..], None).unwrap();
        stream.close();
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).is_err());
    }

    #[test]
    fn scope_teardown_closes_registered_streams() {
        let scope = FolderScope::new();
        let mut stream = CachedBodyStream::spill(&b"x"[..], Some(&scope)).unwrap();
        scope.close_all();
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).is_err());
    }

    #[test]
    fn dropped_streams_do_not_linger_in_scope() {
        let scope = FolderScope::new();
        {
            let _stream = CachedBodyStream::spill(&b"x"[..], Some(&scope)).unwrap();
        }
        let _second = CachedBodyStream::spill(&b"y"[..], Some(&scope)).unwrap();
        let streams = scope.streams.lock().unwrap();
        assert_eq!(streams.len(), 1);
    }
}
