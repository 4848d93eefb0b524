/*
 * connection.rs
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

//! Session engine: sign-on, folder discovery and the mailbox operations.
//!
//! One `DavConnection` serializes everything on a single mutex; at most one
//! network operation is in flight per connection. Session state is
//! all-or-nothing: a connection is connected exactly when every discovered
//! folder URI is present, and any failure during connect tears the state
//! back down to empty.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use rand::RngCore;

use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::escape::escape;

use super::cache::{CachedBodyStream, FolderScope};
use super::parse::{extract_folders, extract_hrefs};
use super::queries::{
    batch_delete_body, bcc_patch_body, folder_discovery_body, mark_read_body, search_body,
    FilterSpec,
};
use super::request::{DavRequest, DavResponse, HttpTransport, Transport};

const SIGN_ON_URI: &str = "/exchweb/bin/auth/owaauth.dll";
const XML_CONTENT_TYPE: &str = "text/xml; charset=\"UTF-8\"";
const MESSAGE_CONTENT_TYPE: &str = "message/rfc822";
const FORM_URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Logical folder names exposed to callers. Unrecognized names fall back
/// to the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Inbox,
    SentItems,
    Outbox,
    Drafts,
}

impl FolderKind {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("SENT ITEMS") {
            FolderKind::SentItems
        } else if name.eq_ignore_ascii_case("OUTBOX") {
            FolderKind::Outbox
        } else if name.eq_ignore_ascii_case("DRAFT") {
            FolderKind::Drafts
        } else {
            FolderKind::Inbox
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FolderKind::Inbox => "INBOX",
            FolderKind::SentItems => "SENT ITEMS",
            FolderKind::Outbox => "OUTBOX",
            FolderKind::Drafts => "DRAFT",
        }
    }
}

/// The five folder URIs a successful discovery yields.
#[derive(Debug, Clone)]
pub struct FolderUris {
    pub inbox: String,
    pub drafts: String,
    /// Mail submission URI; moving a draft here sends it.
    pub submission_uri: String,
    pub sentitems: String,
    pub outbox: String,
}

impl FolderUris {
    fn uri(&self, kind: FolderKind) -> &str {
        match kind {
            FolderKind::Inbox => &self.inbox,
            FolderKind::SentItems => &self.sentitems,
            FolderKind::Outbox => &self.outbox,
            FolderKind::Drafts => &self.drafts,
        }
    }
}

/// One listed message: its server URL and its 1-based position in the
/// listing. Superseded by the next listing; not cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub url: String,
    pub sequence: u32,
}

impl MessageHandle {
    /// File name relative to the containing folder, as batch mutation
    /// targets want it.
    pub fn file_name(&self) -> &str {
        match self.url.rfind('/') {
            Some(index) => &self.url[index + 1..],
            None => &self.url,
        }
    }
}

#[derive(Default)]
struct SessionState {
    folders: Option<FolderUris>,
    transport: Option<Arc<dyn Transport>>,
}

type TransportFactory =
    Box<dyn Fn(&ConnectionConfig) -> Result<Arc<dyn Transport>, Error> + Send + Sync>;

/// A connection to one mailbox.
pub struct DavConnection {
    config: ConnectionConfig,
    state: Mutex<SessionState>,
    transport_factory: TransportFactory,
}

impl DavConnection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport_factory(config, Box::new(HttpTransport::new))
    }

    /// Build with a custom transport, bypassing the HTTP client. Used by
    /// tests to script responses.
    pub fn with_transport_factory(config: ConnectionConfig, factory: TransportFactory) -> Self {
        DavConnection {
            config,
            state: Mutex::new(SessionState::default()),
            transport_factory: factory,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sign on and discover folders. Fails with [`Error::State`] when
    /// already connected; any other failure leaves the connection
    /// disconnected with no partial state.
    pub fn connect(&self) -> Result<(), Error> {
        let mut state = self.lock_state()?;
        if state.folders.is_some() {
            return Err(Error::state("already connected"));
        }
        state.folders = None;
        match self.do_connect(&mut state) {
            Ok(folders) => {
                state.folders = Some(folders);
                Ok(())
            }
            Err(e) => {
                *state = SessionState::default();
                Err(e)
            }
        }
    }

    pub fn disconnect(&self) -> Result<(), Error> {
        let mut state = self.lock_state()?;
        *state = SessionState::default();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.folders.is_some())
            .unwrap_or(false)
    }

    /// List messages in a folder, applying the configured filters and
    /// limit. Sequence numbers are assigned by response position, 1-based.
    pub fn list_messages(&self, folder: FolderKind) -> Result<Vec<MessageHandle>, Error> {
        let state = self.lock_state()?;
        let (folders, transport) = Self::require_connected(&state)?;
        let folder_uri = folders.uri(folder).to_string();
        let mut request = DavRequest::new("SEARCH", &folder_uri);
        request.set_header("Content-Type", XML_CONTENT_TYPE);
        if let Some(limit) = self.config.limit {
            request.set_header("Range", &format!("rows=0-{}", limit));
        }
        request.set_header("Brief", "t");
        request.body(search_body(&FilterSpec::from_config(&self.config))?);
        let response = self.execute(&transport, &request)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to obtain {}: {}",
                folder_uri, response.status
            )));
        }
        let body = response.read_body()?;
        let handles = extract_hrefs(body.as_slice())?
            .into_iter()
            .enumerate()
            .map(|(index, url)| MessageHandle {
                url,
                sequence: index as u32 + 1,
            })
            .collect();
        Ok(handles)
    }

    /// Fetch a message body into a temp-file-backed stream. The `Translate`
    /// header asks the server for the raw message, not a rendering.
    pub fn fetch(
        &self,
        handle: &MessageHandle,
        scope: Option<&FolderScope>,
    ) -> Result<CachedBodyStream, Error> {
        let state = self.lock_state()?;
        let (_, transport) = Self::require_connected(&state)?;
        let mut request = DavRequest::new("GET", &escape(&handle.url));
        request.set_header("Translate", "F");
        let response = self.execute(&transport, &request)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to obtain message: {}",
                response.status
            )));
        }
        CachedBodyStream::spill(response.body, scope)
    }

    /// Send a message: store it under a random draft name, patch BCC
    /// recipients onto it when present, then move it to the submission URI.
    /// No compensation on failure; a partially-sent draft stays where the
    /// failing step left it.
    pub fn send(&self, message: &[u8], bcc: &[String]) -> Result<(), Error> {
        let state = self.lock_state()?;
        let (folders, transport) = Self::require_connected(&state)?;
        let mut path = folders.drafts.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        let name = generate_message_name();
        path.push_str(&escape(&format!("{}.eml", name)));

        let mut put = DavRequest::new("PUT", &path);
        put.set_header("Content-Type", MESSAGE_CONTENT_TYPE);
        put.body(message.to_vec());
        let response = self.execute(&transport, &put)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to post message to draft folder: {}",
                response.status
            )));
        }

        if !bcc.is_empty() {
            let mut patch = DavRequest::new("PROPPATCH", &path);
            patch.set_header("Content-Type", XML_CONTENT_TYPE);
            patch.add_header("Depth", "0");
            patch.add_header("Translate", "f");
            patch.add_header("Brief", "t");
            patch.body(bcc_patch_body(bcc)?);
            let response = self.execute(&transport, &patch)?;
            if !response.is_success() {
                return Err(Error::protocol(format!(
                    "unable to add BCC recipients: {}",
                    response.status
                )));
            }
        }

        let mut destination = folders.submission_uri.clone();
        if !destination.ends_with('/') {
            destination.push('/');
        }
        let mut mv = DavRequest::new("MOVE", &path);
        mv.set_header("Destination", &destination);
        let response = self.execute(&transport, &mv)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to move message to outbox: {}",
                response.status
            )));
        }
        Ok(())
    }

    /// Batch-delete messages, or mark them read when the connection is
    /// configured not to delete. Operates on the inbox.
    pub fn delete_or_mark_read(&self, handles: &[MessageHandle]) -> Result<(), Error> {
        if handles.is_empty() {
            return Ok(());
        }
        let state = self.lock_state()?;
        let (folders, transport) = Self::require_connected(&state)?;
        let mut path = folders.inbox.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        let files: Vec<String> = handles
            .iter()
            .map(|handle| handle.file_name().to_string())
            .collect();
        let (method, body, what) = if self.config.delete {
            ("BDELETE", batch_delete_body(&files)?, "delete messages")
        } else {
            ("BPROPPATCH", mark_read_body(&files)?, "mark messages read")
        };
        let mut request = DavRequest::new(method, &path);
        request.set_header("Content-Type", XML_CONTENT_TYPE);
        request.add_header("If-Match", "*");
        request.add_header("Brief", "t");
        request.body(body);
        let response = self.execute(&transport, &request)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to {}: {}",
                what, response.status
            )));
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, Error> {
        self.state
            .lock()
            .map_err(|_| Error::state("connection lock poisoned"))
    }

    fn require_connected(
        state: &SessionState,
    ) -> Result<(FolderUris, Arc<dyn Transport>), Error> {
        match (&state.folders, &state.transport) {
            (Some(folders), Some(transport)) => Ok((folders.clone(), Arc::clone(transport))),
            _ => Err(Error::state("not connected")),
        }
    }

    fn transport(&self, state: &mut SessionState) -> Result<Arc<dyn Transport>, Error> {
        if let Some(transport) = &state.transport {
            return Ok(Arc::clone(transport));
        }
        let transport = (self.transport_factory)(&self.config)?;
        state.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    fn execute(
        &self,
        transport: &Arc<dyn Transport>,
        request: &DavRequest,
    ) -> Result<DavResponse, Error> {
        debug!("{} {}", request.method, request.url);
        let response = transport.execute(request)?;
        debug!("{} {} -> {}", request.method, request.url, response.status);
        Ok(response)
    }

    /// Sign-on plus discovery. Runs with the session lock held.
    fn do_connect(&self, state: &mut SessionState) -> Result<FolderUris, Error> {
        let transport = self.transport(state)?;
        self.sign_on(&transport)?;
        self.discover_folders(&transport)
    }

    /// Probe with an unauthenticated OPTIONS first; only fall back to the
    /// form-based sign-on endpoint when the probe is rejected.
    fn sign_on(&self, transport: &Arc<dyn Transport>) -> Result<(), Error> {
        let probe_url = format!("{}/exchange", self.config.server);
        let probe = DavRequest::new("OPTIONS", &probe_url);
        let response = self.execute(transport, &probe)?;
        if response.status < 400 {
            return Ok(());
        }
        let mut request = DavRequest::new("POST", &format!("{}{}", self.config.server, SIGN_ON_URI));
        request.set_header("Content-Type", FORM_URLENCODED_CONTENT_TYPE);
        request.body(sign_on_form(
            &probe_url,
            &self.config.username,
            &self.config.password,
        ));
        let response = self.execute(transport, &request)?;
        if response.status >= 400 {
            return Err(Error::auth(format!("sign-on failed: {}", response.status)));
        }
        Ok(())
    }

    /// Depth-0 PROPFIND for the five well-known folder properties. All
    /// five must be present; anything less is a discovery failure.
    fn discover_folders(&self, transport: &Arc<dyn Transport>) -> Result<FolderUris, Error> {
        let url = format!("{}/exchange/{}", self.config.server, self.config.mailbox);
        let mut request = DavRequest::new("PROPFIND", &url);
        request.set_header("Content-Type", XML_CONTENT_TYPE);
        request.set_header("Depth", "0");
        request.set_header("Brief", "t");
        request.body(folder_discovery_body()?);
        let response = self.execute(transport, &request)?;
        if !response.is_success() {
            return Err(Error::protocol(format!(
                "unable to obtain inbox: {}",
                response.status
            )));
        }
        let body = response.read_body()?;
        let discovered = extract_folders(body.as_slice())?;
        let missing = || Error::protocol("incomplete folder discovery response");
        Ok(FolderUris {
            inbox: discovered.inbox.ok_or_else(missing)?,
            drafts: discovered.drafts.ok_or_else(missing)?,
            submission_uri: discovered.sendmsg.ok_or_else(missing)?,
            sentitems: discovered.sentitems.ok_or_else(missing)?,
            outbox: discovered.outbox.ok_or_else(missing)?,
        })
    }
}

fn sign_on_form(destination: &str, username: &str, password: &str) -> Vec<u8> {
    format!(
        "destination={}&flags=0&username={}&password={}",
        urlencoding::encode(destination),
        urlencoding::encode(username),
        urlencoding::encode(password),
    )
    .into_bytes()
}

/// Random draft name: 200 random bits rendered in base 36. Collision
/// resistance is probabilistic, which is enough for a mailbox-scoped
/// namespace.
fn generate_message_name() -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bytes = [0u8; 25];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut value = bytes.to_vec();
    let mut digits = Vec::new();
    while value.iter().any(|b| *b != 0) {
        let mut rem: u32 = 0;
        for b in value.iter_mut() {
            let acc = (rem << 8) | u32::from(*b);
            *b = (acc / 36) as u8;
            rem = acc % 36;
        }
        digits.push(DIGITS[rem as usize]);
    }
    if digits.is_empty() {
        digits.push(b'0');
    }
    digits.reverse();
    digits.iter().map(|b| *b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Scripted transport: pops canned (status, body) responses in order
    /// and records every request.
    struct StubTransport {
        requests: StdMutex<Vec<DavRequest>>,
        responses: StdMutex<Vec<(u16, &'static str)>>,
    }

    impl StubTransport {
        fn new(mut responses: Vec<(u16, &'static str)>) -> Arc<Self> {
            responses.reverse();
            Arc::new(StubTransport {
                requests: StdMutex::new(Vec::new()),
                responses: StdMutex::new(responses),
            })
        }

        fn recorded(&self) -> Vec<DavRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: &DavRequest) -> Result<DavResponse, Error> {
            self.requests.lock().unwrap().push(request.clone());
            let (status, body) = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or((500, "unscripted"));
            Ok(DavResponse {
                status,
                body: Box::new(body.as_bytes()),
            })
        }
    }

    const DISCOVERY_OK: &str = r#"<?xml version="1.0"?>
<a:multistatus xmlns:a="DAV:" xmlns:d="urn:schemas:httpmail:">
 <a:response><a:propstat><a:prop>
  <d:inbox>http://h/exchange/jdoe/Inbox</d:inbox>
  <d:drafts>http://h/exchange/jdoe/Drafts</d:drafts>
  <d:sendmsg>http://h/exchange/jdoe/##DavMailSubmissionURI##</d:sendmsg>
  <d:outbox>http://h/exchange/jdoe/Outbox</d:outbox>
  <d:sentitems>http://h/exchange/jdoe/Sent Items</d:sentitems>
 </a:prop></a:propstat></a:response>
</a:multistatus>"#;

    const DISCOVERY_NO_DRAFTS: &str = r#"<?xml version="1.0"?>
<a:multistatus xmlns:a="DAV:" xmlns:d="urn:schemas:httpmail:">
 <a:response><a:propstat><a:prop>
  <d:inbox>http://h/exchange/jdoe/Inbox</d:inbox>
  <d:sendmsg>http://h/exchange/jdoe/##DavMailSubmissionURI##</d:sendmsg>
  <d:outbox>http://h/exchange/jdoe/Outbox</d:outbox>
  <d:sentitems>http://h/exchange/jdoe/Sent Items</d:sentitems>
 </a:prop></a:propstat></a:response>
</a:multistatus>"#;

    const LISTING: &str = r#"<?xml version="1.0"?>
<a:multistatus xmlns:a="DAV:">
 <a:response><a:href>http://h/exchange/jdoe/Inbox/one.EML</a:href></a:response>
 <a:response><a:href>http://h/exchange/jdoe/Inbox/two.EML</a:href></a:response>
</a:multistatus>"#;

    fn config() -> ConnectionConfig {
        ConnectionConfig::resolve(crate::config::Settings {
            host: Some("h".into()),
            username: Some("jdoe".into()),
            password: Some("pw".into()),
            mailbox: Some("jdoe".into()),
            ..crate::config::Settings::default()
        })
        .unwrap()
    }

    fn stubbed(
        config: ConnectionConfig,
        stub: &Arc<StubTransport>,
    ) -> DavConnection {
        let stub = Arc::clone(stub);
        DavConnection::with_transport_factory(
            config,
            Box::new(move |_| Ok(Arc::clone(&stub) as Arc<dyn Transport>)),
        )
    }

    fn connected(responses: Vec<(u16, &'static str)>) -> (DavConnection, Arc<StubTransport>) {
        connected_with(config(), responses)
    }

    fn connected_with(
        config: ConnectionConfig,
        mut responses: Vec<(u16, &'static str)>,
    ) -> (DavConnection, Arc<StubTransport>) {
        let mut scripted = vec![(200, ""), (207, DISCOVERY_OK)];
        scripted.append(&mut responses);
        let stub = StubTransport::new(scripted);
        let connection = stubbed(config, &stub);
        connection.connect().unwrap();
        (connection, stub)
    }

    #[test]
    fn operations_before_connect_fail_with_state_error() {
        let stub = StubTransport::new(vec![]);
        let connection = stubbed(config(), &stub);
        assert!(matches!(
            connection.list_messages(FolderKind::Inbox),
            Err(Error::State(_))
        ));
        assert!(matches!(
            connection.send(b"Subject: x\r\n\r\n", &[]),
            Err(Error::State(_))
        ));
        assert!(stub.recorded().is_empty());
    }

    #[test]
    fn successful_probe_skips_sign_on_post() {
        let (connection, stub) = connected(vec![]);
        assert!(connection.is_connected());
        let requests = stub.recorded();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "OPTIONS");
        assert_eq!(requests[0].url, "http://h/exchange");
        assert_eq!(requests[1].method, "PROPFIND");
        assert_eq!(requests[1].url, "http://h/exchange/jdoe");
        assert_eq!(requests[1].header("Depth"), Some("0"));
        assert_eq!(requests[1].header("Brief"), Some("t"));
    }

    #[test]
    fn rejected_probe_falls_back_to_form_sign_on() {
        let stub = StubTransport::new(vec![(401, ""), (200, ""), (207, DISCOVERY_OK)]);
        let connection = stubbed(config(), &stub);
        connection.connect().unwrap();
        let requests = stub.recorded();
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].url, "http://h/exchweb/bin/auth/owaauth.dll");
        let body = String::from_utf8(requests[1].body.clone().unwrap()).unwrap();
        assert!(body.contains("destination=http%3A%2F%2Fh%2Fexchange"));
        assert!(body.contains("&flags=0&"));
        assert!(body.contains("username=jdoe"));
        assert!(body.contains("password=pw"));
    }

    #[test]
    fn failed_sign_on_is_auth_error_and_leaves_no_state() {
        let stub = StubTransport::new(vec![(401, ""), (403, "")]);
        let connection = stubbed(config(), &stub);
        assert!(matches!(connection.connect(), Err(Error::Auth(_))));
        assert!(!connection.is_connected());
    }

    #[test]
    fn incomplete_discovery_is_fatal() {
        let stub = StubTransport::new(vec![(200, ""), (207, DISCOVERY_NO_DRAFTS)]);
        let connection = stubbed(config(), &stub);
        assert!(matches!(connection.connect(), Err(Error::Protocol(_))));
        assert!(!connection.is_connected());
    }

    #[test]
    fn connect_while_connected_is_state_error() {
        let (connection, _stub) = connected(vec![]);
        assert!(matches!(connection.connect(), Err(Error::State(_))));
        // the failed second connect must not tear down the session
        assert!(connection.is_connected());
    }

    #[test]
    fn listing_assigns_one_based_sequence_numbers() {
        let (connection, stub) = connected(vec![(207, LISTING)]);
        let handles = connection.list_messages(FolderKind::Inbox).unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].sequence, 1);
        assert_eq!(handles[0].url, "http://h/exchange/jdoe/Inbox/one.EML");
        assert_eq!(handles[1].sequence, 2);
        let search = &stub.recorded()[2];
        assert_eq!(search.method, "SEARCH");
        assert_eq!(search.url, "http://h/exchange/jdoe/Inbox");
        assert_eq!(search.header("Brief"), Some("t"));
        assert_eq!(search.header("Range"), None);
    }

    #[test]
    fn listing_limit_becomes_range_header() {
        let mut config = config();
        config.limit = Some(50);
        let (connection, stub) = connected_with(config, vec![(207, LISTING)]);
        connection.list_messages(FolderKind::Inbox).unwrap();
        assert_eq!(stub.recorded()[2].header("Range"), Some("rows=0-50"));
    }

    #[test]
    fn listing_selects_folder_uri_by_kind() {
        let (connection, stub) = connected(vec![(207, LISTING)]);
        connection.list_messages(FolderKind::SentItems).unwrap();
        // the discovered URI is used verbatim; only fetch escapes
        assert_eq!(stub.recorded()[2].url, "http://h/exchange/jdoe/Sent Items");
    }

    #[test]
    fn fetch_escapes_url_and_sets_translate() {
        let (connection, stub) = connected(vec![(200, "raw message")]);
        let handle = MessageHandle {
            url: "http://h/exchange/jdoe/Inbox/a b.EML".into(),
            sequence: 1,
        };
        let mut stream = connection.fetch(&handle, None).unwrap();
        let mut body = String::new();
        std::io::Read::read_to_string(&mut stream, &mut body).unwrap();
        assert_eq!(body, "raw message");
        let get = &stub.recorded()[2];
        assert_eq!(get.method, "GET");
        assert_eq!(get.url, "http://h/exchange/jdoe/Inbox/a%20b.EML");
        assert_eq!(get.header("Translate"), Some("F"));
    }

    #[test]
    fn failed_fetch_is_protocol_error_and_spills_nothing() {
        let (connection, _stub) = connected(vec![(404, "")]);
        let handle = MessageHandle {
            url: "http://h/exchange/jdoe/Inbox/gone.EML".into(),
            sequence: 1,
        };
        let scope = FolderScope::new();
        assert!(matches!(
            connection.fetch(&handle, Some(&scope)),
            Err(Error::Protocol(_))
        ));
        // the error path must not leave a temp-file stream behind
        assert_eq!(scope.registered_count(), 0);
    }

    #[test]
    fn send_without_bcc_is_put_then_move() {
        let (connection, stub) = connected(vec![(201, ""), (201, "")]);
        connection.send(b"Subject: hi\r\n\r\nbody", &[]).unwrap();
        let requests = stub.recorded();
        assert_eq!(requests.len(), 4);
        let put = &requests[2];
        assert_eq!(put.method, "PUT");
        assert!(put.url.starts_with("http://h/exchange/jdoe/Drafts/"));
        assert!(put.url.ends_with(".eml"));
        assert_eq!(put.header("Content-Type"), Some("message/rfc822"));
        let mv = &requests[3];
        assert_eq!(mv.method, "MOVE");
        assert_eq!(mv.url, put.url);
        assert_eq!(
            mv.header("Destination"),
            Some("http://h/exchange/jdoe/##DavMailSubmissionURI##/")
        );
    }

    #[test]
    fn send_with_bcc_patches_between_put_and_move() {
        let (connection, stub) = connected(vec![(201, ""), (207, ""), (201, "")]);
        connection
            .send(
                b"Subject: hi\r\n\r\nbody",
                &["a@x.com".to_string(), "b@y.com".to_string()],
            )
            .unwrap();
        let requests = stub.recorded();
        let methods: Vec<&str> = requests[2..].iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["PUT", "PROPPATCH", "MOVE"]);
        let patch = &requests[3];
        assert_eq!(patch.header("Depth"), Some("0"));
        assert_eq!(patch.header("Translate"), Some("f"));
        assert_eq!(patch.header("Brief"), Some("t"));
        let body = String::from_utf8(patch.body.clone().unwrap()).unwrap();
        assert!(body.contains("a@x.com;b@y.com"));
    }

    #[test]
    fn failed_put_aborts_send_without_move() {
        let (connection, stub) = connected(vec![(507, "")]);
        assert!(matches!(
            connection.send(b"Subject: hi\r\n\r\n", &[]),
            Err(Error::Protocol(_))
        ));
        assert_eq!(stub.recorded().len(), 3);
    }

    #[test]
    fn delete_issues_bdelete_on_inbox() {
        let mut config = config();
        config.delete = true;
        let (connection, stub) = connected_with(config, vec![(207, "")]);
        let handles = vec![MessageHandle {
            url: "http://h/exchange/jdoe/Inbox/one.EML".into(),
            sequence: 1,
        }];
        connection.delete_or_mark_read(&handles).unwrap();
        let request = &stub.recorded()[2];
        assert_eq!(request.method, "BDELETE");
        assert_eq!(request.url, "http://h/exchange/jdoe/Inbox/");
        assert_eq!(request.header("If-Match"), Some("*"));
        let body = String::from_utf8(request.body.clone().unwrap()).unwrap();
        assert!(body.contains("<href>one.EML</href>"));
    }

    #[test]
    fn mark_read_issues_bproppatch_when_delete_disabled() {
        let (connection, stub) = connected(vec![(207, "")]);
        let handles = vec![MessageHandle {
            url: "http://h/exchange/jdoe/Inbox/one.EML".into(),
            sequence: 1,
        }];
        connection.delete_or_mark_read(&handles).unwrap();
        let request = &stub.recorded()[2];
        assert_eq!(request.method, "BPROPPATCH");
        let body = String::from_utf8(request.body.clone().unwrap()).unwrap();
        assert!(body.contains("<h:read>1</h:read>"));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let (connection, stub) = connected(vec![]);
        connection.delete_or_mark_read(&[]).unwrap();
        assert_eq!(stub.recorded().len(), 2);
    }

    #[test]
    fn disconnect_clears_state() {
        let (connection, _stub) = connected(vec![]);
        connection.disconnect().unwrap();
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.list_messages(FolderKind::Inbox),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn folder_kind_names_round_trip_and_default_to_inbox() {
        assert_eq!(FolderKind::from_name("inbox"), FolderKind::Inbox);
        assert_eq!(FolderKind::from_name("Sent Items"), FolderKind::SentItems);
        assert_eq!(FolderKind::from_name("outbox"), FolderKind::Outbox);
        assert_eq!(FolderKind::from_name("draft"), FolderKind::Drafts);
        assert_eq!(FolderKind::from_name("Junk"), FolderKind::Inbox);
    }

    #[test]
    fn message_names_are_base36_and_bounded() {
        for _ in 0..32 {
            let name = generate_message_name();
            assert!(!name.is_empty());
            assert!(name.len() <= 39);
            assert!(name
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }
}
