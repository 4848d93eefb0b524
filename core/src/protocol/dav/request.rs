/*
 * request.rs
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

//! Request description and transport seam.
//!
//! WebDAV needs verbs (`PROPFIND`, `SEARCH`, `BPROPPATCH`, ...) that plain
//! HTTP clients do not name, so a request is described verb-as-string and
//! executed through the [`Transport`] trait. Production uses
//! [`HttpTransport`] over a blocking `reqwest` client; tests substitute a
//! recording stub.

use std::io::Read;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;

use crate::config::ConnectionConfig;
use crate::error::Error;

/// Account credentials. A username of the form `domain\user` selects the
/// domain variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Plain { username: String, password: String },
    Domain { domain: String, username: String, password: String },
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        match username.split_once('\\') {
            Some((domain, user)) if !domain.is_empty() => Credentials::Domain {
                domain: domain.to_string(),
                username: user.to_string(),
                password: password.to_string(),
            },
            _ => Credentials::Plain {
                username: username.to_string(),
                password: password.to_string(),
            },
        }
    }

    /// User part as sent on the wire. The domain variant keeps the
    /// `domain\user` form; servers that insist on real NTLM will reject
    /// Basic credentials in this shape, which surfaces as an auth failure.
    pub fn wire_username(&self) -> String {
        match self {
            Credentials::Plain { username, .. } => username.clone(),
            Credentials::Domain { domain, username, .. } => {
                format!("{}\\{}", domain, username)
            }
        }
    }

    pub fn password(&self) -> &str {
        match self {
            Credentials::Plain { password, .. } => password,
            Credentials::Domain { password, .. } => password,
        }
    }
}

/// A single WebDAV request: arbitrary verb, absolute URL, headers with
/// replace (`set_header`) or append (`add_header`) semantics, optional body.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: String,
    pub url: String,
    set_headers: Vec<(String, String)>,
    add_headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl DavRequest {
    pub fn new(method: &str, url: &str) -> Self {
        DavRequest {
            method: method.to_string(),
            url: url.to_string(),
            set_headers: Vec::new(),
            add_headers: Vec::new(),
            body: None,
        }
    }

    /// Replace any existing header of the same name (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.set_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.set_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Append without replacing.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.add_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = Some(body);
        self
    }

    /// Headers in application order: replacements first, then appends.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.set_headers
            .iter()
            .chain(self.add_headers.iter())
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Status line and body of an executed request. The body is a live stream;
/// callers decide whether to drain, spill, or drop it.
pub struct DavResponse {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

impl DavResponse {
    pub fn is_success(&self) -> bool {
        self.status < 300
    }

    /// Drain the body into memory. Only used for the small XML responses.
    pub fn read_body(mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Executes [`DavRequest`]s. `Send + Sync` so one transport can be shared
/// behind the session mutex.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &DavRequest) -> Result<DavResponse, Error>;
}

/// Production transport: blocking `reqwest` client with redirects disabled
/// (3xx must surface to the protocol layer) and a cookie store for the
/// form-based sign-on session.
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Arc<dyn Transport>, Error> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .cookie_store(true)
            .timeout(config.timeout)
            .local_address(config.local_address);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::transport(format!("building HTTP client: {}", e)))?;
        let credentials = Credentials::new(&config.username, &config.password);
        Ok(Arc::new(HttpTransport { client, credentials }))
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &DavRequest) -> Result<DavResponse, Error> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::protocol(format!("invalid method: {}", request.method)))?;
        let mut headers = HeaderMap::new();
        for (name, value) in request.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::protocol(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::protocol(format!("invalid header value for {}", name)))?;
            headers.append(name, value);
        }
        let mut builder = self
            .client
            .request(method, request.url.as_str())
            .headers(headers)
            .basic_auth(self.credentials.wire_username(), Some(self.credentials.password()));
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let response = builder.send()?;
        Ok(DavResponse {
            status: response.status().as_u16(),
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut request = DavRequest::new("SEARCH", "http://h/exchange/m");
        request.set_header("Content-Type", "text/plain");
        request.set_header("content-type", "text/xml");
        let values: Vec<_> = request
            .headers()
            .filter(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(values, vec![("content-type", "text/xml")]);
    }

    #[test]
    fn add_header_appends() {
        let mut request = DavRequest::new("PROPFIND", "http://h/exchange/m");
        request.set_header("Brief", "t");
        request.add_header("Brief", "t");
        let count = request
            .headers()
            .filter(|(n, _)| n.eq_ignore_ascii_case("brief"))
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn domain_credentials_from_backslash() {
        let creds = Credentials::new(r"CORP\jdoe", "pw");
        assert_eq!(creds.wire_username(), r"CORP\jdoe");
        assert!(matches!(creds, Credentials::Domain { .. }));
        let creds = Credentials::new("jdoe", "pw");
        assert!(matches!(creds, Credentials::Plain { .. }));
    }
}
