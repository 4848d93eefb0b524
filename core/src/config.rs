/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino.
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

//! Connection configuration: layered settings resolved once at connect time.
//!
//! Two layers feed the final `ConnectionConfig`: explicit `Settings` fields,
//! then inline mailbox-suffix options embedded in the username
//! (`user:mailbox[unfiltered=true,limit=50,...]`). Suffix options always win.
//! Numeric and address fields arrive as strings and are validated here;
//! nothing downstream re-parses configuration.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::Error;

const HTTP_PORT: u16 = 80;
const HTTPS_PORT: u16 = 443;

/// Raw, optional connection settings as supplied by the caller (CLI, config
/// file, host application). String-typed where the source is string-typed.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Server host name, or a full `http(s)://host[:port]` URL. A URL's
    /// scheme and port override `ssl` and `port`.
    pub host: Option<String>,
    /// Account user, optionally `domain\user`, optionally followed by
    /// `:mailbox[option=value,...]`.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Mailbox address (e.g. `my.mailbox@example.com`). A mailbox embedded
    /// in the username takes precedence.
    pub mailbox: Option<String>,
    pub ssl: bool,
    pub port: Option<u16>,
    /// Socket read timeout in milliseconds.
    pub timeout: Option<String>,
    /// Connect timeout in milliseconds.
    pub connection_timeout: Option<String>,
    /// Local address to bind to, useful on a multi-homed host.
    pub local_address: Option<String>,
    /// Cap on the number of messages a listing returns.
    pub limit: Option<String>,
    /// `true` lists all messages; `false` lists unread only.
    pub unfiltered: bool,
    /// `true` really deletes; `false` marks read instead.
    pub delete: bool,
    pub filter_last_check: Option<String>,
    pub filter_from: Option<String>,
    pub filter_not_from: Option<String>,
    pub filter_to: Option<String>,
}

/// Immutable connection configuration, derived once from `Settings` and
/// never modified afterwards.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `scheme://host[:port]`, default port elided.
    pub server: String,
    pub mailbox: String,
    pub username: String,
    pub password: String,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub local_address: Option<IpAddr>,
    pub unfiltered: bool,
    pub delete: bool,
    pub limit: Option<u32>,
    /// ISO 8601 timestamp; empty means unset.
    pub filter_last_check: String,
    pub filter_from: String,
    /// May hold several `;`-separated fragments.
    pub filter_not_from: String,
    pub filter_to: String,
}

impl ConnectionConfig {
    /// Resolve layered `Settings` into a final configuration.
    ///
    /// Fails with [`Error::Config`] when host, username, password, or
    /// mailbox is missing, or when a numeric or address field does not
    /// parse.
    pub fn resolve(settings: Settings) -> Result<Self, Error> {
        let host = settings
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config("host, username, and password must be specified"))?;
        let mut username = settings
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::config("host, username, and password must be specified"))?;
        let password = settings
            .password
            .ok_or_else(|| Error::config("host, username, and password must be specified"))?;

        let mut unfiltered = settings.unfiltered;
        let mut delete = settings.delete;
        let mut limit = parse_limit(settings.limit.as_deref())?;
        let mut filter_last_check = settings.filter_last_check.unwrap_or_default();
        let mut filter_from = settings.filter_from.unwrap_or_default();
        let mut filter_not_from = settings.filter_not_from.unwrap_or_default();
        let mut filter_to = settings.filter_to.unwrap_or_default();
        let mut mailbox = settings.mailbox.filter(|m| !m.is_empty());

        // A username of the form `user:mailbox[opt=v,...]` carries its own
        // mailbox and option overrides; those always win.
        if let Some(index) = username.find(':') {
            let mut suffix = username[index + 1..].to_string();
            username.truncate(index);
            if let Some(open) = suffix.find('[') {
                let close = suffix
                    .find(']')
                    .ok_or_else(|| Error::config("unable to parse mailbox options: missing ']'"))?;
                let options = suffix[open + 1..close].to_string();
                suffix.truncate(open);
                for (key, value) in parse_options(&options) {
                    match key.as_str() {
                        "unfiltered" => unfiltered = value.eq_ignore_ascii_case("true"),
                        "delete" => delete = value.eq_ignore_ascii_case("true"),
                        "limit" => limit = parse_limit(Some(&value))?,
                        "filterLastCheck" => filter_last_check = value,
                        "filterFrom" => filter_from = value,
                        "filterNotFrom" => filter_not_from = value,
                        "filterTo" => filter_to = value,
                        _ => {}
                    }
                }
            }
            mailbox = Some(suffix);
        }

        let mailbox = mailbox.ok_or_else(|| Error::config("no mailbox specified"))?;

        let mut secure = settings.ssl;
        let mut port = settings.port;
        let host = match split_url(&host) {
            Some((url_secure, url_host, url_port)) => {
                secure = url_secure;
                if url_port.is_some() {
                    port = url_port;
                }
                url_host
            }
            None => host,
        };
        let default_port = if secure { HTTPS_PORT } else { HTTP_PORT };
        let port = port.unwrap_or(default_port);
        let mut server = format!("{}://{}", if secure { "https" } else { "http" }, host);
        if port != default_port {
            server.push_str(&format!(":{}", port));
        }

        let timeout = parse_millis(settings.timeout.as_deref(), "timeout")?;
        let connect_timeout =
            parse_millis(settings.connection_timeout.as_deref(), "connection timeout")?;
        let local_address = match settings.local_address.as_deref() {
            Some(s) if !s.is_empty() => Some(
                s.parse::<IpAddr>()
                    .map_err(|_| Error::config(format!("invalid local address specified: {}", s)))?,
            ),
            _ => None,
        };

        Ok(ConnectionConfig {
            server,
            mailbox,
            username,
            password,
            timeout,
            connect_timeout,
            local_address,
            unfiltered,
            delete,
            limit,
            filter_last_check,
            filter_from,
            filter_not_from,
            filter_to,
        })
    }

    /// True when any of the four filter strings is set, selecting the
    /// parameterized search query instead of a static one.
    pub fn has_custom_filter(&self) -> bool {
        !self.filter_last_check.is_empty()
            || !self.filter_from.is_empty()
            || !self.filter_not_from.is_empty()
            || !self.filter_to.is_empty()
    }
}

/// Split `http(s)://host[:port][/...]` into (secure, host, port). Returns
/// `None` for a bare host name; anything after the authority is dropped.
fn split_url(host: &str) -> Option<(bool, String, Option<u16>)> {
    let (secure, rest) = if let Some(rest) = strip_scheme(host, "https://") {
        (true, rest)
    } else if let Some(rest) = strip_scheme(host, "http://") {
        (false, rest)
    } else {
        return None;
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((name, port)) => {
            let port = port.parse::<u16>().ok()?;
            Some((secure, name.to_string(), Some(port)))
        }
        None => Some((secure, authority.to_string(), None)),
    }
}

fn strip_scheme<'a>(host: &'a str, scheme: &str) -> Option<&'a str> {
    if host.len() >= scheme.len() && host[..scheme.len()].eq_ignore_ascii_case(scheme) {
        Some(&host[scheme.len()..])
    } else {
        None
    }
}

/// Mailbox-suffix options: `key=value` pairs separated by `,` or `;`.
/// Entries without `=` yield an empty value.
fn parse_options(options: &str) -> Vec<(String, String)> {
    options
        .split([',', ';'])
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (pair.trim().to_string(), String::new()),
        })
        .collect()
}

fn parse_limit(limit: Option<&str>) -> Result<Option<u32>, Error> {
    match limit {
        Some(s) if !s.is_empty() => {
            let value = s
                .parse::<i64>()
                .map_err(|_| Error::config(format!("invalid limit specified: {}", s)))?;
            Ok(u32::try_from(value).ok().filter(|v| *v > 0))
        }
        _ => Ok(None),
    }
}

fn parse_millis(value: Option<&str>, what: &str) -> Result<Option<Duration>, Error> {
    match value {
        Some(s) if !s.is_empty() => {
            let ms = s
                .parse::<u64>()
                .map_err(|_| Error::config(format!("invalid {} value: {}", what, s)))?;
            Ok((ms > 0).then(|| Duration::from_millis(ms)))
        }
        _ => Ok(None),
    }
}
