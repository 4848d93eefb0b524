/*
 * queries.rs
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

//! Request-body construction: SQL filter templating and the XML bodies for
//! discovery, search, batch delete, mark-read and BCC patching.
//!
//! The two fixed search bodies (all messages, unread only) are built once
//! and cached for the life of the process. The custom-filter body depends
//! on call-time filter values and is rebuilt per call. Placeholder order in
//! the template is fixed; the property namespaces in the WHERE clauses are
//! the ones the server indexes and must not be normalized.

use std::sync::OnceLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use crate::config::ConnectionConfig;
use crate::error::Error;

pub const DAV_NAMESPACE: &str = "DAV:";
pub const HTTPMAIL_NAMESPACE: &str = "urn:schemas:httpmail:";
pub const MAILHEADER_NAMESPACE: &str = "urn:schemas:mailheader:";

const BOOKMARK_FILTER_UNREADED: &str = "{BOOKMARK_FILTER_UNREADED}";
const BOOKMARK_FILTER_LAST_CHECK: &str = "{BOOKMARK_FILTER_LAST_CHECK}";
const BOOKMARK_FILTER_FROM: &str = "{BOOKMARK_FILTER_FROM}";
const BOOKMARK_FILTER_NOT_FROM: &str = "{BOOKMARK_FILTER_NOT_FROM}";
const BOOKMARK_FILTER_TO: &str = "{BOOKMARK_FILTER_TO}";

const UNREAD_MESSAGES_SQL: &str = concat!(
    "SELECT \"DAV:uid\" FROM SCOPE('SHALLOW TRAVERSAL OF \"\"') ",
    "WHERE \"DAV:ishidden\" = False AND \"DAV:isfolder\" = False ",
    "AND \"urn:schemas:httpmail:read\" = False"
);

const ALL_MESSAGES_SQL: &str = concat!(
    "SELECT \"DAV:uid\" FROM SCOPE('SHALLOW TRAVERSAL OF \"\"') ",
    "WHERE \"DAV:ishidden\" = False AND \"DAV:isfolder\" = False"
);

const FILTERED_MESSAGES_SQL: &str = concat!(
    "SELECT \"DAV:uid\" FROM SCOPE('SHALLOW TRAVERSAL OF \"\"') ",
    "WHERE \"DAV:ishidden\" = False AND \"DAV:isfolder\" = False ",
    "{BOOKMARK_FILTER_UNREADED} {BOOKMARK_FILTER_LAST_CHECK} ",
    "{BOOKMARK_FILTER_FROM} {BOOKMARK_FILTER_NOT_FROM} {BOOKMARK_FILTER_TO}"
);

/// Call-time filter values for the parameterized search template.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub unfiltered: bool,
    pub last_check: String,
    pub from: String,
    pub not_from: String,
    pub to: String,
}

impl FilterSpec {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        FilterSpec {
            unfiltered: config.unfiltered,
            last_check: config.filter_last_check.clone(),
            from: config.filter_from.clone(),
            not_from: config.filter_not_from.clone(),
            to: config.filter_to.clone(),
        }
    }

    pub fn is_custom(&self) -> bool {
        !self.last_check.is_empty()
            || !self.from.is_empty()
            || !self.not_from.is_empty()
            || !self.to.is_empty()
    }

    /// Substitute the five placeholders of the parameterized template.
    /// Each becomes a literal clause or an empty string; the unread clause
    /// follows `unfiltered` independently of the other four.
    fn custom_sql(&self) -> String {
        let mut sql = FILTERED_MESSAGES_SQL.to_string();
        let unread = if self.unfiltered {
            String::new()
        } else {
            "AND \"urn:schemas:httpmail:read\" = False".to_string()
        };
        sql = sql.replace(BOOKMARK_FILTER_UNREADED, &unread);
        let last_check = if self.last_check.is_empty() {
            String::new()
        } else {
            format!(
                "AND \"urn:schemas:httpmail:datereceived\" > CAST(\"{}\" as 'dateTime')",
                self.last_check
            )
        };
        sql = sql.replace(BOOKMARK_FILTER_LAST_CHECK, &last_check);
        let from = if self.from.is_empty() {
            String::new()
        } else {
            format!("AND \"urn:schemas:httpmail:fromemail\" LIKE '%{}%'", self.from)
        };
        sql = sql.replace(BOOKMARK_FILTER_FROM, &from);
        let not_from = self
            .not_from
            .split(';')
            .filter(|part| !part.is_empty())
            .map(|part| format!("AND \"urn:schemas:httpmail:fromemail\" NOT LIKE '%{}%'", part))
            .collect::<Vec<_>>()
            .join("");
        sql = sql.replace(BOOKMARK_FILTER_NOT_FROM, &not_from);
        let to = if self.to.is_empty() {
            String::new()
        } else {
            format!("AND \"urn:schemas:httpmail:to\" LIKE '%{}%'", self.to)
        };
        sql.replace(BOOKMARK_FILTER_TO, &to)
    }
}

/// Search body for the given filters. The two fixed bodies are cached
/// process-wide; a custom filter always rebuilds.
pub fn search_body(filter: &FilterSpec) -> Result<Vec<u8>, Error> {
    if filter.is_custom() {
        return build_search_body(&filter.custom_sql());
    }
    if filter.unfiltered {
        static ALL: OnceLock<Vec<u8>> = OnceLock::new();
        if let Some(body) = ALL.get() {
            return Ok(body.clone());
        }
        let body = build_search_body(ALL_MESSAGES_SQL)?;
        Ok(ALL.get_or_init(|| body).clone())
    } else {
        static UNREAD: OnceLock<Vec<u8>> = OnceLock::new();
        if let Some(body) = UNREAD.get() {
            return Ok(body.clone());
        }
        let body = build_search_body(UNREAD_MESSAGES_SQL)?;
        Ok(UNREAD.get_or_init(|| body).clone())
    }
}

/// `<searchrequest><sql>...</sql></searchrequest>`, DAV namespace.
fn build_search_body(sql: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("searchrequest");
    root.push_attribute(("xmlns", DAV_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("sql")))?;
    writer.write_event(Event::Text(BytesText::new(sql)))?;
    writer.write_event(Event::End(BytesEnd::new("sql")))?;
    writer.write_event(Event::End(BytesEnd::new("searchrequest")))?;
    Ok(out)
}

/// Depth-0 PROPFIND body asking for the five well-known folder properties.
/// Built once per process.
pub fn folder_discovery_body() -> Result<Vec<u8>, Error> {
    static BODY: OnceLock<Vec<u8>> = OnceLock::new();
    if let Some(body) = BODY.get() {
        return Ok(body.clone());
    }
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("propfind");
    root.push_attribute(("xmlns", DAV_NAMESPACE));
    root.push_attribute(("xmlns:h", HTTPMAIL_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("prop")))?;
    for name in ["h:inbox", "h:drafts", "h:sendmsg", "h:outbox", "h:sentitems"] {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("prop")))?;
    writer.write_event(Event::End(BytesEnd::new("propfind")))?;
    Ok(BODY.get_or_init(|| out).clone())
}

/// `<delete><target><href>file</href>...</target></delete>`. Targets are
/// file names relative to the folder the request is issued against.
pub fn batch_delete_body(files: &[String]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("delete");
    root.push_attribute(("xmlns", DAV_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("target")))?;
    for file in files {
        writer.write_event(Event::Start(BytesStart::new("href")))?;
        writer.write_event(Event::Text(BytesText::new(file)))?;
        writer.write_event(Event::End(BytesEnd::new("href")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("target")))?;
    writer.write_event(Event::End(BytesEnd::new("delete")))?;
    Ok(out)
}

/// Batched propertyupdate setting `read = 1` on every target file.
pub fn mark_read_body(files: &[String]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("propertyupdate");
    root.push_attribute(("xmlns", DAV_NAMESPACE));
    root.push_attribute(("xmlns:h", HTTPMAIL_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("target")))?;
    for file in files {
        writer.write_event(Event::Start(BytesStart::new("href")))?;
        writer.write_event(Event::Text(BytesText::new(file)))?;
        writer.write_event(Event::End(BytesEnd::new("href")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("target")))?;
    writer.write_event(Event::Start(BytesStart::new("set")))?;
    writer.write_event(Event::Start(BytesStart::new("prop")))?;
    writer.write_event(Event::Start(BytesStart::new("h:read")))?;
    writer.write_event(Event::Text(BytesText::new("1")))?;
    writer.write_event(Event::End(BytesEnd::new("h:read")))?;
    writer.write_event(Event::End(BytesEnd::new("prop")))?;
    writer.write_event(Event::End(BytesEnd::new("set")))?;
    writer.write_event(Event::End(BytesEnd::new("propertyupdate")))?;
    Ok(out)
}

/// Propertyupdate setting the `bcc` mail header on a stored draft to a
/// `;`-joined recipient list.
pub fn bcc_patch_body(recipients: &[String]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("propertyupdate");
    root.push_attribute(("xmlns", DAV_NAMESPACE));
    root.push_attribute(("xmlns:m", MAILHEADER_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("set")))?;
    writer.write_event(Event::Start(BytesStart::new("prop")))?;
    writer.write_event(Event::Start(BytesStart::new("m:bcc")))?;
    writer.write_event(Event::Text(BytesText::new(&recipients.join(";"))))?;
    writer.write_event(Event::End(BytesEnd::new("m:bcc")))?;
    writer.write_event(Event::End(BytesEnd::new("prop")))?;
    writer.write_event(Event::End(BytesEnd::new("set")))?;
    writer.write_event(Event::End(BytesEnd::new("propertyupdate")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resolves the character entities the writer produced for the quotes
    // inside SQL text content.
    fn body_text(body: &[u8]) -> String {
        let raw = String::from_utf8(body.to_vec()).unwrap();
        quick_xml::escape::unescape(&raw).unwrap().into_owned()
    }

    #[test]
    fn fixed_bodies_select_by_unfiltered() {
        let unread = search_body(&FilterSpec::default()).unwrap();
        assert!(body_text(&unread).contains("\"urn:schemas:httpmail:read\" = False"));
        let all = search_body(&FilterSpec {
            unfiltered: true,
            ..FilterSpec::default()
        })
        .unwrap();
        assert!(!body_text(&all).contains("httpmail:read"));
    }

    #[test]
    fn fixed_bodies_have_no_placeholders() {
        for unfiltered in [false, true] {
            let body = search_body(&FilterSpec {
                unfiltered,
                ..FilterSpec::default()
            })
            .unwrap();
            assert!(!body_text(&body).contains("BOOKMARK"));
        }
    }

    #[test]
    fn custom_filter_substitutes_all_placeholders() {
        let filter = FilterSpec {
            unfiltered: false,
            last_check: "2010-08-04T00:00:00Z".into(),
            from: "@corp.com".into(),
            not_from: String::new(),
            to: "me@corp.com".into(),
        };
        let text = body_text(&search_body(&filter).unwrap());
        assert!(!text.contains("BOOKMARK"));
        assert!(text.contains("> CAST(\"2010-08-04T00:00:00Z\" as 'dateTime')"));
        assert!(text.contains("\"urn:schemas:httpmail:fromemail\" LIKE '%@corp.com%'"));
        assert!(text.contains("\"urn:schemas:httpmail:to\" LIKE '%me@corp.com%'"));
        assert!(text.contains("\"urn:schemas:httpmail:read\" = False"));
    }

    #[test]
    fn not_from_splits_on_semicolons() {
        let filter = FilterSpec {
            not_from: "spam.com;junk.org".into(),
            ..FilterSpec::default()
        };
        let text = body_text(&search_body(&filter).unwrap());
        assert_eq!(text.matches("NOT LIKE '%spam.com%'").count(), 1);
        assert_eq!(text.matches("NOT LIKE '%junk.org%'").count(), 1);
        assert_eq!(text.matches("NOT LIKE").count(), 2);
    }

    #[test]
    fn unread_clause_applies_in_custom_mode() {
        let filter = FilterSpec {
            unfiltered: true,
            from: "@corp.com".into(),
            ..FilterSpec::default()
        };
        let text = body_text(&search_body(&filter).unwrap());
        assert!(!text.contains("httpmail:read"));
    }

    #[test]
    fn discovery_body_names_all_five_folders() {
        let text = body_text(&folder_discovery_body().unwrap());
        for prop in ["h:inbox", "h:drafts", "h:sendmsg", "h:outbox", "h:sentitems"] {
            assert!(text.contains(prop), "missing {}", prop);
        }
        assert!(text.contains(HTTPMAIL_NAMESPACE));
    }

    #[test]
    fn delete_body_lists_targets_in_order() {
        let files = vec!["a.EML".to_string(), "b.EML".to_string()];
        let text = body_text(&batch_delete_body(&files).unwrap());
        let a = text.find("<href>a.EML</href>").unwrap();
        let b = text.find("<href>b.EML</href>").unwrap();
        assert!(a < b);
        assert!(text.contains("<delete"));
    }

    #[test]
    fn mark_read_body_sets_read_flag() {
        let files = vec!["a.EML".to_string()];
        let text = body_text(&mark_read_body(&files).unwrap());
        assert!(text.contains("<h:read>1</h:read>"));
        assert!(text.contains("<href>a.EML</href>"));
    }

    #[test]
    fn bcc_body_joins_recipients_with_semicolons() {
        let recipients = vec!["a@x.com".to_string(), "b@y.com".to_string()];
        let text = body_text(&bcc_patch_body(&recipients).unwrap());
        assert!(text.contains("<m:bcc>a@x.com;b@y.com</m:bcc>"));
        assert!(text.contains(MAILHEADER_NAMESPACE));
    }
}
