// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Turn raw command output into a navigable XML tree.
//!
//! qstat/qhost output is not always well-formed: job and user names may carry
//! arbitrary bytes, stray `&` characters and, for array jobs, `JATASK:<n>`
//! element names. Everything recoverable is repaired here so that only a
//! completely broken document becomes an error.

use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node};

use super::command::GridCommand;
use crate::error::{GridError, Result};

/// Placeholder element name for array job task entries
pub const TASK_PLACEHOLDER: &str = "jatask";

static TASK_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Decode bytes as UTF-8, reading each invalid byte as Latin-1
pub fn transcode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        out.extend(chunk.invalid().iter().map(|&b| char::from(b)));
    }
    out
}

/// Collapse `JATASK:<task id>` element names into a fixed placeholder
pub fn normalize_task_ids(text: &str) -> String {
    let re = TASK_ID_RE.get_or_init(|| Regex::new(r"JATASK:[^>]*").expect("static regex"));
    re.replace_all(text, TASK_PLACEHOLDER).into_owned()
}

/// Characters allowed by the XML 1.0 `Char` production
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Whether `rest` (the text after an `&`) starts with a reference the parser accepts
fn valid_reference(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let name = &rest[..end];
    match name {
        "amp" | "lt" | "gt" | "quot" | "apos" => true,
        _ => {
            // from_str_radix and parse both accept a sign, XML does not
            let code = if let Some(hex) = name.strip_prefix("#x") {
                all_digits(hex, |c| c.is_ascii_hexdigit())
                    .then(|| u32::from_str_radix(hex, 16).ok())
                    .flatten()
            } else if let Some(dec) = name.strip_prefix('#') {
                all_digits(dec, |c| c.is_ascii_digit())
                    .then(|| dec.parse::<u32>().ok())
                    .flatten()
            } else {
                None
            };
            code.and_then(char::from_u32).is_some_and(is_xml_char)
        }
    }
}

fn all_digits(s: &str, is_digit: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(is_digit)
}

/// Escape stray `&` and drop characters XML forbids. Returns the repaired
/// text and the number of repairs made.
pub fn repair(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut repairs = 0;

    for (i, c) in text.char_indices() {
        if c == '&' {
            if valid_reference(&text[i + 1..]) {
                out.push('&');
            } else {
                out.push_str("&amp;");
                repairs += 1;
            }
        } else if is_xml_char(c) {
            out.push(c);
        } else {
            repairs += 1;
        }
    }

    (out, repairs)
}

/// Turn raw command output into text the XML parser accepts
pub fn prepare(command: GridCommand, raw: &[u8]) -> String {
    let mut text = transcode(raw);
    if command == GridCommand::JobListing {
        text = normalize_task_ids(&text);
    }
    let (text, repairs) = repair(&text);
    if repairs > 0 {
        tracing::debug!(command = command.name(), repairs, "repaired malformed XML");
    }
    text
}

/// Parse prepared text. Only a total failure is an error.
pub fn parse(command: GridCommand, text: &str) -> Result<Document<'_>> {
    Document::parse(text).map_err(|source| GridError::Parse {
        command: command.name().to_string(),
        source,
    })
}

/// First child element with the given name
pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// All child elements with the given name
pub fn children<'a, 'i>(node: Node<'a, 'i>, name: &'static str) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// Follow a chain of first-matching child elements
pub fn path<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    names.iter().try_fold(node, |current, name| child(current, name))
}

/// Text of the named child element, empty if the element has no text
pub fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).map(|n| n.text().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_valid_utf8() {
        assert_eq!(transcode("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_transcode_latin1_bytes() {
        // "caf\xe9" is Latin-1 for "café"
        assert_eq!(transcode(b"caf\xe9 ok"), "café ok");
        assert_eq!(transcode(b"\xff\xfe"), "ÿþ");
    }

    #[test]
    fn test_normalize_task_ids() {
        let text = "<JB_ja_tasks><JATASK:  1><JAT_status>128</JAT_status></JATASK:  1></JB_ja_tasks>";
        assert_eq!(
            normalize_task_ids(text),
            "<JB_ja_tasks><jatask><JAT_status>128</JAT_status></jatask></JB_ja_tasks>"
        );
    }

    #[test]
    fn test_repair_stray_ampersand() {
        let (text, repairs) = repair("<a>R&D &amp; more &#65; &#x42; &bogus;</a>");
        assert_eq!(text, "<a>R&amp;D &amp; more &#65; &#x42; &amp;bogus;</a>");
        assert_eq!(repairs, 2);
    }

    #[test]
    fn test_repair_control_chars() {
        let (text, repairs) = repair("<a>x\u{1}y\tz\u{FFFF}</a>");
        assert_eq!(text, "<a>xy\tz</a>");
        assert_eq!(repairs, 2);
    }

    #[test]
    fn test_repair_invalid_char_reference() {
        let (text, repairs) = repair("<a>&#1;</a>");
        assert_eq!(text, "<a>&amp;#1;</a>");
        assert_eq!(repairs, 1);
    }

    #[test]
    fn test_repair_signed_char_reference() {
        let (text, repairs) = repair("<a>&#+65; &#x+41; &#-1; &#; &#x;</a>");
        assert_eq!(
            text,
            "<a>&amp;#+65; &amp;#x+41; &amp;#-1; &amp;#; &amp;#x;</a>"
        );
        assert_eq!(repairs, 5);
    }

    #[test]
    fn test_signed_reference_in_job_name_still_parses() {
        let raw = b"<qhost><host name='n1'><job name='7'>\
            <jobvalue name='job_name'>x&#+65;y</jobvalue>\
            </job></host></qhost>";
        let text = prepare(GridCommand::HostListing, raw);
        let doc = parse(GridCommand::HostListing, &text).unwrap();

        let value = path(doc.root_element(), &["host", "job", "jobvalue"]).unwrap();
        assert_eq!(value.text(), Some("x&#+65;y"));
    }

    #[test]
    fn test_prepare_then_parse_broken_job_listing() {
        let raw = b"<detailed_job_info><djob_info><element>\
            <JB_job_name>R&D caf\xe9</JB_job_name>\
            <JB_ja_tasks><JATASK:12><x/></JATASK:12></JB_ja_tasks>\
            </element></djob_info></detailed_job_info>";
        let text = prepare(GridCommand::JobListing, raw);
        let doc = parse(GridCommand::JobListing, &text).unwrap();

        let element = path(doc.root_element(), &["djob_info", "element"]).unwrap();
        assert_eq!(child_text(element, "JB_job_name"), Some("R&D café"));
        assert!(path(element, &["JB_ja_tasks", "jatask", "x"]).is_some());
    }

    #[test]
    fn test_parse_total_failure() {
        let err = parse(GridCommand::HostListing, "this is not xml").unwrap_err();
        assert!(matches!(err, GridError::Parse { .. }));
        assert!(err.to_string().contains("qhost"));
    }

    #[test]
    fn test_tree_helpers() {
        let doc = Document::parse("<r><a>1</a><b/><a>2</a><c><d>deep</d></c></r>").unwrap();
        let root = doc.root_element();

        let texts: Vec<&str> = children(root, "a").filter_map(|n| n.text()).collect();
        assert_eq!(texts, vec!["1", "2"]);
        assert_eq!(child_text(root, "b"), Some(""));
        assert_eq!(child_text(root, "missing"), None);
        assert_eq!(path(root, &["c", "d"]).and_then(|n| n.text()), Some("deep"));
        assert!(path(root, &["c", "x"]).is_none());
    }
}
