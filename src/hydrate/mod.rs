//! # Hydration Engine
//!
//! Hydration resolves variable tags such as `<[image.tag]>` against a
//! variable mapping. The delimiters are chosen so they never collide with
//! YAML or JSON syntax.
//!
//! ## Process
//!
//! 1. **Split**: the input is split on lines that are exactly `---`. Each
//!    chunk is hydrated on its own and the separator lines are written back
//!    where they were, so leading empty documents survive.
//! 2. **Select a mode**: a chunk that parses as a YAML document gets
//!    YAML-aware substitution; anything else (empty documents, templating
//!    headers, fragments that are not YAML) gets raw interpolation.
//! 3. **Substitute**:
//!    - *Raw interpolation* replaces every tag with the text form of its
//!      value.
//!    - *YAML-aware substitution* visits every scalar. A scalar that is
//!      exactly one tag is replaced by the value encoded as YAML, so numbers
//!      stay numbers and lists stay lists. A scalar mixing a tag with other
//!      text is interpolated and written back as a string in its original
//!      quoting style. Comments and all untouched text stay byte-identical.
//!
//! A tag that does not resolve is always an error.

mod scan;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::path::temp_affixes;
use crate::scratch::write_temp_file;
use crate::variables::lookup;
use scan::{scalar_spans, Span, Style};

/// Opening delimiter of a tag.
pub const TAG_START: &str = "<[";
/// Closing delimiter of a tag.
pub const TAG_END: &str = "]>";

static WHOLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<\[([^<\[\]>]*)\]>$").expect("tag pattern is valid"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\[([^<\[\]>]*)\]>").expect("tag pattern is valid"));

/// The variable path of `text` when it consists of exactly one tag
/// (surrounding whitespace ignored).
pub fn whole_tag(text: &str) -> Option<&str> {
    WHOLE_TAG
        .captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Replace every tag in `text` with the text form of its value.
///
/// Strings are inserted verbatim; other values are inserted as their YAML
/// encoding.
pub fn interpolate(text: &str, vars: &Value) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(TAG_START) {
        out.push_str(&rest[..start]);
        let after = &rest[start + TAG_START.len()..];
        let end = after.find(TAG_END).ok_or_else(|| Error::Hydrate {
            context: snippet(&rest[start..]),
            message: "tag is never closed".to_string(),
        })?;
        out.push_str(&text_form(resolve(&after[..end], vars)?)?);
        rest = &after[end + TAG_END.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Hydrate a (possibly multi-document) YAML stream.
pub fn hydrate(text: &str, vars: &Value) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for document in split_documents(text) {
        if let Some(separator) = document.separator {
            out.push_str(separator);
        }
        out.push_str(&hydrate_document(document.body, vars)?);
    }
    Ok(out)
}

/// Read and hydrate one file.
pub fn hydrate_file(path: &Path, vars: &Value) -> Result<String> {
    let content = fs::read_to_string(path)?;
    hydrate(&content, vars)
}

/// Hydrate every file of `paths` into a fresh temporary copy inside
/// `scratch`, keeping the original stem and extension in the new name.
///
/// Directories are passed through unchanged. The returned list matches
/// `paths` position for position.
pub fn hydrate_files(scratch: &Path, vars: &Value, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|path| {
            if path.is_dir() {
                return Ok(path.clone());
            }
            let content = hydrate_file(path, vars)?;
            let (prefix, suffix) = temp_affixes(path);
            let hydrated = write_temp_file(scratch, &prefix, &suffix, content.as_bytes())?;
            debug!("hydrated {} into {}", path.display(), hydrated.display());
            Ok(hydrated)
        })
        .collect()
}

/// One chunk of a stream split on `---` lines.
#[derive(Debug, PartialEq, Eq)]
struct Document<'a> {
    /// The separator line (with its line ending) preceding the body.
    separator: Option<&'a str>,
    body: &'a str,
}

fn split_documents(text: &str) -> Vec<Document<'_>> {
    let mut documents = Vec::new();
    let mut separator = None;
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == "---" {
            documents.push(Document {
                separator,
                body: &text[start..offset],
            });
            separator = Some(line);
            start = offset + line.len();
        }
        offset += line.len();
    }
    documents.push(Document {
        separator,
        body: &text[start..],
    });
    documents
}

fn hydrate_document(body: &str, vars: &Value) -> Result<String> {
    if !body.contains(TAG_START) {
        return Ok(body.to_string());
    }
    // Unquoted tags inside flow collections only parse with their brackets
    // masked. Masking keeps every byte offset.
    let masked = mask_tags(body);
    match serde_yaml::from_str::<Value>(&masked) {
        Ok(Value::Null) | Err(_) => interpolate(body, vars),
        Ok(_) => substitute_scalars(body, &masked, vars),
    }
}

/// `text` with the delimiters of every tag swapped for `<(` and `)>`.
fn mask_tags(text: &str) -> String {
    ANY_TAG
        .replace_all(text, |captures: &regex::Captures| format!("<({})>", &captures[1]))
        .into_owned()
}

/// Rewrite the tagged scalars of `doc`, locating them in `masked`.
fn substitute_scalars(doc: &str, masked: &str, vars: &Value) -> Result<String> {
    let mut out = String::with_capacity(doc.len());
    let mut last = 0;
    for span in scalar_spans(masked) {
        let raw = &doc[span.start..span.end];
        if !raw.contains(TAG_START) {
            continue;
        }
        out.push_str(&doc[last..span.start]);
        out.push_str(&hydrate_scalar(raw, span, vars)?);
        last = span.end;
    }
    out.push_str(&doc[last..]);
    Ok(out)
}

fn hydrate_scalar(raw: &str, span: Span, vars: &Value) -> Result<String> {
    if span.style == Style::Raw {
        return interpolate(raw, vars);
    }

    let text = unquote(raw, span.style);
    if let Some(tag) = whole_tag(&text) {
        let value = resolve(tag, vars)?;
        return if span.in_flow {
            Ok(flow(value))
        } else {
            encode_node(value)
        };
    }

    let hydrated = interpolate(&text, vars)?;
    Ok(match span.style {
        Style::DoubleQuoted => double_quoted(&hydrated),
        Style::SingleQuoted if !hydrated.contains('\n') => single_quoted(&hydrated),
        Style::SingleQuoted => double_quoted(&hydrated),
        _ if span.in_flow => flow(&Value::String(hydrated)),
        Style::Plain | Style::Folded | Style::Raw => encode_string(&hydrated),
    })
}

fn resolve<'a>(tag: &str, vars: &'a Value) -> Result<&'a Value> {
    lookup(vars, tag).ok_or_else(|| Error::TagNotFound {
        tag: tag.to_string(),
    })
}

/// Text form of a value for raw interpolation.
fn text_form(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(trim_newline(serde_yaml::to_string(other)?)),
    }
}

/// Encode a value so it can stand in for a scalar on a single line.
fn encode_node(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(encode_string(s)),
        Value::Sequence(_) | Value::Mapping(_) => Ok(flow(value)),
        Value::Tagged(tagged) => Ok(format!("{} {}", tagged.tag, encode_node(&tagged.value)?)),
        other => Ok(trim_newline(serde_yaml::to_string(other)?)),
    }
}

/// Single-line YAML encoding of a string: plain when YAML would read it
/// back as the same string, double quoted otherwise.
fn encode_string(s: &str) -> String {
    match serde_yaml::to_string(s) {
        Ok(encoded) => {
            let encoded = trim_newline(encoded);
            if encoded.contains('\n') || encoded.starts_with(['|', '>']) {
                double_quoted(s)
            } else {
                encoded
            }
        }
        Err(_) => double_quoted(s),
    }
}

/// Flow-style encoding of a value.
fn flow(value: &Value) -> String {
    match value {
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(flow).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", flow(k), flow(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::String(s) => {
            let plain_safe = !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
            if plain_safe && encode_string(s) == *s {
                s.clone()
            } else {
                double_quoted(s)
            }
        }
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, flow(&tagged.value)),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    }
}

fn unquote(raw: &str, style: Style) -> String {
    match style {
        Style::SingleQuoted => raw[1..raw.len() - 1].replace("''", "'"),
        Style::DoubleQuoted => unescape(&raw[1..raw.len() - 1]),
        Style::Folded => fold_lines(raw),
        Style::Plain | Style::Raw => raw.to_string(),
    }
}

/// Value of a multi-line plain scalar: lines are trimmed and joined with a
/// space, each empty line stands for a line break.
fn fold_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            out.push('\n');
            pending_space = false;
            continue;
        }
        if pending_space {
            out.push(' ');
        }
        out.push_str(line);
        pending_space = true;
    }
    out
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some(' ') => out.push(' '),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn trim_newline(mut s: String) -> String {
    while s.ends_with('\n') {
        s.pop();
    }
    s
}

fn snippet(text: &str) -> String {
    let end = text
        .char_indices()
        .nth(40)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{:?}", &text[..end])
}
