//! Scalar span scanner
//!
//! Finds the byte range of every scalar in a YAML document without building
//! a tree, so substitution can rewrite scalars in place and leave comments,
//! indentation, key order and quoting of everything else untouched.
//!
//! The scanner is line based. It understands block mappings and sequences,
//! flow collections (also across lines), quoted scalars, anchors, tags,
//! aliases, comments and block scalars (`|`, `>`). Lines of a block scalar
//! and the interior of quoted scalars spanning several lines are reported as
//! [`Style::Raw`] and only ever get plain text interpolation. A plain scalar
//! continuing on more indented lines is reported once, as [`Style::Folded`],
//! covering all of its lines.
//!
//! The input is expected to be valid YAML; callers check that before
//! scanning. Tags must be masked first, since their brackets would read as
//! flow indicators inside a flow collection.

/// How a scalar is written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Style {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// Text that is part of a larger scalar (block scalar line, multi-line
    /// quoted interior).
    Raw,
    /// Plain scalar spread over several lines; its value is the lines
    /// folded into one.
    Folded,
}

/// A scalar located at `start..end` in the scanned document. Quoted spans
/// include their quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
    pub style: Style,
    /// Inside a flow collection, where `,[]{}` end a plain scalar.
    pub in_flow: bool,
}

/// Locate every scalar of `doc`, in document order.
pub(crate) fn scalar_spans(doc: &str) -> Vec<Span> {
    let mut scanner = Scanner::default();
    let mut offset = 0;
    for line in doc.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        scanner.line(offset, body);
        offset += line.len();
    }
    scanner.spans
}

#[derive(Default)]
struct Scanner {
    spans: Vec<Span>,
    /// Nesting depth of the flow collection currently open.
    flow_depth: usize,
    /// Minimum indentation of the lines of an open block scalar.
    block_min: Option<usize>,
    /// Quote character of a quoted scalar continuing on the next line.
    open_quote: Option<u8>,
    /// Minimum indentation of the continuation lines of the last plain
    /// scalar, while it may still continue.
    open_plain: Option<usize>,
}

impl Scanner {
    fn line(&mut self, offset: usize, body: &str) {
        let bytes = body.as_bytes();
        let indent = indentation(bytes);

        if let Some(min) = self.block_min {
            if indent == bytes.len() {
                return;
            }
            if indent >= min {
                self.push(offset + indent, offset + bytes.len(), Style::Raw);
                return;
            }
            self.block_min = None;
        }

        if let Some(min) = self.open_plain {
            if indent == bytes.len() {
                return;
            }
            if indent >= min && bytes[indent] != b'#' {
                let end = plain_end(bytes, indent, false);
                if let Some(last) = self.spans.last_mut() {
                    last.end = offset + end;
                    last.style = Style::Folded;
                }
                if skip_spaces(bytes, end) < bytes.len() {
                    self.open_plain = None;
                }
                return;
            }
            self.open_plain = None;
        }

        let mut pos = indent;
        if let Some(quote) = self.open_quote {
            let Some(close) = closing_quote(bytes, pos, quote) else {
                if pos < bytes.len() {
                    self.push(offset + pos, offset + bytes.len(), Style::Raw);
                }
                return;
            };
            if close > pos {
                self.push(offset + pos, offset + close, Style::Raw);
            }
            self.open_quote = None;
            pos = close + 1;
            if self.flow_depth == 0 {
                return;
            }
        }

        if self.flow_depth > 0 {
            self.flow(offset, bytes, pos);
            return;
        }

        if pos >= bytes.len() || bytes[pos] == b'#' || is_marker_line(bytes) {
            return;
        }

        // Sequence entries and explicit key/value indicators.
        let mut parent = indent;
        while pos < bytes.len() && matches!(bytes[pos], b'-' | b'?' | b':') && is_blank(bytes, pos + 1) {
            parent = pos;
            pos = skip_spaces(bytes, pos + 1);
        }

        self.node(offset, bytes, pos, parent, true);
    }

    /// Scan a block-context node starting at `pos`. `parent` is the column
    /// a block scalar's content must exceed.
    fn node(&mut self, offset: usize, bytes: &[u8], pos: usize, parent: usize, allow_key: bool) {
        let pos = skip_properties(bytes, pos);
        if pos >= bytes.len() || is_comment(bytes, pos) {
            return;
        }

        match bytes[pos] {
            b'[' | b'{' => self.flow(offset, bytes, pos),
            b'|' | b'>' => self.block_min = Some(parent + 1),
            b'*' => {}
            quote @ (b'"' | b'\'') => {
                let Some(close) = closing_quote(bytes, pos + 1, quote) else {
                    self.open_quote = Some(quote);
                    if pos + 1 < bytes.len() {
                        self.push(offset + pos + 1, offset + bytes.len(), Style::Raw);
                    }
                    return;
                };
                let style = if quote == b'"' {
                    Style::DoubleQuoted
                } else {
                    Style::SingleQuoted
                };
                self.push(offset + pos, offset + close + 1, style);
                if allow_key {
                    self.after_key_candidate(offset, bytes, pos, close + 1);
                }
            }
            _ => {
                let end = plain_end(bytes, pos, false);
                self.push(offset + pos, offset + end, Style::Plain);
                if allow_key && self.after_key_candidate(offset, bytes, pos, end) {
                    return;
                }
                // A value may continue on the following lines unless a
                // comment closes it. A bare scalar continues at its own
                // indentation, a value after `key:` or `-` deeper than that.
                if skip_spaces(bytes, end) >= bytes.len() {
                    self.open_plain = Some(if pos == parent { parent } else { parent + 1 });
                }
            }
        }
    }

    /// If the scalar at `start..end` is a mapping key, scan its value and
    /// return true.
    fn after_key_candidate(&mut self, offset: usize, bytes: &[u8], start: usize, end: usize) -> bool {
        let next = skip_spaces(bytes, end);
        if next < bytes.len() && bytes[next] == b':' && is_blank(bytes, next + 1) {
            let value = skip_spaces(bytes, next + 1);
            self.node(offset, bytes, value, start, false);
            return true;
        }
        false
    }

    fn flow(&mut self, offset: usize, bytes: &[u8], mut pos: usize) {
        while pos < bytes.len() {
            match bytes[pos] {
                b'[' | b'{' => {
                    self.flow_depth += 1;
                    pos += 1;
                }
                b']' | b'}' => {
                    self.flow_depth = self.flow_depth.saturating_sub(1);
                    pos += 1;
                    if self.flow_depth == 0 {
                        return;
                    }
                }
                b',' | b' ' | b'\t' => pos += 1,
                b'#' if is_comment(bytes, pos) => return,
                b':' | b'?' | b'-' if is_flow_blank(bytes, pos + 1) => pos += 1,
                b'&' | b'!' | b'*' => pos = token_end(bytes, pos),
                quote @ (b'"' | b'\'') => {
                    let Some(close) = closing_quote(bytes, pos + 1, quote) else {
                        self.open_quote = Some(quote);
                        if pos + 1 < bytes.len() {
                            self.push(offset + pos + 1, offset + bytes.len(), Style::Raw);
                        }
                        return;
                    };
                    let style = if quote == b'"' {
                        Style::DoubleQuoted
                    } else {
                        Style::SingleQuoted
                    };
                    self.push(offset + pos, offset + close + 1, style);
                    pos = close + 1;
                }
                _ => {
                    let end = plain_end(bytes, pos, true);
                    self.push(offset + pos, offset + end, Style::Plain);
                    pos = end.max(pos + 1);
                }
            }
        }
    }

    fn push(&mut self, start: usize, end: usize, style: Style) {
        if end > start {
            self.spans.push(Span {
                start,
                end,
                style,
                in_flow: self.flow_depth > 0,
            });
        }
    }
}

fn indentation(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| **b == b' ').count()
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
    }
    pos
}

/// End of line or whitespace at `pos`.
fn is_blank(bytes: &[u8], pos: usize) -> bool {
    pos >= bytes.len() || matches!(bytes[pos], b' ' | b'\t')
}

fn is_flow_blank(bytes: &[u8], pos: usize) -> bool {
    is_blank(bytes, pos) || matches!(bytes[pos], b',' | b']' | b'}' | b'[' | b'{')
}

/// A `#` starts a comment at the beginning of a line or after whitespace.
fn is_comment(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos) == Some(&b'#') && (pos == 0 || matches!(bytes[pos - 1], b' ' | b'\t'))
}

/// Document markers and directives carry no scalars.
fn is_marker_line(bytes: &[u8]) -> bool {
    if bytes.first() == Some(&b'%') {
        return true;
    }
    (bytes.starts_with(b"---") || bytes.starts_with(b"...")) && is_blank(bytes, 3)
}

/// Skip anchors (`&a`) and tags (`!t`) preceding a node.
fn skip_properties(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && matches!(bytes[pos], b'&' | b'!') {
        pos = skip_spaces(bytes, token_end(bytes, pos));
    }
    pos
}

fn token_end(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && !matches!(bytes[pos], b' ' | b'\t' | b',' | b'[' | b']' | b'{' | b'}') {
        pos += 1;
    }
    pos
}

/// Index of the quote closing a scalar whose content starts at `pos`.
fn closing_quote(bytes: &[u8], mut pos: usize, quote: u8) -> Option<usize> {
    while pos < bytes.len() {
        let byte = bytes[pos];
        if quote == b'"' && byte == b'\\' {
            pos += 2;
            continue;
        }
        if byte == quote {
            if quote == b'\'' && bytes.get(pos + 1) == Some(&b'\'') {
                pos += 2;
                continue;
            }
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// End of a plain scalar starting at `start`, trailing whitespace excluded.
fn plain_end(bytes: &[u8], start: usize, in_flow: bool) -> usize {
    let mut pos = start;
    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte == b':' && (is_blank(bytes, pos + 1) || (in_flow && is_flow_blank(bytes, pos + 1))) {
            break;
        }
        if byte == b'#' && pos > start && matches!(bytes[pos - 1], b' ' | b'\t') {
            break;
        }
        if in_flow && matches!(byte, b',' | b'[' | b']' | b'{' | b'}') {
            break;
        }
        pos += 1;
    }
    while pos > start && matches!(bytes[pos - 1], b' ' | b'\t') {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(doc: &str) -> Vec<(&str, Style)> {
        scalar_spans(doc)
            .into_iter()
            .map(|s| (&doc[s.start..s.end], s.style))
            .collect()
    }

    #[test]
    fn test_block_mapping_keys_and_values() {
        let doc = "name: web # the name\nport: 443\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("name", Style::Plain),
                ("web", Style::Plain),
                ("port", Style::Plain),
                ("443", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_sequences_and_nested_mappings() {
        let doc = "items:\n  - a\n  - key: <[v]>\n    other: 'x y'\n  - - deep\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("items", Style::Plain),
                ("a", Style::Plain),
                ("key", Style::Plain),
                ("<[v]>", Style::Plain),
                ("other", Style::Plain),
                ("'x y'", Style::SingleQuoted),
                ("deep", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_plain_scalar_with_colon_and_hash() {
        let doc = "url: http://host:80/#frag\naddr: <[host]>:<[port]>\n";
        let found = scalars(doc);
        assert_eq!(found[1], ("http://host:80/#frag", Style::Plain));
        assert_eq!(found[3], ("<[host]>:<[port]>", Style::Plain));
    }

    #[test]
    fn test_quoted_scalars_with_escapes() {
        let doc = "a: \"say \\\"hi\\\"\" # c\nb: 'it''s'\n";
        let found = scalars(doc);
        assert_eq!(found[1], ("\"say \\\"hi\\\"\"", Style::DoubleQuoted));
        assert_eq!(found[3], ("'it''s'", Style::SingleQuoted));
    }

    #[test]
    fn test_flow_collections_across_lines() {
        let doc = "ports: [80,\n  \"<[port]>\"] # trailing\nlabels: {app: web, tier: \"<[tier]>\"}\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("ports", Style::Plain),
                ("80", Style::Plain),
                ("\"<[port]>\"", Style::DoubleQuoted),
                ("labels", Style::Plain),
                ("app", Style::Plain),
                ("web", Style::Plain),
                ("tier", Style::Plain),
                ("\"<[tier]>\"", Style::DoubleQuoted),
            ]
        );
    }

    #[test]
    fn test_block_scalar_lines_are_raw() {
        let doc = "script: |\n  echo <[msg]>\n\n  exit 0\nnext: value\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("script", Style::Plain),
                ("echo <[msg]>", Style::Raw),
                ("exit 0", Style::Raw),
                ("next", Style::Plain),
                ("value", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_block_scalar_in_sequence_entry() {
        let doc = "- |\n  line <[a]>\n- b\n";
        assert_eq!(
            scalars(doc),
            vec![("line <[a]>", Style::Raw), ("b", Style::Plain)]
        );
    }

    #[test]
    fn test_anchors_tags_and_aliases() {
        let doc = "base: &base <[x]>\ncopy: *base\ntyped: !!str <[y]>\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("base", Style::Plain),
                ("<[x]>", Style::Plain),
                ("copy", Style::Plain),
                ("typed", Style::Plain),
                ("<[y]>", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_comment_lines_and_markers_are_skipped() {
        let doc = "# <[not.a.value]>\n---\nkey: v\n";
        assert_eq!(
            scalars(doc),
            vec![("key", Style::Plain), ("v", Style::Plain)]
        );
    }

    #[test]
    fn test_multiline_double_quoted_interior_is_raw() {
        let doc = "msg: \"first <[a]>\n  second\"\nnext: 1\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("msg", Style::Plain),
                ("first <[a]>", Style::Raw),
                ("second", Style::Raw),
                ("next", Style::Plain),
                ("1", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_multiline_plain_value_is_one_folded_span() {
        let doc = "d: prefix\n  <[kv]>\n\n  tail\nnext: 1\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("d", Style::Plain),
                ("prefix\n  <[kv]>\n\n  tail", Style::Folded),
                ("next", Style::Plain),
                ("1", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_multiline_plain_in_sequence_and_bare() {
        let doc = "items:\n- a\n  <[b]>\n- c\nkey:\n  first\n  <[second]>\nother: x # done\n  \n";
        assert_eq!(
            scalars(doc),
            vec![
                ("items", Style::Plain),
                ("a\n  <[b]>", Style::Folded),
                ("c", Style::Plain),
                ("key", Style::Plain),
                ("first\n  <[second]>", Style::Folded),
                ("other", Style::Plain),
                ("x", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_comment_ends_plain_continuation() {
        let doc = "a: b\n  # note\nc: <[d]>\n";
        assert_eq!(
            scalars(doc),
            vec![
                ("a", Style::Plain),
                ("b", Style::Plain),
                ("c", Style::Plain),
                ("<[d]>", Style::Plain),
            ]
        );
    }

    #[test]
    fn test_flow_spans_are_marked() {
        let doc = "args: [--h=<(host)>, z]\nname: web\n";
        let flags: Vec<(&str, bool)> = scalar_spans(doc)
            .into_iter()
            .map(|s| (&doc[s.start..s.end], s.in_flow))
            .collect();
        assert_eq!(
            flags,
            vec![("args", false), ("--h=<(host)>", true), ("z", true), ("name", false), ("web", false)]
        );
    }

    #[test]
    fn test_root_scalar() {
        assert_eq!(scalars("<[port]>\n"), vec![("<[port]>", Style::Plain)]);
    }
}
