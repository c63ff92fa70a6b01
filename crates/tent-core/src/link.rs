//! Link extraction from HTTP `Link` headers and HTML `<link>` tags.
//!
//! Both sources yield links in document order. Header parsing is strict: a
//! malformed header is an error. HTML scanning is lenient: a document cut
//! off mid-tag yields every complete tag found before the cut.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A target URI and its relation, as carried by a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub uri: String,
    pub rel: String,
    /// Parameters other than `rel`, keyed by lowercase name.
    pub params: BTreeMap<String, String>,
}

impl Link {
    pub fn new(uri: impl Into<String>, rel: impl Into<String>) -> Self {
        Self { uri: uri.into(), rel: rel.into(), params: BTreeMap::new() }
    }
}

/// Parse a `Link` header value: `<uri>; rel="x"; k=v, <uri2>; rel=y`.
pub fn parse_link_header(value: &str) -> Result<Vec<Link>> {
    let mut cursor = Cursor { input: value, pos: 0 };
    let mut links = Vec::new();

    loop {
        cursor.skip_while(|b| b == b',' || b.is_ascii_whitespace());
        if cursor.at_end() {
            break;
        }
        cursor.expect(b'<')?;
        let uri = cursor.take_until(b'>')?;
        let mut link = Link::new(uri.trim(), "");

        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                None | Some(b',') => break,
                Some(b';') => {
                    cursor.pos += 1;
                    cursor.skip_whitespace();
                    let name = cursor.token()?.to_ascii_lowercase();
                    cursor.skip_whitespace();
                    let value = if cursor.peek() == Some(b'=') {
                        cursor.pos += 1;
                        cursor.skip_whitespace();
                        if cursor.peek() == Some(b'"') {
                            cursor.quoted()?
                        } else {
                            cursor.token()?.to_string()
                        }
                    } else {
                        String::new()
                    };
                    if name == "rel" {
                        // The first rel wins, per RFC 8288.
                        if link.rel.is_empty() {
                            link.rel = value;
                        }
                    } else {
                        link.params.entry(name).or_insert(value);
                    }
                }
                Some(other) => {
                    return Err(Error::LinkHeader(format!(
                        "unexpected {:?} at offset {}",
                        other as char, cursor.pos
                    )));
                }
            }
        }
        links.push(link);
    }
    Ok(links)
}

/// Render links as a `Link` header value.
pub fn format_link_header(links: &[Link]) -> String {
    links
        .iter()
        .map(|link| {
            let mut out = format!("<{}>", link.uri);
            if !link.rel.is_empty() {
                out.push_str(&format!("; rel=\"{}\"", escape_quoted(&link.rel)));
            }
            for (name, value) in &link.params {
                out.push_str(&format!("; {}=\"{}\"", name, escape_quoted(value)));
            }
            out
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        self.skip_while(|b| b == b' ' || b == b'\t');
    }

    fn expect(&mut self, want: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == want => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(Error::LinkHeader(format!(
                "expected {:?} at offset {}",
                want as char, self.pos
            ))),
        }
    }

    /// Consume up to and including `end`, returning the text before it.
    fn take_until(&mut self, end: u8) -> Result<&'a str> {
        let input: &'a str = self.input;
        let rest = &input[self.pos..];
        match rest.as_bytes().iter().position(|&b| b == end) {
            Some(offset) => {
                let taken = &rest[..offset];
                self.pos += offset + 1;
                Ok(taken)
            }
            None => Err(Error::LinkHeader(format!("unterminated {:?}", end as char))),
        }
    }

    fn token(&mut self) -> Result<&'a str> {
        let input: &'a str = self.input;
        let start = self.pos;
        self.skip_while(is_token_byte);
        if self.pos == start {
            return Err(Error::LinkHeader(format!("expected token at offset {start}")));
        }
        Ok(&input[start..self.pos])
    }

    fn quoted(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        let mut escaped = false;
        let input = self.input;
        for (offset, c) in input[self.pos..].char_indices() {
            if escaped {
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                self.pos += offset + 1;
                return Ok(out);
            } else {
                out.push(c);
            }
        }
        Err(Error::LinkHeader("unterminated quoted string".into()))
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~/:".contains(&b)
}

/// Comments and raw-text elements. An unterminated one runs to end of input.
static IGNORED: LazyLock<Regex> = LazyLock::new(|| {
    let raw_text = ["script", "style", "title", "textarea", "noscript", "xmp", "iframe", "noembed", "noframes"]
        .iter()
        .map(|tag| format!(r"<{tag}\b.*?(?:</{tag}\s*>|\z)"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?is)<!--.*?(?:-->|\z)|{raw_text}|<plaintext\b.*"))
        .expect("static regex is valid")
});

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).expect("static regex is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("static regex is valid")
});

/// Collect the `href` of every `<link>` start or self-closing tag whose `rel`
/// attribute equals `rel` exactly.
///
/// Attribute order within a tag does not matter. Tags missing either
/// attribute are skipped, and so is anything inside a comment or a raw-text
/// element such as `<script>` or `<title>`.
pub fn parse_html_links(html: &str, rel: &str) -> Vec<String> {
    let visible = IGNORED.replace_all(html, "");
    let mut links = Vec::new();

    for tag in LINK_TAG.captures_iter(&visible) {
        let attrs = tag.get(1).map_or("", |m| m.as_str());
        let mut href: Option<String> = None;
        let mut tag_rel: Option<String> = None;

        for attr in ATTRIBUTE.captures_iter(attrs) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map_or(String::new(), |m| unescape_entities(m.as_str()));
            match name.as_str() {
                "href" if href.is_none() => href = Some(value),
                "rel" if tag_rel.is_none() => tag_rel = Some(value),
                _ => {}
            }
        }

        if let (Some(href), Some(tag_rel)) = (href, tag_rel) {
            if tag_rel == rel && !href.is_empty() {
                links.push(href);
            }
        }
    }
    links
}

/// Decode character references in an attribute value.
///
/// Handles numeric references and the XML entities (`amp`, `lt`, `gt`,
/// `quot`, `apos`) only. Other HTML named entities are left as written.
fn unescape_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
