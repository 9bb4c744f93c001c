//! Distinguished names for directory entries.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use accounts_core::Error as CoreError;

/// Errors raised while parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component was not of the form `attribute=value`.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// The input ended inside an escape sequence.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::InvalidRequest(err.to_string())
    }
}

/// A single `attribute=value` component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    attribute: String,
    value: String,
}

impl Rdn {
    /// Creates a component from an attribute name and an unescaped value.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute name (e.g. `uid`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn render(&self) -> String {
        format!("{}={}", self.attribute, escape(&self.value))
    }
}

/// Parsed distinguished name, most specific component first.
///
/// The canonical string form is rebuilt from the parsed components, so two names that differ
/// only in whitespace around separators compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dn {
    raw: String,
    rdns: Vec<Rdn>,
}

impl Dn {
    /// Parses a distinguished name.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] if the input is empty or a component is malformed.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DnError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DnError::Empty);
        }

        let rdns = split_components(raw)?
            .iter()
            .map(|component| parse_component(component))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::from_rdns(rdns))
    }

    /// Single-component name, e.g. an organizational root.
    #[must_use]
    pub fn new(attribute: &str, value: &str) -> Self {
        Self::from_rdns(vec![Rdn::new(attribute, value)])
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Self {
        let raw = rdns.iter().map(Rdn::render).collect::<Vec<_>>().join(",");
        Self { raw, rdns }
    }

    /// Borrows the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Components in order, most specific first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leading (entry-specific) component.
    #[must_use]
    pub fn first(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// Value of the first component whose attribute matches (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .find(|rdn| rdn.attribute.eq_ignore_ascii_case(attribute))
            .map(Rdn::value)
    }

    /// Builds the name of a direct child entry, escaping `value` as needed.
    #[must_use]
    pub fn child(&self, attribute: &str, value: &str) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(Rdn::new(attribute, value));
        rdns.extend(self.rdns.iter().cloned());
        Self::from_rdns(rdns)
    }

    /// Returns true when `self` is an immediate child of `parent`.
    #[must_use]
    pub fn is_child_of(&self, parent: &Dn) -> bool {
        self.rdns.len() == parent.rdns.len() + 1
            && self.rdns[1..]
                .iter()
                .zip(&parent.rdns)
                .all(|(ours, theirs)| {
                    ours.attribute.eq_ignore_ascii_case(&theirs.attribute)
                        && ours.value.eq_ignore_ascii_case(&theirs.value)
                })
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Dn> for String {
    fn from(value: Dn) -> Self {
        value.raw
    }
}

/// Splits on unescaped commas, keeping escape sequences intact for the component parser.
fn split_components(input: &str) -> std::result::Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let next = chars.next().ok_or(DnError::UnterminatedEscape)?;
                current.push('\\');
                current.push(next);
            }
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    let parts = parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .collect::<Vec<_>>();
    if parts.iter().any(String::is_empty) {
        return Err(DnError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn parse_component(component: &str) -> std::result::Result<Rdn, DnError> {
    let (attribute, value) = component
        .split_once('=')
        .ok_or_else(|| DnError::InvalidComponent(component.to_string()))?;
    let attribute = attribute.trim();
    let value = value.trim_start();

    if attribute.is_empty() || value.is_empty() || attribute.contains('\\') {
        return Err(DnError::InvalidComponent(component.to_string()));
    }

    Ok(Rdn::new(attribute, unescape(value)?))
}

/// Resolves `\<char>` and `\<hex><hex>` escapes. Hex pairs are raw bytes, so a multi-byte
/// character arrives as consecutive pairs.
fn unescape(value: &str) -> std::result::Result<String, DnError> {
    let invalid = || DnError::InvalidComponent(value.to_string());
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let next = chars.next().ok_or(DnError::UnterminatedEscape)?;
        match next.to_digit(16) {
            Some(high) => {
                let low = chars
                    .next()
                    .and_then(|c| c.to_digit(16))
                    .ok_or_else(invalid)?;
                bytes.push(u8::try_from(high * 16 + low).map_err(|_| invalid())?);
            }
            None => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8(bytes).map_err(|_| invalid())
}

fn escape(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in value.chars().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && (ch == ' ' || ch == '#'))
            || (idx == last && ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}
