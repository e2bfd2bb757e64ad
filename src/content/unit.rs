//! Content units: immutable, shareable fragments of response output.
//!
//! A unit is created once during rendering and never mutated. Text units
//! cache their encoded bytes per [`Encoding`] on first use, so a unit shared
//! between many responses is encoded at most once per encoding.

use std::borrow::{Borrow, Cow};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Character encodings a response can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// UTF-8, the text's native representation.
    #[default]
    Utf8,
    /// ISO-8859-1. Characters above U+00FF are replaced by `?`.
    Latin1,
    /// 7-bit ASCII. Characters above U+007F are replaced by `?`.
    Ascii,
}

impl Encoding {
    /// Encode `text`, borrowing when no conversion is needed.
    pub fn encode(self, text: &str) -> Cow<'_, [u8]> {
        match self {
            Self::Utf8 => Cow::Borrowed(text.as_bytes()),
            Self::Latin1 | Self::Ascii if text.is_ascii() => Cow::Borrowed(text.as_bytes()),
            Self::Latin1 => {
                Cow::Owned(text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect())
            }
            Self::Ascii => Cow::Owned(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                    .collect(),
            ),
        }
    }

    /// Slot in a unit's encoding cache. UTF-8 is never cached.
    const fn cache_slot(self) -> Option<usize> {
        match self {
            Self::Utf8 => None,
            Self::Latin1 => Some(0),
            Self::Ascii => Some(1),
        }
    }
}

#[derive(Debug)]
enum Payload {
    Text(Box<str>),
    Binary(Box<[u8]>),
}

struct UnitInner {
    payload: Payload,
    /// Whitespace-only text, computed once at construction.
    whitespace: bool,
    /// Encoded bytes for non-UTF-8 encodings.
    encoded: [OnceLock<Box<[u8]>>; 2],
}

/// An immutable fragment of output.
///
/// Cloning is a reference count increment. Use a [`UnitInterner`] to make
/// identical text share a single instance.
#[derive(Clone)]
pub struct ContentUnit(Arc<UnitInner>);

impl ContentUnit {
    fn from_payload(payload: Payload) -> Self {
        let whitespace = match &payload {
            Payload::Text(text) => text.chars().all(char::is_whitespace),
            Payload::Binary(_) => false,
        };
        Self(Arc::new(UnitInner {
            payload,
            whitespace,
            encoded: [OnceLock::new(), OnceLock::new()],
        }))
    }

    /// Create a text unit.
    pub fn text(text: impl Into<Box<str>>) -> Self {
        Self::from_payload(Payload::Text(text.into()))
    }

    /// Create a binary unit, written verbatim under every encoding.
    pub fn binary(bytes: impl Into<Box<[u8]>>) -> Self {
        Self::from_payload(Payload::Binary(bytes.into()))
    }

    /// The unit's text, or `None` for binary units.
    pub fn as_text(&self) -> Option<&str> {
        match &self.0.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Whether this is a binary unit.
    pub fn is_binary(&self) -> bool {
        matches!(self.0.payload, Payload::Binary(_))
    }

    /// Whether the text consists solely of whitespace characters.
    ///
    /// Empty text counts as whitespace. Binary units never do.
    #[inline]
    pub fn is_whitespace(&self) -> bool {
        self.0.whitespace
    }

    /// The bytes this unit writes under `encoding`.
    pub fn bytes(&self, encoding: Encoding) -> &[u8] {
        let text = match &self.0.payload {
            Payload::Binary(bytes) => return &bytes[..],
            Payload::Text(text) => text,
        };
        match encoding.cache_slot() {
            None => text.as_bytes(),
            Some(slot) => {
                &self.0.encoded[slot]
                    .get_or_init(|| encoding.encode(text).into_owned().into_boxed_slice())[..]
            }
        }
    }

    /// Whether two handles refer to the same interned instance.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl std::fmt::Debug for ContentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.payload {
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Payload::Binary(bytes) => f.debug_tuple("Binary").field(&bytes.len()).finish(),
        }
    }
}

impl From<&str> for ContentUnit {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for ContentUnit {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Set entry keyed by the unit's text.
struct Interned(ContentUnit);

impl Interned {
    fn key(&self) -> &str {
        self.0.as_text().unwrap_or_default()
    }
}

impl PartialEq for Interned {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Interned {}

impl Hash for Interned {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Borrow<str> for Interned {
    fn borrow(&self) -> &str {
        self.key()
    }
}

/// Hands out one shared [`ContentUnit`] per distinct text.
#[derive(Default)]
pub struct UnitInterner {
    units: HashSet<Interned>,
}

impl UnitInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared unit for `text`, creating it on first use.
    pub fn intern(&mut self, text: &str) -> ContentUnit {
        if let Some(existing) = self.units.get(text) {
            return existing.0.clone();
        }
        let unit = ContentUnit::text(text);
        self.units.insert(Interned(unit.clone()));
        unit
    }

    /// Number of distinct texts interned.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for UnitInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitInterner").field("units", &self.units.len()).finish()
    }
}
