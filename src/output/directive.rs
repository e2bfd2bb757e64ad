//! Inline script directives telling the client how to patch a scope.
//!
//! Wire format:
//!
//! ```text
//! <script>scopeReplaced('tbl');</script>
//! <script>scopeChanged('tbl', [null,'r0','r1','r3'], ['r2']);</script>
//! ```
//!
//! Insertions are flattened `(predecessor, new)` pairs; a predecessor of
//! `null` means "first row". Either list is the literal `null` when empty.
//! Identifiers are single-quoted with `\`, `'`, `<` and non-ASCII characters
//! escaped, so the output is plain ASCII and cannot close the script element.

use crate::buffer::BufferName;
use std::fmt::{self, Write as _};

const SCRIPT_OPEN: &str = "<script>";
const SCRIPT_CLOSE: &str = "</script>";
const REPLACED: &str = "scopeReplaced";
const CHANGED: &str = "scopeChanged";

/// A patch instruction for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// The scope's markup was re-sent in full and replaces the old one.
    ScopeReplaced {
        /// The replaced scope.
        scope: BufferName,
    },
    /// Rows were inserted or deleted.
    ScopeChanged {
        /// The patched scope.
        scope: BufferName,
        /// `(predecessor, new)` pairs in document order.
        inserted: Vec<(Option<BufferName>, BufferName)>,
        /// Names of removed rows.
        deleted: Vec<BufferName>,
    },
}

impl Directive {
    /// The scope this directive targets.
    pub const fn scope(&self) -> &BufferName {
        match self {
            Self::ScopeReplaced { scope } | Self::ScopeChanged { scope, .. } => scope,
        }
    }

    /// Extract every directive from response output, ignoring other scripts.
    pub fn parse_all(text: &str) -> Result<Vec<Self>, DirectiveError> {
        let mut directives = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find(SCRIPT_OPEN) {
            let body_start = open + SCRIPT_OPEN.len();
            let Some(close) = rest[body_start..].find(SCRIPT_CLOSE) else {
                return Err(DirectiveError::Unterminated);
            };
            let body = rest[body_start..body_start + close].trim();
            if body.starts_with(REPLACED) || body.starts_with(CHANGED) {
                directives.push(Parser::new(body).directive()?);
            }
            rest = &rest[body_start + close + SCRIPT_CLOSE.len()..];
        }
        Ok(directives)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in name.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '<' => f.write_str("\\x3c")?,
            c if c.is_ascii() && !c.is_ascii_control() => f.write_char(c)?,
            c => write!(f, "\\u{{{:x}}}", u32::from(c))?,
        }
    }
    f.write_char('\'')
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCRIPT_OPEN)?;
        match self {
            Self::ScopeReplaced { scope } => {
                write!(f, "{REPLACED}(")?;
                write_quoted(f, scope.as_str())?;
            }
            Self::ScopeChanged {
                scope,
                inserted,
                deleted,
            } => {
                write!(f, "{CHANGED}(")?;
                write_quoted(f, scope.as_str())?;
                f.write_str(", ")?;
                if inserted.is_empty() {
                    f.write_str("null")?;
                } else {
                    f.write_char('[')?;
                    for (i, (predecessor, name)) in inserted.iter().enumerate() {
                        if i > 0 {
                            f.write_char(',')?;
                        }
                        match predecessor {
                            Some(predecessor) => write_quoted(f, predecessor.as_str())?,
                            None => f.write_str("null")?,
                        }
                        f.write_char(',')?;
                        write_quoted(f, name.as_str())?;
                    }
                    f.write_char(']')?;
                }
                f.write_str(", ")?;
                if deleted.is_empty() {
                    f.write_str("null")?;
                } else {
                    f.write_char('[')?;
                    for (i, name) in deleted.iter().enumerate() {
                        if i > 0 {
                            f.write_char(',')?;
                        }
                        write_quoted(f, name.as_str())?;
                    }
                    f.write_char(']')?;
                }
            }
        }
        f.write_str(");")?;
        f.write_str(SCRIPT_CLOSE)
    }
}

/// Malformed directive text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    /// A `<script>` element without its closing tag.
    #[error("unterminated script element")]
    Unterminated,
    /// Something other than the expected token.
    #[error("expected {expected} at offset {offset}")]
    Unexpected {
        /// What the grammar required.
        expected: &'static str,
        /// Byte offset into the script body.
        offset: usize,
    },
    /// An unknown or truncated escape sequence in a quoted identifier.
    #[error("invalid escape at offset {offset}")]
    BadEscape {
        /// Byte offset into the script body.
        offset: usize,
    },
    /// An odd number of items in the insertion list.
    #[error("insertion list must hold predecessor/name pairs")]
    UnpairedInsertion,
}

/// One list item: a quoted name or `null`.
type Item = Option<BufferName>;

struct Parser<'a> {
    text: &'a str,
    offset: usize,
}

impl<'a> Parser<'a> {
    const fn new(text: &'a str) -> Self {
        Self { text, offset: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.offset..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.offset = self.text.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.offset += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &'static str) -> Result<(), DirectiveError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(DirectiveError::Unexpected {
                expected: token,
                offset: self.offset,
            })
        }
    }

    fn directive(&mut self) -> Result<Directive, DirectiveError> {
        if self.eat(REPLACED) {
            self.expect("(")?;
            let scope = self.quoted()?;
            self.expect(")")?;
            self.eat(";");
            return Ok(Directive::ScopeReplaced { scope });
        }
        self.expect(CHANGED)?;
        self.expect("(")?;
        let scope = self.quoted()?;
        self.expect(",")?;
        let items = self.list()?;
        if items.len() % 2 != 0 {
            return Err(DirectiveError::UnpairedInsertion);
        }
        let mut inserted = Vec::with_capacity(items.len() / 2);
        for pair in items.chunks_exact(2) {
            let Some(name) = pair[1].clone() else {
                return Err(DirectiveError::Unexpected {
                    expected: "inserted row name",
                    offset: self.offset,
                });
            };
            inserted.push((pair[0].clone(), name));
        }
        self.expect(",")?;
        let deleted = self
            .list()?
            .into_iter()
            .map(|item| {
                item.ok_or(DirectiveError::Unexpected {
                    expected: "deleted row name",
                    offset: self.offset,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.expect(")")?;
        self.eat(";");
        Ok(Directive::ScopeChanged {
            scope,
            inserted,
            deleted,
        })
    }

    /// `null` or `[item, ...]`.
    fn list(&mut self) -> Result<Vec<Item>, DirectiveError> {
        if self.eat("null") {
            return Ok(Vec::new());
        }
        self.expect("[")?;
        let mut items = Vec::new();
        if self.eat("]") {
            return Ok(items);
        }
        loop {
            items.push(self.item()?);
            if self.eat("]") {
                return Ok(items);
            }
            self.expect(",")?;
        }
    }

    fn item(&mut self) -> Result<Item, DirectiveError> {
        if self.eat("null") {
            Ok(None)
        } else {
            self.quoted().map(Some)
        }
    }

    fn quoted(&mut self) -> Result<BufferName, DirectiveError> {
        self.expect("'")?;
        let mut name = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\'' => {
                    self.offset += i + 1;
                    return Ok(BufferName::from(name));
                }
                '\\' => {
                    let escape_offset = self.offset + i;
                    let bad = DirectiveError::BadEscape { offset: escape_offset };
                    match chars.next().map(|(_, c)| c) {
                        Some('\\') => name.push('\\'),
                        Some('\'') => name.push('\''),
                        Some('x') => {
                            let hex: String = chars.by_ref().take(2).map(|(_, c)| c).collect();
                            let code = u8::from_str_radix(&hex, 16).map_err(|_| bad.clone())?;
                            name.push(char::from(code));
                        }
                        Some('u') => {
                            if chars.next().map(|(_, c)| c) != Some('{') {
                                return Err(bad);
                            }
                            let hex: String = chars
                                .by_ref()
                                .map(|(_, c)| c)
                                .take_while(|&c| c != '}')
                                .collect();
                            let code = u32::from_str_radix(&hex, 16).map_err(|_| bad.clone())?;
                            name.push(char::from_u32(code).ok_or(bad)?);
                        }
                        _ => return Err(bad),
                    }
                }
                c => name.push(c),
            }
        }
        Err(DirectiveError::Unexpected {
            expected: "closing quote",
            offset: self.text.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> BufferName {
        BufferName::from(s)
    }

    #[test]
    fn test_replaced_format() {
        let directive = Directive::ScopeReplaced { scope: name("tbl") };
        assert_eq!(directive.to_string(), "<script>scopeReplaced('tbl');</script>");
    }

    #[test]
    fn test_changed_format() {
        let directive = Directive::ScopeChanged {
            scope: name("tbl"),
            inserted: vec![(None, name("r0")), (Some(name("r1")), name("r3"))],
            deleted: vec![name("r2")],
        };
        assert_eq!(
            directive.to_string(),
            "<script>scopeChanged('tbl', [null,'r0','r1','r3'], ['r2']);</script>"
        );
    }

    #[test]
    fn test_changed_null_lists() {
        let directive = Directive::ScopeChanged {
            scope: name("tbl"),
            inserted: vec![],
            deleted: vec![name("r2")],
        };
        assert_eq!(directive.to_string(), "<script>scopeChanged('tbl', null, ['r2']);</script>");
    }

    #[test]
    fn test_escaping() {
        let directive = Directive::ScopeReplaced {
            scope: name("it's<a\\b>é"),
        };
        let text = directive.to_string();
        assert_eq!(text, "<script>scopeReplaced('it\\'s\\x3ca\\\\b>\\u{e9}');</script>");
        assert!(text.is_ascii());
        assert_eq!(Directive::parse_all(&text).unwrap(), vec![directive]);
    }

    #[test]
    fn test_parse_skips_markup_and_other_scripts() {
        let text = "<tr>x</tr><script>alert(1)</script>\
                    <script>scopeChanged('tbl', ['r1','r3'], null);</script>\
                    <script>scopeReplaced('list');</script>";
        let directives = Directive::parse_all(text).unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::ScopeChanged {
                    scope: name("tbl"),
                    inserted: vec![(Some(name("r1")), name("r3"))],
                    deleted: vec![],
                },
                Directive::ScopeReplaced { scope: name("list") },
            ]
        );
        assert_eq!(directives[1].scope().as_str(), "list");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Directive::parse_all("<script>scopeReplaced('x');"),
            Err(DirectiveError::Unterminated)
        );
        assert_eq!(
            Directive::parse_all("<script>scopeChanged('x', ['a'], null);</script>"),
            Err(DirectiveError::UnpairedInsertion)
        );
        assert!(matches!(
            Directive::parse_all("<script>scopeReplaced('x\\q');</script>"),
            Err(DirectiveError::BadEscape { .. })
        ));
        assert!(matches!(
            Directive::parse_all("<script>scopeChanged('x', [null,null], null);</script>"),
            Err(DirectiveError::Unexpected { .. })
        ));
    }
}
