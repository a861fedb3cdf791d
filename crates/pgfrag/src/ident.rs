//! SQL identifier handling.
//!
//! Identifiers are never parameterized: they are rendered inline, always
//! double-quoted, with embedded `"` doubled. [`Ident::parse`] understands dotted
//! and quoted notation so that `public.books` and `"public"."books"` render the
//! same way.
//!
//! # Example
//! ```ignore
//! use pgfrag::Ident;
//!
//! let t = Ident::parse("public.books")?;
//! assert_eq!(t.to_sql(), r#""public"."books""#);
//! # Ok::<(), pgfrag::DbError>(())
//! ```

use crate::error::{DbError, DbResult};

/// A SQL identifier (column, table, or schema name), split into its dotted parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// A single-part identifier taken literally (dots are part of the name).
    pub fn new(name: &str) -> DbResult<Self> {
        check_part(name)?;
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table.column`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."User.Table".id`
    pub fn parse(s: &str) -> DbResult<Self> {
        if s.is_empty() {
            return Err(DbError::invalid_expression("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(DbError::invalid_expression(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(DbError::invalid_expression(format!(
                                "Trailing '.' in identifier '{s}'"
                            )));
                        }
                    }
                    Some(c) => {
                        return Err(DbError::invalid_expression(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => {
                            return Err(DbError::invalid_expression(format!(
                                "Unclosed quoted identifier '{s}'"
                            )));
                        }
                    }
                }
                check_part(&name)?;
                parts.push(name);
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if c == '"' {
                    return Err(DbError::invalid_expression(format!(
                        "Unexpected '\"' inside identifier '{s}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            check_part(&name)?;
            parts.push(name);
        }

        Ok(Self { parts })
    }

    /// The unquoted parts of this identifier.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The last part, i.e. the bare column or table name.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let cap = self.parts.iter().map(|p| p.len() + 3).sum();
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            write_quoted(out, part);
        }
    }
}

pub(crate) fn write_quoted(out: &mut String, name: &str) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

fn check_part(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::invalid_expression("Empty identifier segment"));
    }
    if name.contains('\0') {
        return Err(DbError::invalid_expression(
            "Identifier cannot contain NUL character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("books").unwrap();
        assert_eq!(ident.to_sql(), r#""books""#);
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("public.books").unwrap();
        assert_eq!(ident.to_sql(), r#""public"."books""#);
        assert_eq!(ident.name(), "books");
    }

    #[test]
    fn ident_quoted_with_escape() {
        let ident = Ident::parse(r#""has""quote""#).unwrap();
        assert_eq!(ident.to_sql(), r#""has""quote""#);
    }

    #[test]
    fn ident_mixed_quoted_unquoted() {
        let ident = Ident::parse(r#"public."User.Table".id"#).unwrap();
        assert_eq!(ident.to_sql(), r#""public"."User.Table"."id""#);
    }

    #[test]
    fn ident_new_keeps_dots_and_escapes_quotes() {
        let ident = Ident::new(r#"odd."name"#).unwrap();
        assert_eq!(ident.to_sql(), r#""odd.""name""#);
    }

    #[test]
    fn ident_rejects_malformed() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(r#""unclosed"#).is_err());
        assert!(Ident::new("").is_err());
        assert!(Ident::new("nul\0").is_err());
    }
}
