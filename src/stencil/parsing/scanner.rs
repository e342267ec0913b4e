//! Delimiter-driven tag scanner
//!
//! Splits template source into literal text runs and tag bodies. The scanner knows nothing about
//! keywords; it only finds the next opening delimiter, then the next closing delimiter after it,
//! and hands out the trimmed text in between.

use crate::stencil::error::{CompileError, Position};

/// A piece of template source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'s> {
    /// Literal output; never empty
    Text(&'s str),
    /// Trimmed tag body, with the byte offset of its opening delimiter
    Tag { body: &'s str, offset: usize },
}

pub struct Scanner<'s> {
    source: &'s str,
    cursor: usize,
    left: &'s str,
    right: &'s str,
}

impl<'s> Scanner<'s> {
    /// Both delimiters must be non-empty; the parser validates this before scanning.
    pub fn new(source: &'s str, left: &'s str, right: &'s str) -> Self {
        Self {
            source,
            cursor: 0,
            left,
            right,
        }
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Result<Segment<'s>, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.source[self.cursor..];
        if rest.is_empty() {
            return None;
        }

        let Some(open) = rest.find(self.left) else {
            self.cursor = self.source.len();
            return Some(Ok(Segment::Text(rest)));
        };

        if open > 0 {
            self.cursor += open;
            return Some(Ok(Segment::Text(&rest[..open])));
        }

        let offset = self.cursor;
        let body_start = offset + self.left.len();
        match self.source[body_start..].find(self.right) {
            Some(close) => {
                let body = &self.source[body_start..body_start + close];
                self.cursor = body_start + close + self.right.len();
                Some(Ok(Segment::Tag {
                    body: body.trim(),
                    offset,
                }))
            }
            None => {
                self.cursor = self.source.len();
                Some(Err(CompileError::UnterminatedTag {
                    position: Position::from_offset(self.source, offset),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Segment<'_>> {
        Scanner::new(source, "{{", "}}")
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(scan("plain text"), vec![Segment::Text("plain text")]);
        assert_eq!(scan(""), vec![]);
    }

    #[test]
    fn test_tags_and_text() {
        assert_eq!(
            scan("Hi {{ name }}!{{x}}"),
            vec![
                Segment::Text("Hi "),
                Segment::Tag {
                    body: "name",
                    offset: 3
                },
                Segment::Text("!"),
                Segment::Tag {
                    body: "x",
                    offset: 14
                },
            ]
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let segments: Vec<_> = Scanner::new("a <% b %> {{ c }}", "<%", "%>")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("a "),
                Segment::Tag {
                    body: "b",
                    offset: 2
                },
                Segment::Text(" {{ c }}"),
            ]
        );
    }

    #[test]
    fn test_unterminated_tag() {
        let results: Vec<_> = Scanner::new("ok\n  {{ name", "{{", "}}").collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1],
            Err(CompileError::UnterminatedTag {
                position: Position::new(2, 3)
            })
        );
    }
}
