//! Token definitions for path expressions
//!
//! Only the path half of an expression (`$item.tags[0]`, `user["first name"]`) is tokenized
//! here. Filter tails are split on raw text because filter arguments are free-form.
use logos::Logos;

/// Tokens of the path grammar `$? ident (.ident | .int | [int] | ["key"])*`
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\r\n]+")]
pub enum PathToken {
    #[token("$")]
    Dollar,

    #[token(".")]
    Dot,

    #[token("[")]
    OpenBracket,

    #[token("]")]
    CloseBracket,

    #[regex(r"[0-9]+")]
    Integer,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r"'([^'\\]|\\.)*'")]
    Quoted,
}

impl PathToken {
    pub fn describe(&self) -> &'static str {
        match self {
            PathToken::Dollar => "`$`",
            PathToken::Dot => "`.`",
            PathToken::OpenBracket => "`[`",
            PathToken::CloseBracket => "`]`",
            PathToken::Integer => "integer",
            PathToken::Ident => "identifier",
            PathToken::Quoted => "quoted string",
        }
    }
}

/// Tokenize a path, pairing each token with its source text
pub fn tokenize(path: &str) -> Result<Vec<(PathToken, &str)>, String> {
    let mut lexer = PathToken::lexer(path);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.slice())),
            Err(()) => return Err(format!("unexpected `{}`", lexer.slice())),
        }
    }

    Ok(tokens)
}

/// Strip the quotes from a quoted literal and resolve its backslash escapes
///
/// Unknown escapes keep the escaped character; text without surrounding quotes is returned
/// unchanged.
pub fn unquote(literal: &str) -> String {
    let bytes = literal.as_bytes();
    let quoted = bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    if !quoted {
        return literal.to_string();
    }

    let inner = &literal[1..literal.len() - 1];
    if !inner.contains('\\') {
        return inner.to_string();
    }

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
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(path: &str) -> Vec<PathToken> {
        tokenize(path).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(
            kinds("user.name"),
            vec![PathToken::Ident, PathToken::Dot, PathToken::Ident]
        );
    }

    #[test]
    fn test_local_with_index_and_key() {
        assert_eq!(
            kinds(r#"$item.tags[0]["x"]"#),
            vec![
                PathToken::Dollar,
                PathToken::Ident,
                PathToken::Dot,
                PathToken::Ident,
                PathToken::OpenBracket,
                PathToken::Integer,
                PathToken::CloseBracket,
                PathToken::OpenBracket,
                PathToken::Quoted,
                PathToken::CloseBracket,
            ]
        );
    }

    #[test]
    fn test_slices_are_preserved() {
        let tokens = tokenize("a ['b c']").unwrap();
        assert_eq!(tokens[0].1, "a");
        assert_eq!(tokens[2], (PathToken::Quoted, "'b c'"));
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(tokenize("a+b").unwrap_err(), "unexpected `+`");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""header""#), "header");
        assert_eq!(unquote("'single'"), "single");
        assert_eq!(unquote(r#""say \"hi\"\n""#), "say \"hi\"\n");
        assert_eq!(unquote("bare"), "bare");
        assert_eq!(unquote("\"unbalanced"), "\"unbalanced");
    }
}
