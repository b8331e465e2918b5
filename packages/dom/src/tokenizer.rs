//! Selector tokenizer

use logos::Logos;
use std::fmt;

/// Selector tokens
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum SelectorToken<'src> {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    #[regex(r"'[^']*'", |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Str(&'src str),

    #[token("#")]
    Hash,

    #[token(".")]
    Dot,

    #[token("*")]
    Star,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("=")]
    Equals,

    #[token("~=")]
    Includes,

    #[token("^=")]
    PrefixMatch,

    #[token("$=")]
    SuffixMatch,

    #[token("*=")]
    SubstringMatch,

    #[token(">")]
    Child,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,
}

impl<'src> fmt::Display for SelectorToken<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorToken::Whitespace => write!(f, "whitespace"),
            SelectorToken::Ident(s) => write!(f, "identifier '{}'", s),
            SelectorToken::Str(s) => write!(f, "string \"{}\"", s),
            SelectorToken::Hash => write!(f, "#"),
            SelectorToken::Dot => write!(f, "."),
            SelectorToken::Star => write!(f, "*"),
            SelectorToken::LBracket => write!(f, "["),
            SelectorToken::RBracket => write!(f, "]"),
            SelectorToken::Equals => write!(f, "="),
            SelectorToken::Includes => write!(f, "~="),
            SelectorToken::PrefixMatch => write!(f, "^="),
            SelectorToken::SuffixMatch => write!(f, "$="),
            SelectorToken::SubstringMatch => write!(f, "*="),
            SelectorToken::Child => write!(f, ">"),
            SelectorToken::Comma => write!(f, ","),
            SelectorToken::Colon => write!(f, ":"),
        }
    }
}

/// Tokenize a selector; the first unlexable position is reported as `Err(pos)`
pub fn tokenize_selector(source: &str) -> Result<Vec<SelectorToken<'_>>, usize> {
    let mut tokens = Vec::new();
    for (result, span) in SelectorToken::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => return Err(span.start),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_tokens() {
        let tokens = tokenize_selector(r#"div.card > [data-x="1"]"#).unwrap();
        assert_eq!(tokens[0], SelectorToken::Ident("div"));
        assert_eq!(tokens[1], SelectorToken::Dot);
        assert_eq!(tokens[2], SelectorToken::Ident("card"));
        assert_eq!(tokens[3], SelectorToken::Whitespace);
        assert_eq!(tokens[4], SelectorToken::Child);
        assert!(tokens.contains(&SelectorToken::Str("1")));
    }

    #[test]
    fn test_selector_lex_error_position() {
        assert_eq!(tokenize_selector("div{").unwrap_err(), 3);
    }
}
