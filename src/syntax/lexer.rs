// Copyright (C) 2024 Jelmer Vernooij <jelmer@samba.org>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer for replacement expressions.

use super::{ParseError, MAX_NESTING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    IntLiteral(String),
    DecimalLiteral(String),
    CharLiteral(char),
    StringLiteral(String),
    /// A string literal with at least one `$name` or `${...}` entry.
    StringTemplate(Vec<TemplatePart>),
    True,
    False,
    Null,
    This,
    At,
    LParen,
    RParen,
    Lt,
    Gt,
    LtEqual,
    GtEqual,
    Comma,
    Dot,
    SafeDot,
    Question,
    Elvis,
    Equal,
    EqualEqual,
    BangEqual,
    Bang,
    BangBang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    /// `$name`
    Name { name: String, offset: usize },
    /// The tokens between `${` and `}`, terminated by [`TokenKind::Eof`].
    Block(Vec<Token>),
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::IntLiteral(text) | TokenKind::DecimalLiteral(text) => {
                format!("number '{}'", text)
            }
            TokenKind::CharLiteral(_) => "character literal".to_string(),
            TokenKind::StringLiteral(_) | TokenKind::StringTemplate(_) => {
                "string literal".to_string()
            }
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("{:?}", other),
        }
    }
}

pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: lexer.len,
    });
    Ok(tokens)
}

struct Lexer {
    chars: Vec<(usize, char)>,
    len: usize,
    cursor: usize,
    /// Depth of `${` blocks being lexed.
    nesting: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            len: source.len(),
            cursor: 0,
            nesting: 0,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        let start = self.offset();
        let current = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };
        let kind = match current {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '@' => TokenKind::At,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' => self.either('=', TokenKind::LtEqual, TokenKind::Lt),
            '>' => self.either('=', TokenKind::GtEqual, TokenKind::Gt),
            '=' => self.either('=', TokenKind::EqualEqual, TokenKind::Equal),
            '!' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::BangEqual
                }
                Some('!') => {
                    self.advance();
                    TokenKind::BangBang
                }
                _ => TokenKind::Bang,
            },
            '?' => match self.peek() {
                Some('.') => {
                    self.advance();
                    TokenKind::SafeDot
                }
                Some(':') => {
                    self.advance();
                    TokenKind::Elvis
                }
                _ => TokenKind::Question,
            },
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::AndAnd
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::OrOr
            }
            '"' => self.lex_string(start)?,
            '\'' => self.lex_char(start)?,
            '`' => self.lex_backticked(start)?,
            c if c.is_ascii_digit() => self.lex_number(c, start)?,
            c if c.is_alphabetic() || c == '_' => self.lex_word(c),
            other => {
                return Err(ParseError::new(
                    format!("Unexpected character '{}'", other),
                    start,
                ))
            }
        };
        Ok(Some(Token {
            kind,
            offset: start,
        }))
    }

    fn lex_word(&mut self, first: char) -> TokenKind {
        let word = self.identifier_rest(first);
        match word.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "this" => TokenKind::This,
            _ => TokenKind::Identifier(word),
        }
    }

    fn identifier_rest(&mut self, first: char) -> String {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    fn lex_backticked(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let mut word = String::new();
        loop {
            match self.advance() {
                Some('`') => break,
                Some('\n') | None => {
                    return Err(ParseError::new("Unterminated backticked name", start))
                }
                Some(c) => word.push(c),
            }
        }
        if word.is_empty() {
            return Err(ParseError::new("Empty backticked name", start));
        }
        Ok(TokenKind::Identifier(word))
    }

    fn lex_number(&mut self, first: char, start: usize) -> Result<TokenKind, ParseError> {
        let mut text = String::from(first);
        if first == '0' {
            if let Some(marker @ ('x' | 'X' | 'b' | 'B')) = self.peek() {
                self.advance();
                text.push(marker);
                let radix = if matches!(marker, 'x' | 'X') { 16 } else { 2 };
                let digits = self.digits(&mut text, radix);
                if digits == 0 || text.ends_with('_') {
                    return Err(ParseError::new(format!("Malformed number '{}'", text), start));
                }
                self.integer_suffix(&mut text);
                return Ok(TokenKind::IntLiteral(text));
            }
        }

        let mut decimal = false;
        self.digits(&mut text, 10);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            self.digits(&mut text, 10);
            decimal = true;
        }
        if let Some(marker @ ('e' | 'E')) = self.peek() {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let first_digit = self.peek_at(if signed { 2 } else { 1 });
            if first_digit.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                text.push(marker);
                if signed {
                    if let Some(sign) = self.advance() {
                        text.push(sign);
                    }
                }
                self.digits(&mut text, 10);
                decimal = true;
            }
        }
        if text.ends_with('_') {
            return Err(ParseError::new(format!("Malformed number '{}'", text), start));
        }
        if let Some(suffix @ ('f' | 'F')) = self.peek() {
            self.advance();
            text.push(suffix);
            decimal = true;
        } else if !decimal {
            self.integer_suffix(&mut text);
        }
        if decimal {
            Ok(TokenKind::DecimalLiteral(text))
        } else {
            Ok(TokenKind::IntLiteral(text))
        }
    }

    /// Consume digits of `radix` and `_` separators, returning the digit count.
    fn digits(&mut self, text: &mut String, radix: u32) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                count += 1;
            } else if c != '_' {
                break;
            }
            text.push(c);
            self.advance();
        }
        count
    }

    fn integer_suffix(&mut self, text: &mut String) {
        if self.peek() == Some('L') {
            self.advance();
            text.push('L');
        }
    }

    fn lex_char(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let value = match self.advance() {
            Some('\\') => self.escape()?,
            Some('\'') | Some('\n') | None => {
                return Err(ParseError::new("Empty character literal", start))
            }
            Some(c) => c,
        };
        if self.advance() != Some('\'') {
            return Err(ParseError::new("Unterminated character literal", start));
        }
        Ok(TokenKind::CharLiteral(value))
    }

    /// The character after a backslash.
    fn escape(&mut self) -> Result<char, ParseError> {
        let offset = self.offset();
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{8}'),
            Some(c @ ('\\' | '"' | '\'' | '$')) => Ok(c),
            Some('u') => {
                let mut code = String::new();
                for _ in 0..4 {
                    match self.advance() {
                        Some(c) if c.is_ascii_hexdigit() => code.push(c),
                        _ => return Err(ParseError::new("Malformed unicode escape", offset)),
                    }
                }
                u32::from_str_radix(&code, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::new("Malformed unicode escape", offset))
            }
            Some(other) => Err(ParseError::new(
                format!("Unsupported escape sequence '\\{}'", other),
                offset,
            )),
            None => Err(ParseError::new("Unterminated string literal", offset)),
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => text.push(self.escape()?),
                Some('$') => {
                    let offset = self.offset();
                    match self.peek() {
                        Some('{') => {
                            self.advance();
                            if !text.is_empty() {
                                parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                            }
                            parts.push(TemplatePart::Block(self.lex_block(offset)?));
                        }
                        Some(first) if first.is_alphabetic() || first == '_' => {
                            self.advance();
                            if !text.is_empty() {
                                parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                            }
                            let name = self.identifier_rest(first);
                            parts.push(TemplatePart::Name { name, offset });
                        }
                        _ => text.push('$'),
                    }
                }
                Some('\n') | None => {
                    return Err(ParseError::new("Unterminated string literal", start))
                }
                Some(c) => text.push(c),
            }
        }
        if parts.is_empty() {
            return Ok(TokenKind::StringLiteral(text));
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(TokenKind::StringTemplate(parts))
    }

    /// Lex the inside of `${...}` up to and including the closing brace.
    fn lex_block(&mut self, start: usize) -> Result<Vec<Token>, ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::new("Expression is nested too deeply", start));
        }
        self.nesting += 1;
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        offset: self.offset(),
                    });
                    self.advance();
                    break;
                }
                None => {
                    return Err(ParseError::new("Unterminated string template entry", start))
                }
                Some(_) => {
                    if let Some(token) = self.next_token()? {
                        tokens.push(token);
                    }
                }
            }
        }
        self.nesting -= 1;
        Ok(tokens)
    }

    fn either(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.cursor)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.len)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.cursor).map(|(_, c)| *c);
        if c.is_some() {
            self.cursor += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, distance: usize) -> Option<char> {
        self.chars.get(self.cursor + distance).map(|(_, c)| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_call_with_type_arguments() {
        assert_eq!(
            kinds("listOf<T>(x)"),
            vec![
                TokenKind::Identifier("listOf".into()),
                TokenKind::Lt,
                TokenKind::Identifier("T".into()),
                TokenKind::Gt,
                TokenKind::LParen,
                TokenKind::Identifier("x".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("a?.b ?: c!! != d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::SafeDot,
                TokenKind::Identifier("b".into()),
                TokenKind::Elvis,
                TokenKind::Identifier("c".into()),
                TokenKind::BangBang,
                TokenKind::BangEqual,
                TokenKind::Identifier("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_this_with_label() {
        assert_eq!(
            kinds("this@Outer"),
            vec![
                TokenKind::This,
                TokenKind::At,
                TokenKind::Identifier("Outer".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_literals() {
        assert_eq!(
            kinds(r#"1 2.5 10L "a\"b" true null"#),
            vec![
                TokenKind::IntLiteral("1".into()),
                TokenKind::DecimalLiteral("2.5".into()),
                TokenKind::IntLiteral("10L".into()),
                TokenKind::StringLiteral("a\"b".into()),
                TokenKind::True,
                TokenKind::Null,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_on_number_is_not_decimal() {
        assert_eq!(
            kinds("1.toString()"),
            vec![
                TokenKind::IntLiteral("1".into()),
                TokenKind::Dot,
                TokenKind::Identifier("toString".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_backticked_identifier() {
        assert_eq!(
            kinds("`is`"),
            vec![TokenKind::Identifier("is".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_number_forms() {
        assert_eq!(
            kinds("1e5 1.5E-3 2.5f 0x1F 0b1010L 1_000_000 0xFF_ECL"),
            vec![
                TokenKind::DecimalLiteral("1e5".into()),
                TokenKind::DecimalLiteral("1.5E-3".into()),
                TokenKind::DecimalLiteral("2.5f".into()),
                TokenKind::IntLiteral("0x1F".into()),
                TokenKind::IntLiteral("0b1010L".into()),
                TokenKind::IntLiteral("1_000_000".into()),
                TokenKind::IntLiteral("0xFF_ECL".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_needs_digits() {
        assert_eq!(
            kinds("1.equals(2)")[0],
            TokenKind::IntLiteral("1".into())
        );
        assert_eq!(
            kinds("1e"),
            vec![
                TokenKind::IntLiteral("1".into()),
                TokenKind::Identifier("e".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_char_literals() {
        assert_eq!(
            kinds(r"'a' '\n' '\'' '\u0041'"),
            vec![
                TokenKind::CharLiteral('a'),
                TokenKind::CharLiteral('\n'),
                TokenKind::CharLiteral('\''),
                TokenKind::CharLiteral('A'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_string_template() {
        assert_eq!(
            kinds(r#""Hello, $name! ${a + 1} costs 5$""#),
            vec![
                TokenKind::StringTemplate(vec![
                    TemplatePart::Text("Hello, ".into()),
                    TemplatePart::Name {
                        name: "name".into(),
                        offset: 9,
                    },
                    TemplatePart::Text("! ".into()),
                    TemplatePart::Block(vec![
                        Token {
                            kind: TokenKind::Identifier("a".into()),
                            offset: 17,
                        },
                        Token {
                            kind: TokenKind::Plus,
                            offset: 19,
                        },
                        Token {
                            kind: TokenKind::IntLiteral("1".into()),
                            offset: 21,
                        },
                        Token {
                            kind: TokenKind::Eof,
                            offset: 22,
                        },
                    ]),
                    TemplatePart::Text(" costs 5$".into()),
                ]),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escaped_dollar_is_text() {
        assert_eq!(
            kinds(r#""\$name""#),
            vec![TokenKind::StringLiteral("$name".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_nested_template_blocks_are_limited() {
        let nested = |depth: usize| {
            let mut text = "x".to_string();
            for _ in 0..depth {
                text = format!("\"${{{}}}\"", text);
            }
            text
        };
        assert!(lex(&nested(8)).is_ok());
        let err = lex(&nested(MAX_NESTING + 1)).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_errors() {
        assert!(lex("\"unterminated").is_err());
        assert!(lex("\"${x\"").is_err());
        assert!(lex("''").is_err());
        assert!(lex("'ab'").is_err());
        assert!(lex("0x").is_err());
        assert!(lex("1_").is_err());
        assert!(lex("a # b").is_err());
        assert!(lex("a & b").is_err());
    }
}
