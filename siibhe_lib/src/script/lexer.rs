//! Tokenizer for report scripts.

use crate::error::ExtractionError;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Punct(char),
    Eof,
}

#[derive(Clone, Debug)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

const PUNCT: &[char] = &['=', ';', ',', '.', '(', ')', '[', ']', '{', '}', '+', '-', ':'];

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    col: usize,
    newline: bool,
    at_line_start: bool,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ExtractionError> {
    let mut lexer = Lexer {
        chars: src.char_indices().peekable(),
        src,
        line: 1,
        col: 1,
        newline: true,
        at_line_start: true,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let (line, col, newline_before) = (lexer.line, lexer.col, lexer.newline);
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(Spanned {
            token,
            line,
            col,
            newline_before,
        });
        if done {
            return Ok(tokens);
        }
        lexer.newline = false;
        lexer.at_line_start = false;
    }
}

impl Lexer<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn rest(&mut self) -> &str {
        match self.chars.peek() {
            Some((i, _)) => &self.src[*i..],
            None => "",
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.newline = true;
            self.at_line_start = true;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, msg: impl std::fmt::Display) -> ExtractionError {
        ExtractionError::Syntax(format!("line {}, column {}: {}", self.line, self.col, msg))
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Whitespace and comments, including the `<!--` / `-->` markers that old
    /// pages wrap their scripts in.
    fn skip_trivia(&mut self) -> Result<(), ExtractionError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.rest().starts_with("//") => self.skip_line(),
                Some('/') if self.rest().starts_with("/*") => {
                    self.bump();
                    self.bump();
                    loop {
                        if self.rest().starts_with("*/") {
                            self.bump();
                            self.bump();
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(self.error("unterminated comment"));
                        }
                    }
                }
                Some('<') if self.rest().starts_with("<!--") => self.skip_line(),
                Some('-') if self.at_line_start && self.rest().starts_with("-->") => {
                    self.skip_line()
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ExtractionError> {
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };
        if c == '\'' || c == '"' {
            return self.string(c);
        }
        if c.is_ascii_digit() || (c == '.' && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit())) {
            return self.number();
        }
        if c == '_' || c == '$' || c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(c) = self.peek() {
                if c == '_' || c == '$' || c.is_alphanumeric() {
                    ident.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(Token::Ident(ident));
        }
        if PUNCT.contains(&c) {
            self.bump();
            return Ok(Token::Punct(c));
        }
        Err(self.error(format!("unexpected character {:?}", c)))
    }

    fn string(&mut self, quote: char) -> Result<Token, ExtractionError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            match c {
                c if c == quote => return Ok(Token::Str(out)),
                '\n' => return Err(self.error("unterminated string literal")),
                '\\' => {
                    let Some(e) = self.bump() else {
                        return Err(self.error("unterminated string literal"));
                    };
                    match e {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'v' => out.push('\u{b}'),
                        '0' => out.push('\0'),
                        '\n' => {}
                        'x' => out.push(self.hex_escape(2)?),
                        'u' => out.push(self.hex_escape(4)?),
                        other => out.push(other),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, ExtractionError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid escape sequence"))?;
            value = value * 16 + d;
        }
        // Lone surrogates have no `char`; the portal never emits them.
        Ok(char::from_u32(value).unwrap_or('\u{fffd}'))
    }

    fn number(&mut self) -> Result<Token, ExtractionError> {
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                digits.push(c);
                self.bump();
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| Token::Num(n as f64))
                .map_err(|_| self.error("invalid hex literal"));
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            let take = match c {
                '0'..='9' => true,
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    true
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    true
                }
                '+' | '-' if text.ends_with(['e', 'E']) => true,
                _ => false,
            };
            if !take {
                break;
            }
            text.push(c);
            self.bump();
        }
        if self.peek().is_some_and(|c| c == '_' || c.is_alphabetic()) {
            return Err(self.error("identifier starts immediately after numeric literal"));
        }
        text.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| self.error(format!("invalid number {:?}", text)))
    }
}
