//! A small Go lexer, sufficient for walking top-level declarations.
//!
//! Comments are discarded and string, raw string and rune literals are
//! collapsed to a single token, so text inside them can never be mistaken
//! for a declaration. Automatic semicolons are inserted at line ends (and
//! at end of input) after the same tokens the Go specification names.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Literal,
    Op(String),
    Semicolon,
}

impl Token {
    fn ends_statement(&self) -> bool {
        match self {
            Token::Ident(_) | Token::Literal => true,
            Token::Op(op) => matches!(op.as_str(), ")" | "]" | "}" | "++" | "--"),
            Token::Semicolon => false,
        }
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, Token::Op(o) if o == op)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(i) if i == name)
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
    line: usize,
}

/// Tokenize Go source. Fails on unterminated comments and literals.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: src.char_indices().peekable(),
        tokens: Vec::new(),
        line: 1,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<()> {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\n' => self.newline(),
                ' ' | '\t' | '\r' => {}
                '/' if self.peek() == Some('/') => self.line_comment(),
                '/' if self.peek() == Some('*') => {
                    self.chars.next();
                    self.block_comment()?;
                }
                '"' => {
                    self.string()?;
                    self.tokens.push(Token::Literal);
                }
                '`' => {
                    self.raw_string()?;
                    self.tokens.push(Token::Literal);
                }
                '\'' => {
                    self.rune()?;
                    self.tokens.push(Token::Literal);
                }
                c if c.is_ascii_digit() => {
                    self.number();
                    self.tokens.push(Token::Literal);
                }
                '.' if self.peek().map_or(false, |n| n.is_ascii_digit()) => {
                    self.number();
                    self.tokens.push(Token::Literal);
                }
                c if c == '_' || c.is_alphabetic() => {
                    let ident = self.ident(c);
                    self.tokens.push(Token::Ident(ident));
                }
                '+' | '-' if self.peek() == Some(c) => {
                    self.chars.next();
                    self.tokens.push(Token::Op(format!("{}{}", c, c)));
                }
                ';' => self.tokens.push(Token::Semicolon),
                c => self.tokens.push(Token::Op(c.to_string())),
            }
        }
        self.insert_semicolon();
        Ok(())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn insert_semicolon(&mut self) {
        if self.tokens.last().map_or(false, Token::ends_statement) {
            self.tokens.push(Token::Semicolon);
        }
    }

    fn newline(&mut self) {
        self.line += 1;
        self.insert_semicolon();
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn block_comment(&mut self) -> Result<()> {
        let start = self.line;
        let mut spans_lines = false;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '*' if self.peek() == Some('/') => {
                    self.chars.next();
                    // A multi-line comment acts like a newline.
                    if spans_lines {
                        self.insert_semicolon();
                    }
                    return Ok(());
                }
                '\n' => {
                    self.line += 1;
                    spans_lines = true;
                }
                _ => {}
            }
        }
        bail!("comment starting on line {} not terminated", start)
    }

    fn string(&mut self) -> Result<()> {
        let start = self.line;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                '"' => return Ok(()),
                '\n' => break,
                _ => {}
            }
        }
        bail!("string literal on line {} not terminated", start)
    }

    fn raw_string(&mut self) -> Result<()> {
        let start = self.line;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '`' => return Ok(()),
                '\n' => self.line += 1,
                _ => {}
            }
        }
        bail!("raw string literal on line {} not terminated", start)
    }

    fn rune(&mut self) -> Result<()> {
        let start = self.line;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                '\'' => return Ok(()),
                '\n' => break,
                _ => {}
            }
        }
        bail!("rune literal on line {} not terminated", start)
    }

    fn number(&mut self) {
        let mut prev = '0';
        while let Some(c) = self.peek() {
            let exponent_sign =
                (c == '+' || c == '-') && matches!(prev, 'e' | 'E' | 'p' | 'P');
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn ident(&mut self, first: char) -> String {
        let mut ident = String::from(first);
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        ident
    }
}
