//! Decoder for Python literal reprs.
//!
//! Test fixtures carry their cases as the `repr()` of a list of dicts, which
//! is close to JSON but not JSON (single quotes, tuples, `True`/`None`, ...).
//! This module reads that subset into a `serde_json::Value` without
//! evaluating anything.

use serde_json::{Map, Number, Value};

/// Deepest list/tuple/dict nesting accepted, matching serde_json's default
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiteralError {
    #[error("unexpected end of literal")]
    UnexpectedEof,

    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("dict keys must be strings (offset {0})")]
    NonStringKey(usize),

    #[error("trailing characters at offset {0}")]
    TrailingCharacters(usize),

    #[error("nesting deeper than {MAX_DEPTH} levels at offset {0}")]
    RecursionLimit(usize),
}

pub type Result<T> = std::result::Result<T, LiteralError>;

/// Parse a complete Python literal
pub fn parse(text: &str) -> Result<Value> {
    let mut parser = Parser::new(text);
    let value = parser.value()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(value),
        Some(_) => Err(LiteralError::TrailingCharacters(parser.offset())),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<char> {
        let c = self.peek().ok_or(LiteralError::UnexpectedEof)?;
        self.pos += 1;
        Ok(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, found: char) -> LiteralError {
        LiteralError::Unexpected {
            found,
            offset: self.pos,
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        let c = self.peek().ok_or(LiteralError::UnexpectedEof)?;
        match c {
            '[' => self.nested(|p| p.sequence('[', ']')),
            '(' => self.nested(|p| p.sequence('(', ')')),
            '{' => self.nested(Self::dict),
            '\'' | '"' => self.string().map(Value::String),
            'u' | 'U' | 'b' | 'B' | 'r' | 'R' if self.is_prefixed_string() => {
                self.string().map(Value::String)
            }
            '-' | '+' | '.' | '0'..='9' => self.number(),
            c if c.is_alphabetic() => self.keyword(),
            other => Err(self.unexpected(other)),
        }
    }

    fn nested<F>(&mut self, parse: F) -> Result<Value>
    where
        F: FnOnce(&mut Self) -> Result<Value>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(LiteralError::RecursionLimit(self.pos));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn is_prefixed_string(&self) -> bool {
        let mut i = self.pos;
        while matches!(self.chars.get(i), Some('u' | 'U' | 'b' | 'B' | 'r' | 'R')) {
            i += 1;
        }
        i > self.pos && matches!(self.chars.get(i), Some('\'' | '"'))
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value> {
        let first = self.bump()?;
        debug_assert_eq!(first, open);

        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                c if c == close => return Ok(Value::Array(items)),
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
    }

    fn dict(&mut self) -> Result<Value> {
        self.bump()?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key_offset = self.offset();
            let key = match self.value()? {
                Value::String(s) => s,
                _ => return Err(LiteralError::NonStringKey(key_offset)),
            };
            self.skip_whitespace();
            match self.bump()? {
                ':' => {}
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                '}' => return Ok(Value::Object(map)),
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
    }

    fn string(&mut self) -> Result<String> {
        let mut raw = false;
        while let Some(c @ ('u' | 'U' | 'b' | 'B' | 'r' | 'R')) = self.peek() {
            raw |= matches!(c, 'r' | 'R');
            self.pos += 1;
        }

        let quote = self.bump()?;
        let triple = self.chars.get(self.pos) == Some(&quote)
            && self.chars.get(self.pos + 1) == Some(&quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self.bump()?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.chars.get(self.pos) == Some(&quote)
                    && self.chars.get(self.pos + 1) == Some(&quote)
                {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            if raw {
                out.push('\\');
                out.push(self.bump()?);
                continue;
            }
            self.escape(&mut out)?;
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let at = self.pos - 1;
        match self.bump()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => {}
            'x' => out.push(self.hex_char(2, at)?),
            'u' => out.push(self.hex_char(4, at)?),
            'U' => out.push(self.hex_char(8, at)?),
            // Python keeps unknown escapes verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize, at: usize) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()?
                .to_digit(16)
                .ok_or(LiteralError::InvalidEscape(at))?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape(at))
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some('0'..='9' | '-' | '+' | '.' | 'e' | 'E' | '_')
        ) {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        if let Ok(i) = token.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        token
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or(LiteralError::InvalidNumber(token))
    }

    fn keyword(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.unexpected(self.chars[start]))
            }
        }
    }
}
