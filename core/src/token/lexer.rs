use crate::token::{ParseError, Position, Span};

/// Lexical token kinds.
///
/// Comments use single quotes (`' ... '`) and string literals double quotes;
/// keyword tokens carry their trailing colon (`at:`); binary selectors are
/// maximal runs of operator characters (`+`, `//`, `~=`, `->`). `>>` also
/// lexes as a binary selector and is reserved by the parser for method
/// definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Id(String),      // foo, Point
    Keyword(String), // at: (colon included)
    BinSel(String),  // + - * / // \ < <= > >= = == ~= ~~ , & @ -> >>
    Int(i64),
    Float(f64),
    Str(String),
    Sym(String), // #foo, #at:put:, #+
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    HashParen, // #(
    HashBrace, // #{
    Dot,
    Semi,
    Colon,
    Caret,
    Pipe,
    Assign, // :=
    Eof,
}

impl Tok {
    /// True for tokens that can end an operand, used to tell a negative
    /// literal (`-3`) apart from binary minus (`x -3`... is still minus).
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Tok::Id(_)
                | Tok::Int(_)
                | Tok::Float(_)
                | Tok::Str(_)
                | Tok::Sym(_)
                | Tok::RParen
                | Tok::RBracket
                | Tok::RBrace
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

const BINARY_CHARS: &[char] = &['+', '-', '*', '/', '\\', '<', '>', '=', '~', ',', '&', '@'];

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
    last_significant: Option<Tok>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
            last_significant: None,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Lex the whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.tok == Tok::Eof;
            if !is_eof {
                self.last_significant = Some(token.tok.clone());
            }
            out.push(token);
            if is_eof {
                return Ok(out);
            }
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.idx)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                // Comment: ' ... ' (quote roles are swapped relative to
                // classic Smalltalk; strings take the double quote).
                Some('\'') => {
                    let start = self.position();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('\'') => break,
                            Some(_) => {}
                            None => {
                                return Err(ParseError::at("unterminated comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let start = self.position();
        let Some(c) = self.peek() else {
            return Ok(Token {
                tok: Tok::Eof,
                span: Span::single(start),
            });
        };

        let tok = match c {
            '(' => {
                self.bump();
                Tok::LParen
            }
            ')' => {
                self.bump();
                Tok::RParen
            }
            '[' => {
                self.bump();
                Tok::LBracket
            }
            ']' => {
                self.bump();
                Tok::RBracket
            }
            '{' => {
                self.bump();
                Tok::LBrace
            }
            '}' => {
                self.bump();
                Tok::RBrace
            }
            '.' => {
                self.bump();
                Tok::Dot
            }
            ';' => {
                self.bump();
                Tok::Semi
            }
            '^' => {
                self.bump();
                Tok::Caret
            }
            '|' => {
                self.bump();
                Tok::Pipe
            }
            ':' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Tok::Assign
                } else {
                    Tok::Colon
                }
            }
            '#' => {
                self.bump();
                match self.peek() {
                    Some('(') => {
                        self.bump();
                        Tok::HashParen
                    }
                    Some('{') => {
                        self.bump();
                        Tok::HashBrace
                    }
                    Some(c2) if c2.is_alphabetic() || c2 == '_' => Tok::Sym(self.lex_symbol_body()),
                    Some(c2) if BINARY_CHARS.contains(&c2) => Tok::Sym(self.lex_binary_run()),
                    _ => return Err(ParseError::at("invalid symbol literal", start)),
                }
            }
            '"' => self.lex_string(start)?,
            c if c.is_ascii_digit() => self.lex_number(start, false)?,
            '-' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                && !self
                    .last_significant
                    .as_ref()
                    .is_some_and(|t| t.ends_operand()) =>
            {
                self.bump();
                self.lex_number(start, true)?
            }
            c if c.is_alphabetic() || c == '_' => {
                let word = self.lex_identifier();
                // `foo:` is a keyword token unless it is `foo :=`.
                if self.peek() == Some(':') && self.peek_at(1) != Some('=') {
                    self.bump();
                    Tok::Keyword(format!("{}:", word))
                } else {
                    Tok::Id(word)
                }
            }
            c if BINARY_CHARS.contains(&c) => Tok::BinSel(self.lex_binary_run()),
            _ => {
                return Err(ParseError::at(format!("unexpected character '{}'", c), start));
            }
        };

        let end = self.position();
        Ok(Token {
            tok,
            span: Span::new(start, end),
        })
    }

    fn lex_identifier(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    /// Symbol body after `#`: `foo`, `at:put:` (keyword runs keep colons).
    fn lex_symbol_body(&mut self) -> String {
        let mut sym = String::new();
        loop {
            sym.push_str(&self.lex_identifier());
            if self.peek() == Some(':') && self.peek_at(1) != Some('=') {
                self.bump();
                sym.push(':');
                if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
                    continue;
                }
            }
            break;
        }
        sym
    }

    fn lex_binary_run(&mut self) -> String {
        let mut sel = String::new();
        while let Some(c) = self.peek() {
            if BINARY_CHARS.contains(&c) {
                sel.push(c);
                self.bump();
            } else {
                break;
            }
        }
        sel
    }

    fn lex_string(&mut self, start: Position) -> Result<Tok, ParseError> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Tok::Str(s)),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some('0') => s.push('\0'),
                    Some(other) => {
                        return Err(ParseError::at(
                            format!("unknown escape '\\{}'", other),
                            start,
                        ));
                    }
                    None => return Err(ParseError::at("unterminated string", start)),
                },
                Some(c) => s.push(c),
                None => return Err(ParseError::at("unterminated string", start)),
            }
        }
    }

    fn lex_number(&mut self, start: Position, negative: bool) -> Result<Tok, ParseError> {
        let mut digits = String::new();
        if negative {
            digits.push('-');
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        // A fractional part only when the dot is followed by a digit, so a
        // statement period after an integer stays a period.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            digits.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let value: f64 = digits
                .parse()
                .map_err(|_| ParseError::at("invalid float literal", start))?;
            return Ok(Tok::Float(value));
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| ParseError::at("integer literal out of range", start))?;
        Ok(Tok::Int(value))
    }
}
