use super::ast::Span;
use super::error::CompileError;

/// VBScript tokens. Keywords are matched case-insensitively; soft keywords
/// (`To`, `Step`, `Each`, `In`, `Get`, `Let`, `Preserve`, `Error`, ...) stay
/// identifiers and are recognized by the parser in context.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    True,
    False,
    Nothing,
    Empty,
    Null,

    // Identifiers & keywords
    Ident(String),
    Dim,
    Const,
    ReDim,
    Set,
    Call,
    Sub,
    Function,
    Property,
    Class,
    End,
    Exit,
    If,
    Then,
    Else,
    ElseIf,
    For,
    Next,
    Do,
    Loop,
    While,
    Until,
    Wend,
    Select,
    Case,
    New,
    Me,
    Private,
    Public,
    ByVal,
    ByRef,
    On,
    Option,
    And,
    Or,
    Not,
    Xor,
    Mod,
    Is,

    // Punctuation
    LParen,
    RParen,
    Comma,
    Dot,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Caret,
    Ampersand,
    Eq,
    Ne, // <>
    Lt,
    Gt,
    Le, // <=
    Ge, // >=

    // Special
    Newline,
    Eof,
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<SpannedToken>, CompileError> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<SpannedToken>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<SpannedToken>, CompileError> {
        while self.pos < self.bytes.len() {
            self.skip_whitespace_and_comments();
            if self.pos >= self.bytes.len() {
                break;
            }

            let start = self.pos;
            let ch = self.bytes[self.pos];

            match ch {
                b'\n' | b'\r' => {
                    // Collapse blank lines into one terminator
                    while self.pos < self.bytes.len()
                        && matches!(self.bytes[self.pos], b'\n' | b'\r' | b' ' | b'\t')
                    {
                        self.pos += 1;
                    }
                    if self.tokens.last().is_some_and(|t| t.token != Token::Newline) {
                        self.push(Token::Newline, start, self.pos);
                    }
                }
                b'_' if self.is_line_continuation() => {
                    // ` _` at end of line joins the next line
                    self.pos += 1;
                    while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\r') {
                        self.pos += 1;
                    }
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                }
                b'(' => { self.pos += 1; self.push(Token::LParen, start, self.pos); }
                b')' => { self.pos += 1; self.push(Token::RParen, start, self.pos); }
                b',' => { self.pos += 1; self.push(Token::Comma, start, self.pos); }
                b':' => { self.pos += 1; self.push(Token::Colon, start, self.pos); }
                b'+' => { self.pos += 1; self.push(Token::Plus, start, self.pos); }
                b'-' => { self.pos += 1; self.push(Token::Minus, start, self.pos); }
                b'*' => { self.pos += 1; self.push(Token::Star, start, self.pos); }
                b'/' => { self.pos += 1; self.push(Token::Slash, start, self.pos); }
                b'\\' => { self.pos += 1; self.push(Token::Backslash, start, self.pos); }
                b'^' => { self.pos += 1; self.push(Token::Caret, start, self.pos); }
                b'=' => { self.pos += 1; self.push(Token::Eq, start, self.pos); }
                b'.' => {
                    if self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) && !self.after_operand() {
                        self.lex_number(start)?;
                    } else {
                        self.pos += 1;
                        self.push(Token::Dot, start, self.pos);
                    }
                }
                b'&' => {
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'h' | b'H'))
                        && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_hexdigit)
                    {
                        self.pos += 1;
                        self.lex_hex(start)?;
                    } else {
                        self.push(Token::Ampersand, start, self.pos);
                    }
                }
                b'<' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'>') => { self.pos += 1; self.push(Token::Ne, start, self.pos); }
                        Some(b'=') => { self.pos += 1; self.push(Token::Le, start, self.pos); }
                        _ => self.push(Token::Lt, start, self.pos),
                    }
                }
                b'>' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(Token::Ge, start, self.pos);
                    } else {
                        self.push(Token::Gt, start, self.pos);
                    }
                }
                b'"' => {
                    self.pos += 1;
                    self.lex_string(start)?;
                }
                b'0'..=b'9' => {
                    self.lex_number(start)?;
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    self.lex_word(start);
                }
                _ => {
                    return Err(CompileError::lexer(
                        format!("Unexpected character: '{}'", ch as char),
                        Span::new(start, start + 1),
                    ));
                }
            }
        }

        if self.tokens.last().is_some_and(|t| t.token == Token::Newline) {
            self.tokens.pop();
        }
        self.tokens.push(SpannedToken {
            token: Token::Eof,
            span: Span::new(self.pos, self.pos),
        });

        Ok(std::mem::take(&mut self.tokens))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn push(&mut self, token: Token, start: usize, end: usize) {
        self.tokens.push(SpannedToken {
            token,
            span: Span::new(start, end),
        });
    }

    /// True if the previous token ends an operand, so a following `.` is
    /// member access rather than the start of `.5`.
    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(|t| {
            t.span.end == self.pos && matches!(t.token, Token::Ident(_) | Token::RParen | Token::Me)
        })
    }

    fn is_line_continuation(&self) -> bool {
        let preceded_by_space = self.pos == 0 || matches!(self.bytes[self.pos - 1], b' ' | b'\t');
        let rest = &self.bytes[self.pos + 1..];
        let line_ends = rest
            .iter()
            .take_while(|b| **b != b'\n')
            .all(|b| matches!(b, b' ' | b'\t' | b'\r'));
        preceded_by_space && line_ends
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' => self.pos += 1,
                b'\'' => self.skip_to_line_end(),
                b'r' | b'R' if self.is_rem_comment() => self.skip_to_line_end(),
                _ => break,
            }
        }
    }

    fn is_rem_comment(&self) -> bool {
        let word = self.bytes.get(self.pos..self.pos + 3);
        let next = self.bytes.get(self.pos + 3).copied();
        let at_statement_start = self
            .tokens
            .last()
            .map_or(true, |t| matches!(t.token, Token::Newline | Token::Colon));
        word.is_some_and(|w| w.eq_ignore_ascii_case(b"rem"))
            && next.map_or(true, |b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            && at_statement_start
    }

    fn skip_to_line_end(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<(), CompileError> {
        let mut value = String::new();
        loop {
            let Some(rest) = self.source.get(self.pos..) else { break };
            let Some(quote) = rest.find(['"', '\n']) else { break };
            value.push_str(&rest[..quote]);
            self.pos += quote;
            if self.bytes[self.pos] == b'\n' {
                break;
            }
            // `""` inside a string is an escaped quote
            if self.bytes.get(self.pos + 1) == Some(&b'"') {
                value.push('"');
                self.pos += 2;
            } else {
                self.pos += 1;
                self.push(Token::String(value), start, self.pos);
                return Ok(());
            }
        }
        Err(CompileError::lexer(
            "Unterminated string literal",
            Span::new(start, self.pos),
        ))
    }

    fn lex_number(&mut self, start: usize) -> Result<(), CompileError> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut end = self.pos + 1;
            if matches!(self.bytes.get(end), Some(b'+' | b'-')) {
                end += 1;
            }
            if self.bytes.get(end).is_some_and(u8::is_ascii_digit) {
                self.pos = end;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }
        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(v) => {
                self.push(Token::Number(v), start, self.pos);
                Ok(())
            }
            Err(_) => Err(CompileError::lexer(
                format!("Invalid number: {text}"),
                Span::new(start, self.pos),
            )),
        }
    }

    fn lex_hex(&mut self, start: usize) -> Result<(), CompileError> {
        let digits_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_hexdigit() {
            self.pos += 1;
        }
        let digits = &self.source[digits_start..self.pos];
        // Trailing `&` marks a long literal
        if self.peek() == Some(b'&') {
            self.pos += 1;
        }
        match i64::from_str_radix(digits, 16) {
            #[allow(clippy::cast_precision_loss)]
            Ok(v) => {
                self.push(Token::Number(v as f64), start, self.pos);
                Ok(())
            }
            Err(_) => Err(CompileError::lexer(
                format!("Invalid hex literal: &H{digits}"),
                Span::new(start, self.pos),
            )),
        }
    }

    fn lex_word(&mut self, start: usize) {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let word = &self.source[start..self.pos];

        // After `.` every word is a member name, keywords included
        if self.tokens.last().is_some_and(|t| t.token == Token::Dot) {
            self.push(Token::Ident(word.to_string()), start, self.pos);
            return;
        }

        let token = match word.to_ascii_lowercase().as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "nothing" => Token::Nothing,
            "empty" => Token::Empty,
            "null" => Token::Null,
            "dim" => Token::Dim,
            "const" => Token::Const,
            "redim" => Token::ReDim,
            "set" => Token::Set,
            "call" => Token::Call,
            "sub" => Token::Sub,
            "function" => Token::Function,
            "property" => Token::Property,
            "class" => Token::Class,
            "end" => Token::End,
            "exit" => Token::Exit,
            "if" => Token::If,
            "then" => Token::Then,
            "else" => Token::Else,
            "elseif" => Token::ElseIf,
            "for" => Token::For,
            "next" => Token::Next,
            "do" => Token::Do,
            "loop" => Token::Loop,
            "while" => Token::While,
            "until" => Token::Until,
            "wend" => Token::Wend,
            "select" => Token::Select,
            "case" => Token::Case,
            "new" => Token::New,
            "me" => Token::Me,
            "private" => Token::Private,
            "public" => Token::Public,
            "byval" => Token::ByVal,
            "byref" => Token::ByRef,
            "on" => Token::On,
            "option" => Token::Option,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "xor" => Token::Xor,
            "mod" => Token::Mod,
            "is" => Token::Is,
            _ => Token::Ident(word.to_string()),
        };
        self.push(token, start, self.pos);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Vec<Token> {
        lex(s).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = tok("DIM x : dim Y");
        assert_eq!(tokens, vec![
            Token::Dim, Token::Ident("x".into()), Token::Colon,
            Token::Dim, Token::Ident("Y".into()), Token::Eof,
        ]);
    }

    #[test]
    fn implicit_call_tokens() {
        let tokens = tok("BallRelease 5, -2");
        assert_eq!(tokens, vec![
            Token::Ident("BallRelease".into()), Token::Number(5.0), Token::Comma,
            Token::Minus, Token::Number(2.0), Token::Eof,
        ]);
    }

    #[test]
    fn leading_dot_decimal() {
        let tokens = tok("PlaySound x, .67");
        assert_eq!(tokens, vec![
            Token::Ident("PlaySound".into()), Token::Ident("x".into()), Token::Comma,
            Token::Number(0.67), Token::Eof,
        ]);
    }

    #[test]
    fn member_names_may_be_keywords() {
        let tokens = tok("Controller.Stop");
        assert_eq!(tokens, vec![
            Token::Ident("Controller".into()), Token::Dot, Token::Ident("Stop".into()), Token::Eof,
        ]);
        let tokens = tok("x.End");
        assert_eq!(tokens[2], Token::Ident("End".into()));
    }

    #[test]
    fn strings_with_escaped_quotes() {
        let tokens = tok(r#"x = "say ""hi"""#);
        assert_eq!(tokens[2], Token::String("say \"hi\"".into()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex("x = \"abc\ny").unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }

    #[test]
    fn comments_stripped() {
        let tokens = tok("x = 1 ' trailing\nRem whole line\ny");
        assert_eq!(tokens, vec![
            Token::Ident("x".into()), Token::Eq, Token::Number(1.0), Token::Newline,
            Token::Ident("y".into()), Token::Eof,
        ]);
    }

    #[test]
    fn line_continuation_joins_lines() {
        let tokens = tok("Foo a, _\n  b");
        assert_eq!(tokens, vec![
            Token::Ident("Foo".into()), Token::Ident("a".into()), Token::Comma,
            Token::Ident("b".into()), Token::Eof,
        ]);
    }

    #[test]
    fn comparison_and_concat_operators() {
        let tokens = tok("a <> b & c <= &HFF");
        assert_eq!(tokens, vec![
            Token::Ident("a".into()), Token::Ne, Token::Ident("b".into()), Token::Ampersand,
            Token::Ident("c".into()), Token::Le, Token::Number(255.0), Token::Eof,
        ]);
    }

    #[test]
    fn blank_lines_collapse() {
        let tokens = tok("a\n\n\r\n  \nb\n");
        assert_eq!(tokens, vec![
            Token::Ident("a".into()), Token::Newline, Token::Ident("b".into()), Token::Eof,
        ]);
    }
}
