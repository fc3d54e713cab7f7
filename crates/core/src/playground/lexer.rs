//! Converts snippet source into tokens.
//!
//! Comments are dropped, line breaks are recorded on the following token so the
//! parser can apply automatic semicolon insertion, and template literals are
//! lexed recursively into their text and expression parts.

use super::error::SyntaxError;
use super::token::{TemplatePart, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    newline_before: bool,
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self::starting_at(source, 1, 1)
    }

    /// Lexer whose positions are offset, for text embedded in a larger source.
    fn starting_at(source: &str, line: u32, column: u32) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line,
            column,
            newline_before: false,
        }
    }

    /// Lex the whole source. The returned stream always ends with `Eof`.
    ///
    /// # Errors
    ///
    /// Returns `SyntaxError` for unterminated strings or comments and for
    /// characters outside the supported language.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let newline_before = std::mem::take(&mut self.newline_before);
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, line, column, newline_before));
                return Ok(tokens);
            };

            let kind = if ch.is_ascii_digit()
                || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                self.number()?
            } else if ch == '"' || ch == '\'' {
                self.string(ch)?
            } else if ch == '`' {
                self.template()?
            } else if is_word_start(ch) {
                self.word()
            } else {
                self.punctuation()?
            };
            tokens.push(Token::new(kind, line, column, newline_before));
        }
    }

    //
    // ─── Character helpers ────────────────────────────────────────────────────
    //

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }

    //
    // ─── Whitespace & comments ────────────────────────────────────────────────
    //

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        while let Some(ch) = self.peek() {
            match ch {
                '\n' => {
                    self.newline_before = true;
                    self.advance();
                }
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some('\n') => self.newline_before = true,
                            Some(_) => {}
                            None => return Err(self.error("Invalid or unexpected token")),
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    //
    // ─── Literals ─────────────────────────────────────────────────────────────
    //

    fn number(&mut self) -> Result<TokenKind, SyntaxError> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.advance();
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit() || *c == '_') {
                self.advance();
                if c != '_' {
                    digits.push(c);
                }
            }
            #[allow(clippy::cast_precision_loss)]
            return u64::from_str_radix(&digits, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| self.error("Invalid or unexpected token"));
        }

        let mut text = String::new();
        self.digits_into(&mut text);
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| !is_word_start(c)) {
            self.advance();
            text.push('.');
            self.digits_into(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let exponent_follows = match sign {
                Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                text.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    text.push(sign);
                    self.advance();
                }
                self.digits_into(&mut text);
            }
        }
        if self.peek().is_some_and(is_word_start) {
            return Err(self.error("Invalid or unexpected token"));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error("Invalid or unexpected token"))
    }

    fn digits_into(&mut self, out: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            self.advance();
            if c != '_' {
                out.push(c);
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => self.escape_into(&mut value)?,
                Some('\n') | None => return Err(self.error("Invalid or unexpected token")),
                Some(c) => value.push(c),
            }
        }
    }

    fn escape_into(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let Some(ch) = self.advance() else {
            return Err(self.error("Invalid or unexpected token"));
        };
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'u' => {
                let mut hex = String::new();
                if self.eat('{') {
                    while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                        self.advance();
                        hex.push(c);
                    }
                    if !self.eat('}') {
                        return Err(self.error("Invalid Unicode escape sequence"));
                    }
                } else {
                    for _ in 0..4 {
                        match self.advance() {
                            Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                            _ => return Err(self.error("Invalid Unicode escape sequence")),
                        }
                    }
                }
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                out.push(decoded);
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn template(&mut self) -> Result<TokenKind, SyntaxError> {
        self.advance();
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated template literal")),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.escape_into(&mut text)?;
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let (line, column) = (self.line, self.column);
                    let source = self.embedded_expression()?;
                    let tokens = Lexer::starting_at(&source, line, column).tokenize()?;
                    parts.push(TemplatePart::Expr(tokens));
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(TokenKind::Template(parts))
    }

    /// Collect the text of a `${...}` body up to its matching `}`.
    fn embedded_expression(&mut self) -> Result<String, SyntaxError> {
        let mut depth = 0_u32;
        let mut source = String::new();
        let mut quote: Option<char> = None;
        loop {
            let Some(ch) = self.advance() else {
                return Err(self.error("Unterminated template literal"));
            };
            if let Some(q) = quote {
                source.push(ch);
                if ch == '\\' {
                    if let Some(next) = self.advance() {
                        source.push(next);
                    }
                } else if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    source.push(ch);
                }
                '{' => {
                    depth += 1;
                    source.push(ch);
                }
                '}' if depth == 0 => return Ok(source),
                '}' => {
                    depth -= 1;
                    source.push(ch);
                }
                _ => source.push(ch),
            }
        }
    }

    fn word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| is_word_start(*c) || c.is_ascii_digit()) {
            self.advance();
            word.push(c);
        }
        TokenKind::Word(word)
    }

    //
    // ─── Operators ────────────────────────────────────────────────────────────
    //

    fn punctuation(&mut self) -> Result<TokenKind, SyntaxError> {
        let Some(ch) = self.advance() else {
            return Ok(TokenKind::Eof);
        };
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::QuestionQuestionAssign
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else if self.peek() == Some('.')
                    && self.peek_at(1).is_none_or(|c| !c.is_ascii_digit())
                {
                    self.advance();
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        TokenKind::StarStarAssign
                    } else {
                        TokenKind::StarStar
                    }
                } else if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    if self.eat('=') {
                        TokenKind::AmpAmpAssign
                    } else {
                        TokenKind::AmpAmp
                    }
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    if self.eat('=') {
                        TokenKind::PipePipeAssign
                    } else {
                        TokenKind::PipePipe
                    }
                } else {
                    TokenKind::Pipe
                }
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Invalid or unexpected token '{other}'"),
                    self.line,
                    self.column.saturating_sub(1).max(1),
                ));
            }
        };
        Ok(kind)
    }
}

fn is_word_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$' || ch == '#'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Eof)
            .collect()
    }

    #[test]
    fn lexes_declaration_with_annotation() {
        assert_eq!(
            kinds("let fuel: number = 85;"),
            vec![
                TokenKind::Word("let".into()),
                TokenKind::Word("fuel".into()),
                TokenKind::Colon,
                TokenKind::Word("number".into()),
                TokenKind::Assign,
                TokenKind::Number(85.0),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a === b !== c => d ?? e?.f"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::EqEqEq,
                TokenKind::Word("b".into()),
                TokenKind::BangEqEq,
                TokenKind::Word("c".into()),
                TokenKind::Arrow,
                TokenKind::Word("d".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Word("e".into()),
                TokenKind::QuestionDot,
                TokenKind::Word("f".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_newlines_recorded() {
        let tokens = Lexer::new("a // note\n/* block\n */ b").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Word("a".into()));
        assert_eq!(tokens[1].kind, TokenKind::Word("b".into()));
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r#"'it\'s' "tab\there" "A""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("tab\there".into()),
                TokenKind::Str("A".into()),
            ]
        );
    }

    #[test]
    fn template_literal_splits_text_and_expressions() {
        let kinds = kinds("`Fuel: ${fuel + 1}%`");
        let TokenKind::Template(parts) = &kinds[0] else {
            panic!("expected template, got {kinds:?}");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TemplatePart::Text("Fuel: ".into()));
        let TemplatePart::Expr(tokens) = &parts[1] else {
            panic!("expected expression part");
        };
        assert_eq!(tokens[0].kind, TokenKind::Word("fuel".into()));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        assert_eq!(parts[2], TemplatePart::Text("%".into()));
    }

    #[test]
    fn numbers_cover_decimals_and_exponents() {
        assert_eq!(
            kinds("3.25 .5 1e3 0xff 1_000"),
            vec![
                TokenKind::Number(3.25),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(255.0),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::new("let a = 'oops\n").tokenize().unwrap_err();
        assert_eq!(err.message, "Invalid or unexpected token");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unknown_character_is_reported() {
        let err = Lexer::new("let a = 5 @ 2").tokenize().unwrap_err();
        assert!(err.message.contains('@'));
    }
}
