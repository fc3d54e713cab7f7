//! Recursive-descent parser for the snippet language.
//!
//! Accepts the JavaScript subset the sandbox runs plus enough TypeScript
//! syntax (annotations, interfaces, type aliases, access modifiers, `as`
//! casts) to skip it. Whatever `normalize` leaves behind is discarded here.

use std::rc::Rc;

use super::ast::{
    AssignOp, BinaryOp, CatchClause, ClassDef, DeclKind, Declarator, Expr, FieldDef, FunctionBody,
    FunctionDef, LogicalOp, MethodDef, MethodKind, Param, Program, PropKey, Property, Stmt,
    SwitchCase, UnaryOp,
};
use super::error::SyntaxError;
use super::lexer::Lexer;
use super::token::{TemplatePart, Token, TokenKind};
use super::value::number_to_string;

/// Nesting limit for statements, expressions and type annotations.
pub const MAX_NESTING: u32 = 128;

const RESERVED: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "readonly",
    "static",
    "abstract",
    "override",
    "declare",
];

type PResult<T> = Result<T, SyntaxError>;

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

fn key_name(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Named(name) => Some(name.clone()),
        PropKey::Computed(_) => None,
    }
}

/// Tokenizes and parses `source` into a program.
///
/// # Errors
///
/// Returns the first lexical or grammatical error, with its position.
pub fn parse(source: &str) -> PResult<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).program()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: u32,
    loop_depth: u32,
    switch_depth: u32,
}

impl Parser {
    #[must_use]
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, line, column, false));
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    /// # Errors
    ///
    /// Returns the first grammatical error in the token stream.
    pub fn program(mut self) -> PResult<Program> {
        let mut body = Vec::new();
        while !self.at_eof() {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    //
    // ─── CURSOR ───────────────────────────────────────────────────────────────
    //

    fn token_at(&self, index: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }

    fn peek(&self) -> &Token {
        self.token_at(self.pos)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.token_at(self.pos + offset)
    }

    fn kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn check_word(&self, word: &str) -> bool {
        self.peek().is_word(word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let token = self.peek();
        SyntaxError::new(message, token.line, token.column)
    }

    fn unexpected(&self) -> SyntaxError {
        let message = match self.kind() {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(_) => "Unexpected number".to_string(),
            TokenKind::Str(_) => "Unexpected string".to_string(),
            TokenKind::Template(_) => "Unexpected template string".to_string(),
            TokenKind::Word(w) if is_reserved(w) => format!("Unexpected token '{w}'"),
            TokenKind::Word(w) => format!("Unexpected identifier '{w}'"),
            other => format!("Unexpected token '{other}'"),
        };
        self.error_here(message)
    }

    fn ident(&mut self) -> PResult<String> {
        match self.kind() {
            TokenKind::Word(w) if !is_reserved(w) => {
                let name = w.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Any word, reserved or not, as used after `.`.
    fn property_name(&mut self) -> PResult<String> {
        match self.kind() {
            TokenKind::Word(w) => {
                let name = w.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn statement_ends(&self) -> bool {
        let token = self.peek();
        token.newline_before
            || matches!(
                token.kind,
                TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
            )
    }

    /// Explicit `;`, or an automatically inserted one before a line break,
    /// `}` or the end of input.
    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Semicolon) || self.statement_ends() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            Err(self.error_here("Maximum nesting depth exceeded"))
        } else {
            Ok(())
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    //
    // ─── STATEMENTS ───────────────────────────────────────────────────────────
    //

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> PResult<Stmt> {
        let TokenKind::Word(word) = self.kind().clone() else {
            return match self.kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    Ok(Stmt::Empty)
                }
                TokenKind::LBrace => Ok(Stmt::Block(self.block()?)),
                _ => self.expression_statement(),
            };
        };
        let next_is_word = matches!(self.peek_at(1).kind, TokenKind::Word(_));
        match word.as_str() {
            "let" | "const" | "var" => {
                let stmt = self.declaration()?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            "function" if next_is_word => {
                self.advance();
                let name = self.ident()?;
                let def = self.function_tail(Some(name), false)?;
                Ok(Stmt::Function(Rc::new(def)))
            }
            "class" => Ok(Stmt::Class(Rc::new(self.class()?))),
            "abstract" if self.peek_at(1).is_word("class") => {
                self.advance();
                Ok(Stmt::Class(Rc::new(self.class()?)))
            }
            "interface" if next_is_word => {
                self.skip_interface()?;
                Ok(Stmt::Empty)
            }
            "type"
                if next_is_word
                    && matches!(self.peek_at(2).kind, TokenKind::Assign | TokenKind::Lt) =>
            {
                self.skip_type_alias()?;
                Ok(Stmt::Empty)
            }
            "if" => self.if_statement(),
            "while" => {
                self.advance();
                let test = self.paren_expression()?;
                let body = self.loop_body()?;
                Ok(Stmt::While { test, body })
            }
            "do" => {
                self.advance();
                let body = self.loop_body()?;
                if !self.eat_word("while") {
                    return Err(self.unexpected());
                }
                let test = self.paren_expression()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::DoWhile { body, test })
            }
            "for" => self.for_statement(),
            "switch" => self.switch_statement(),
            "try" => self.try_statement(),
            "return" => {
                self.advance();
                let argument = if self.statement_ends() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(argument))
            }
            "break" => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(self.error_here("Illegal break statement"));
                }
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                if self.loop_depth == 0 {
                    return Err(self.error_here(
                        "Illegal continue statement: no surrounding iteration statement",
                    ));
                }
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Continue)
            }
            "throw" => {
                self.advance();
                if self.peek().newline_before {
                    return Err(self.error_here("Illegal newline after throw"));
                }
                let argument = self.expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(argument))
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn decl_kind(&mut self) -> PResult<DeclKind> {
        let kind = match self.kind() {
            TokenKind::Word(w) if w == "let" => DeclKind::Let,
            TokenKind::Word(w) if w == "const" => DeclKind::Const,
            TokenKind::Word(w) if w == "var" => DeclKind::Var,
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(kind)
    }

    /// A declared name with its optional `!` and `: Type`.
    fn binding_name(&mut self) -> PResult<String> {
        let name = self.ident()?;
        self.eat(&TokenKind::Bang);
        if self.eat(&TokenKind::Colon) {
            self.skip_type()?;
        }
        Ok(name)
    }

    fn declaration(&mut self) -> PResult<Stmt> {
        let kind = self.decl_kind()?;
        let name = self.binding_name()?;
        self.declarators(kind, name)
    }

    fn declarators(&mut self, kind: DeclKind, first: String) -> PResult<Stmt> {
        let mut declarators = Vec::new();
        let mut name = first;
        loop {
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.assignment()?)
            } else if kind == DeclKind::Const {
                return Err(self.error_here("Missing initializer in const declaration"));
            } else {
                None
            };
            declarators.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            name = self.binding_name()?;
        }
        Ok(Stmt::Decl { kind, declarators })
    }

    fn paren_expression(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        let test = self.paren_expression()?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_word("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn loop_body(&mut self) -> PResult<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let mut init = None;
        if self.check_word("let") || self.check_word("const") || self.check_word("var") {
            let kind = self.decl_kind()?;
            let name = self.binding_name()?;
            if let Some(stmt) = self.for_each_tail(Some(kind), &name)? {
                return Ok(stmt);
            }
            init = Some(Box::new(self.declarators(kind, name)?));
        } else if !self.check(&TokenKind::Semicolon) {
            let loose_name = match self.kind() {
                TokenKind::Word(w)
                    if !is_reserved(w)
                        && (self.peek_at(1).is_word("of") || self.peek_at(1).is_word("in")) =>
                {
                    Some(w.clone())
                }
                _ => None,
            };
            if let Some(name) = loose_name {
                self.advance();
                if let Some(stmt) = self.for_each_tail(None, &name)? {
                    return Ok(stmt);
                }
            }
            init = Some(Box::new(Stmt::Expr(self.expression()?)));
        }
        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.loop_body()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    /// The `of expr) body` / `in expr) body` rest of a for-each loop, if the
    /// cursor is on `of` or `in`.
    fn for_each_tail(&mut self, kind: Option<DeclKind>, name: &str) -> PResult<Option<Stmt>> {
        let is_of = if self.eat_word("of") {
            true
        } else if self.eat_word("in") {
            false
        } else {
            return Ok(None);
        };
        let subject = self.assignment()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.loop_body()?;
        let name = name.to_string();
        Ok(Some(if is_of {
            Stmt::ForOf {
                kind,
                name,
                iterable: subject,
                body,
            }
        } else {
            Stmt::ForIn {
                kind,
                name,
                object: subject,
                body,
            }
        }))
    }

    fn switch_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        let discriminant = self.paren_expression()?;
        self.expect(&TokenKind::LBrace)?;
        self.switch_depth += 1;
        let cases = self.switch_cases();
        self.switch_depth -= 1;
        let cases = cases?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn switch_cases(&mut self) -> PResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) {
            let test = if self.eat_word("case") {
                Some(self.expression()?)
            } else if self.check_word("default") {
                if seen_default {
                    return Err(self.error_here("More than one default clause in switch statement"));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !(self.check_word("case")
                || self.check_word("default")
                || self.check(&TokenKind::RBrace))
            {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(cases)
    }

    fn try_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        let block = self.block()?;
        let handler = if self.eat_word("catch") {
            let param = if self.eat(&TokenKind::LParen) {
                let name = self.binding_name()?;
                self.expect(&TokenKind::RParen)?;
                Some(name)
            } else {
                None
            };
            let body = self.block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_word("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("Missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    //
    // ─── FUNCTIONS AND CLASSES ────────────────────────────────────────────────
    //

    /// Everything after `function name`: type parameters, parameters,
    /// return type and body.
    fn function_tail(&mut self, name: Option<String>, allow_fields: bool) -> PResult<FunctionDef> {
        if self.check(&TokenKind::Lt) {
            self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
        }
        let params = self.params(allow_fields)?;
        if self.eat(&TokenKind::Colon) {
            self.skip_type()?;
        }
        let body = self.function_body()?;
        Ok(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            arrow: false,
        })
    }

    fn function_body(&mut self) -> PResult<Vec<Stmt>> {
        let saved = (self.loop_depth, self.switch_depth);
        self.loop_depth = 0;
        self.switch_depth = 0;
        let body = self.block();
        (self.loop_depth, self.switch_depth) = saved;
        body
    }

    fn params(&mut self, allow_fields: bool) -> PResult<Vec<Param>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let mut field = false;
            while allow_fields && self.at_modifier() {
                self.advance();
                field = true;
            }
            let rest = self.eat(&TokenKind::Ellipsis);
            let name = self.ident()?;
            self.eat(&TokenKind::Question);
            if self.eat(&TokenKind::Colon) {
                self.skip_type()?;
            }
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                rest,
                field,
            });
            if rest || !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn at_modifier(&self) -> bool {
        matches!(self.kind(), TokenKind::Word(w) if MODIFIERS.contains(&w.as_str()))
            && self.next_is_property_name()
    }

    fn next_is_property_name(&self) -> bool {
        matches!(
            self.peek_at(1).kind,
            TokenKind::Word(_) | TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::LBracket
        )
    }

    fn property_key(&mut self) -> PResult<PropKey> {
        let key = match self.kind().clone() {
            TokenKind::Word(w) | TokenKind::Str(w) => PropKey::Named(w),
            TokenKind::Number(n) => PropKey::Named(number_to_string(n)),
            TokenKind::LBracket => {
                self.advance();
                let expr = self.assignment()?;
                self.expect(&TokenKind::RBracket)?;
                return Ok(PropKey::Computed(Box::new(expr)));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(key)
    }

    fn accessor_kind(&mut self) -> MethodKind {
        let kind = if self.check_word("get") {
            MethodKind::Getter
        } else if self.check_word("set") {
            MethodKind::Setter
        } else {
            return MethodKind::Method;
        };
        if self.next_is_property_name() {
            self.advance();
            kind
        } else {
            MethodKind::Method
        }
    }

    fn class(&mut self) -> PResult<ClassDef> {
        self.advance();
        let name = match self.kind() {
            TokenKind::Word(w) if w != "extends" && w != "implements" => Some(self.ident()?),
            _ => None,
        };
        if self.check(&TokenKind::Lt) {
            self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
        }
        let parent = if self.eat_word("extends") {
            let parent = self.class_heritage()?;
            if self.check(&TokenKind::Lt) {
                self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
            }
            Some(parent)
        } else {
            None
        };
        if self.eat_word("implements") {
            loop {
                self.skip_type_primary()?;
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::LBrace)?;
        let mut def = ClassDef {
            name,
            parent,
            constructor: None,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        while !self.eat(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            self.class_member(&mut def)?;
        }
        Ok(def)
    }

    /// `Base` or `ns.Base` after `extends`.
    fn class_heritage(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::Dot) {
            let property = self.property_name()?;
            expr = Expr::Member {
                object: Box::new(expr),
                property,
                optional: false,
            };
        }
        Ok(expr)
    }

    fn class_member(&mut self, def: &mut ClassDef) -> PResult<()> {
        let mut is_static = false;
        while self.at_modifier() {
            is_static |= self.check_word("static");
            self.advance();
        }
        let kind = self.accessor_kind();
        let key = self.property_key()?;
        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            let is_constructor = !is_static
                && kind == MethodKind::Method
                && matches!(&key, PropKey::Named(n) if n == "constructor");
            let func = Rc::new(self.function_tail(key_name(&key), is_constructor)?);
            if is_constructor {
                if def.constructor.is_some() {
                    return Err(self.error_here("A class may only have one constructor"));
                }
                def.constructor = Some(func);
            } else {
                def.methods.push(MethodDef {
                    key,
                    kind,
                    func,
                    is_static,
                });
            }
            return Ok(());
        }
        if kind != MethodKind::Method {
            return Err(self.unexpected());
        }
        self.eat(&TokenKind::Question);
        self.eat(&TokenKind::Bang);
        if self.eat(&TokenKind::Colon) {
            self.skip_type()?;
        }
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.assignment()?)
        } else {
            None
        };
        self.consume_semicolon()?;
        def.fields.push(FieldDef {
            key,
            init,
            is_static,
        });
        Ok(())
    }

    //
    // ─── TYPE SYNTAX ──────────────────────────────────────────────────────────
    //

    fn skip_interface(&mut self) -> PResult<()> {
        self.advance();
        self.ident()?;
        if self.check(&TokenKind::Lt) {
            self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
        }
        if self.eat_word("extends") {
            loop {
                self.skip_type_primary()?;
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)
    }

    fn skip_type_alias(&mut self) -> PResult<()> {
        self.advance();
        self.ident()?;
        if self.check(&TokenKind::Lt) {
            self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
        }
        self.expect(&TokenKind::Assign)?;
        self.skip_type()?;
        self.consume_semicolon()
    }

    /// Skips from `open` to its matching `close`, inclusive.
    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> PResult<()> {
        self.expect(open)?;
        let mut depth = 1u32;
        while depth > 0 {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            let token = self.advance();
            if &token.kind == open {
                depth += 1;
            } else if &token.kind == close {
                depth -= 1;
            }
        }
        Ok(())
    }

    fn skip_type(&mut self) -> PResult<()> {
        self.nested(|parser| {
            if !parser.eat(&TokenKind::Pipe) {
                parser.eat(&TokenKind::Amp);
            }
            loop {
                parser.skip_type_primary()?;
                while parser.check(&TokenKind::LBracket)
                    && parser.peek_at(1).kind == TokenKind::RBracket
                {
                    parser.advance();
                    parser.advance();
                }
                if !(parser.eat(&TokenKind::Pipe) || parser.eat(&TokenKind::Amp)) {
                    return Ok(());
                }
            }
        })
    }

    fn skip_type_primary(&mut self) -> PResult<()> {
        match self.kind().clone() {
            TokenKind::Word(w) => {
                self.advance();
                if matches!(w.as_str(), "keyof" | "typeof" | "readonly" | "unique" | "infer") {
                    return self.nested(Self::skip_type_primary);
                }
                while self.eat(&TokenKind::Dot) {
                    self.property_name()?;
                }
                if self.check(&TokenKind::Lt) {
                    self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
                }
                Ok(())
            }
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Template(_) => {
                self.advance();
                Ok(())
            }
            TokenKind::Minus if matches!(self.peek_at(1).kind, TokenKind::Number(_)) => {
                self.advance();
                self.advance();
                Ok(())
            }
            TokenKind::LBrace => self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace),
            TokenKind::LBracket => self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket),
            TokenKind::LParen => {
                self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                if self.eat(&TokenKind::Arrow) {
                    self.skip_type()?;
                }
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }

    //
    // ─── EXPRESSIONS ──────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns the first grammatical error.
    pub fn expression(&mut self) -> PResult<Expr> {
        let first = self.assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> PResult<Expr> {
        if self.arrow_ahead() {
            return self.arrow_function();
        }
        let target = self.conditional()?;
        let op = match self.kind() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Binary(BinaryOp::Add),
            TokenKind::MinusAssign => AssignOp::Binary(BinaryOp::Sub),
            TokenKind::StarAssign => AssignOp::Binary(BinaryOp::Mul),
            TokenKind::SlashAssign => AssignOp::Binary(BinaryOp::Div),
            TokenKind::PercentAssign => AssignOp::Binary(BinaryOp::Rem),
            TokenKind::StarStarAssign => AssignOp::Binary(BinaryOp::Pow),
            TokenKind::AmpAmpAssign => AssignOp::Logical(LogicalOp::And),
            TokenKind::PipePipeAssign => AssignOp::Logical(LogicalOp::Or),
            TokenKind::QuestionQuestionAssign => AssignOp::Logical(LogicalOp::Nullish),
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(self.error_here("Invalid left-hand side in assignment"));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn arrow_ahead(&self) -> bool {
        match self.kind() {
            TokenKind::Word(w) if !is_reserved(w) => {
                let next = self.peek_at(1);
                next.kind == TokenKind::Arrow && !next.newline_before
            }
            TokenKind::LParen => {
                let Some(close) = self.matching_paren(self.pos) else {
                    return false;
                };
                match self.token_at(close + 1).kind {
                    TokenKind::Arrow => true,
                    TokenKind::Colon => self.type_then_arrow(close + 2),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0i32;
        for (index, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return (token.kind == TokenKind::RParen).then_some(index);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }

    /// Whether the tokens from `start` look like a return type followed by `=>`.
    fn type_then_arrow(&self, start: usize) -> bool {
        let mut depth = 0i32;
        for token in self.tokens.iter().skip(start) {
            match token.kind {
                TokenKind::Arrow if depth == 0 => return true,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace | TokenKind::Lt => {
                    depth += 1;
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace | TokenKind::Gt => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                TokenKind::Word(_)
                | TokenKind::Dot
                | TokenKind::Pipe
                | TokenKind::Amp
                | TokenKind::Str(_)
                | TokenKind::Number(_) => {}
                TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Semicolon
                | TokenKind::Question
                | TokenKind::Arrow
                    if depth > 0 => {}
                _ => return false,
            }
        }
        false
    }

    fn arrow_function(&mut self) -> PResult<Expr> {
        let params = if matches!(self.kind(), TokenKind::Word(_)) {
            let name = self.ident()?;
            vec![Param {
                name,
                default: None,
                rest: false,
                field: false,
            }]
        } else {
            let params = self.params(false)?;
            if self.eat(&TokenKind::Colon) {
                self.skip_type()?;
            }
            params
        };
        self.expect(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.function_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            arrow: true,
        })))
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let test = self.logical_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.logical_and()?;
        loop {
            let op = match self.kind() {
                TokenKind::PipePipe => LogicalOp::Or,
                TokenKind::QuestionQuestion => LogicalOp::Nullish,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.logical_and()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> PResult<Expr>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> PResult<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = op_for(self.kind()) {
            self.advance();
            let right = operand(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_chain(Self::relational, |kind| match kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::BangEq => Some(BinaryOp::NotEq),
            TokenKind::EqEqEq => Some(BinaryOp::StrictEq),
            TokenKind::BangEqEq => Some(BinaryOp::StrictNotEq),
            _ => None,
        })
    }

    fn relational(&mut self) -> PResult<Expr> {
        self.binary_chain(Self::additive, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            TokenKind::Word(w) if w == "instanceof" => Some(BinaryOp::InstanceOf),
            TokenKind::Word(w) if w == "in" => Some(BinaryOp::In),
            _ => None,
        })
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary_chain(Self::multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary_chain(Self::exponent, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn exponent(&mut self) -> PResult<Expr> {
        let base = self.unary()?;
        if !self.eat(&TokenKind::StarStar) {
            return Ok(base);
        }
        let exponent = self.nested(Self::exponent)?;
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn unary(&mut self) -> PResult<Expr> {
        self.nested(Self::unary_inner)
    }

    fn unary_inner(&mut self) -> PResult<Expr> {
        let op = match self.kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Word(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Word(w) if w == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
            });
        }
        let increment = match self.kind() {
            TokenKind::PlusPlus => Some(true),
            TokenKind::MinusMinus => Some(false),
            _ => None,
        };
        if let Some(increment) = increment {
            self.advance();
            let target = self.unary()?;
            if !target.is_assignable() {
                return Err(
                    self.error_here("Invalid left-hand side expression in prefix operation")
                );
            }
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call_member()?;
        let increment = match self.kind() {
            TokenKind::PlusPlus => true,
            TokenKind::MinusMinus => false,
            _ => return Ok(expr),
        };
        if self.peek().newline_before {
            return Ok(expr);
        }
        if !expr.is_assignable() {
            return Err(self.error_here("Invalid left-hand side expression in postfix operation"));
        }
        self.advance();
        Ok(Expr::Update {
            increment,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn call_member(&mut self) -> PResult<Expr> {
        let mut expr = if self.check_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    };
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    expr = if self.check(&TokenKind::LParen) {
                        Expr::Call {
                            callee: Box::new(expr),
                            args: self.arguments()?,
                            optional: true,
                        }
                    } else if self.eat(&TokenKind::LBracket) {
                        let index = self.expression()?;
                        self.expect(&TokenKind::RBracket)?;
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: true,
                        }
                    } else {
                        Expr::Member {
                            object: Box::new(expr),
                            property: self.property_name()?,
                            optional: true,
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                TokenKind::LParen => {
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    };
                }
                // Non-null assertion.
                TokenKind::Bang if !self.peek().newline_before => {
                    self.advance();
                }
                TokenKind::Word(w) if w == "as" && !self.peek().newline_before => {
                    self.advance();
                    self.skip_type()?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn new_expression(&mut self) -> PResult<Expr> {
        self.advance();
        let mut callee = if self.check_word("new") {
            self.nested(Self::new_expression)?
        } else {
            self.primary()?
        };
        loop {
            if self.eat(&TokenKind::Dot) {
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: self.property_name()?,
                    optional: false,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket)?;
                callee = Expr::Index {
                    object: Box::new(callee),
                    index: Box::new(index),
                    optional: false,
                };
            } else {
                break;
            }
        }
        if self.check(&TokenKind::Lt) {
            self.skip_balanced(&TokenKind::Lt, &TokenKind::Gt)?;
        }
        let args = if self.check(&TokenKind::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn spread_or_assignment(&mut self) -> PResult<Expr> {
        if self.eat(&TokenKind::Ellipsis) {
            Ok(Expr::Spread(Box::new(self.assignment()?)))
        } else {
            self.assignment()
        }
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.spread_or_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let word = match self.kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                return Ok(Expr::Number(n));
            }
            TokenKind::Str(s) => {
                self.advance();
                return Ok(Expr::Str(s));
            }
            TokenKind::Template(parts) => {
                self.advance();
                return self.template(parts);
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => return self.array_literal(),
            TokenKind::LBrace => return self.object_literal(),
            TokenKind::Word(w) => w,
            _ => return Err(self.unexpected()),
        };
        let expr = match word.as_str() {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "null" => Expr::Null,
            "undefined" => Expr::Undefined,
            "this" => Expr::This,
            "function" => {
                self.advance();
                let name = match self.kind() {
                    TokenKind::Word(w) if !is_reserved(w) => Some(self.ident()?),
                    _ => None,
                };
                return Ok(Expr::Function(Rc::new(self.function_tail(name, false)?)));
            }
            "class" => return Ok(Expr::Class(Rc::new(self.class()?))),
            "super" => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    return Ok(Expr::SuperCall(self.arguments()?));
                }
                if self.eat(&TokenKind::Dot) {
                    return Ok(Expr::SuperMember(self.property_name()?));
                }
                return Err(self.unexpected());
            }
            _ if is_reserved(&word) => return Err(self.unexpected()),
            _ => Expr::Ident(word),
        };
        self.advance();
        Ok(expr)
    }

    fn template(&mut self, parts: Vec<TemplatePart>) -> PResult<Expr> {
        let mut quasis = vec![String::new()];
        let mut exprs = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) => {
                    if let Some(last) = quasis.last_mut() {
                        last.push_str(&text);
                    }
                }
                TemplatePart::Expr(tokens) => {
                    let mut inner = Parser::new(tokens);
                    inner.depth = self.depth;
                    let expr = inner.expression()?;
                    if !inner.at_eof() {
                        return Err(inner.unexpected());
                    }
                    exprs.push(expr);
                    quasis.push(String::new());
                }
            }
        }
        Ok(Expr::Template { quasis, exprs })
    }

    fn array_literal(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LBracket)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::Comma) {
                items.push(Expr::Undefined);
                continue;
            }
            items.push(self.spread_or_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::Array(items))
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LBrace)?;
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Ellipsis) {
                props.push(Property::Spread(self.assignment()?));
            } else {
                props.push(self.object_property()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Object(props))
    }

    fn object_property(&mut self) -> PResult<Property> {
        let kind = self.accessor_kind();
        let shorthand = match self.kind() {
            TokenKind::Word(w) if !is_reserved(w) => Some(w.clone()),
            _ => None,
        };
        let key = self.property_key()?;
        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            let func = Rc::new(self.function_tail(key_name(&key), false)?);
            return Ok(Property::Method { key, kind, func });
        }
        if kind != MethodKind::Method {
            return Err(self.unexpected());
        }
        if self.eat(&TokenKind::Colon) {
            let value = self.assignment()?;
            return Ok(Property::Value { key, value });
        }
        match shorthand {
            Some(name) if matches!(key, PropKey::Named(_)) => Ok(Property::Value {
                key,
                value: Expr::Ident(name),
            }),
            _ => Err(self.unexpected()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        match parse(source) {
            Ok(program) => program,
            Err(err) => panic!("failed to parse {source:?}: {err}"),
        }
    }

    fn parse_err(source: &str) -> SyntaxError {
        match parse(source) {
            Ok(program) => panic!("expected a syntax error for {source:?}, got {program:?}"),
            Err(err) => err,
        }
    }

    #[test]
    fn parses_declarations_with_annotations() {
        let program = parse_ok("let name: string = \"Alex\";\nconst fuel: number[] = [1, 2]");
        assert_eq!(program.len(), 2);
        let Stmt::Decl { kind, declarators } = &program[1] else {
            panic!("expected a declaration");
        };
        assert_eq!(*kind, DeclKind::Const);
        assert_eq!(declarators[0].name, "fuel");
        assert!(matches!(declarators[0].init, Some(Expr::Array(ref items)) if items.len() == 2));
    }

    #[test]
    fn inserts_semicolons_at_line_breaks() {
        let program = parse_ok("let a = 1\nlet b = a\nconsole.log(b)");
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn rejects_two_statements_on_one_line() {
        let err = parse_err("let a = 1 let b = 2");
        assert_eq!(err.message, "Unexpected token 'let'");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn skips_interfaces_and_type_aliases() {
        let program = parse_ok(
            "interface Planet { name: string; moons: number }\n\
             type Id = string | number;\n\
             let mars: Planet = { name: \"Mars\", moons: 2 };",
        );
        assert_eq!(program.len(), 3);
        assert_eq!(program[0], Stmt::Empty);
        assert_eq!(program[1], Stmt::Empty);
    }

    #[test]
    fn parses_typed_functions_and_arrows() {
        let program = parse_ok(
            "function add(a: number, b: number = 2): number { return a + b }\n\
             const double = (x: number): number => x * 2;\n\
             const greet = name => `Hi ${name}`;",
        );
        let Stmt::Function(def) = &program[0] else {
            panic!("expected a function declaration");
        };
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
        let Stmt::Decl { declarators, .. } = &program[1] else {
            panic!("expected a declaration");
        };
        assert!(matches!(&declarators[0].init, Some(Expr::Function(f)) if f.arrow));
    }

    #[test]
    fn parenthesised_expression_is_not_an_arrow() {
        let program = parse_ok("let x = (1 + 2) * 3; let y = ok ? (a) : b;");
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn parses_classes_with_modifiers() {
        let program = parse_ok(
            "class Astronaut {\n\
               private energy: number = 100;\n\
               static count = 0;\n\
               constructor(public name: string, private rank: string) {}\n\
               get title(): string { return this.rank + ' ' + this.name }\n\
               explore(): void { this.energy -= 20 }\n\
             }",
        );
        let Stmt::Class(def) = &program[0] else {
            panic!("expected a class");
        };
        assert_eq!(def.name.as_deref(), Some("Astronaut"));
        assert_eq!(def.fields.len(), 2);
        assert!(def.fields[1].is_static);
        let ctor = def.constructor.as_ref().map(|c| c.params.clone());
        assert!(ctor.is_some_and(|params| params.iter().all(|p| p.field)));
        assert_eq!(def.methods.len(), 2);
        assert_eq!(def.methods[0].kind, MethodKind::Getter);
    }

    #[test]
    fn parses_template_expressions() {
        let program = parse_ok("`${name} is traveling at ${speed * 2} km/h`");
        let Stmt::Expr(Expr::Template { quasis, exprs }) = &program[0] else {
            panic!("expected a template");
        };
        assert_eq!(quasis.len(), 3);
        assert_eq!(quasis[1], " is traveling at ");
        assert_eq!(exprs.len(), 2);
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert_eq!(parse_err("break;").message, "Illegal break statement");
        let err = parse_err("while (true) { function f() { continue; } }");
        assert!(err.message.starts_with("Illegal continue statement"));
    }

    #[test]
    fn const_requires_initializer() {
        assert_eq!(
            parse_err("const x;").message,
            "Missing initializer in const declaration"
        );
    }

    #[test]
    fn reports_unexpected_end_of_input() {
        let err = parse_err("function f() {");
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let err = parse_err("1 = 2;");
        assert_eq!(err.message, "Invalid left-hand side in assignment");
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let source = format!("{}1{}", "(".repeat(400), ")".repeat(400));
        let err = parse_err(&source);
        assert_eq!(err.message, "Maximum nesting depth exceeded");
    }

    #[test]
    fn parses_for_loops() {
        let program = parse_ok(
            "for (let i = 0; i < 3; i++) {}\n\
             for (const p of planets) { console.log(p) }\n\
             for (const k in obj) {}\n\
             for (;;) { break }",
        );
        assert!(matches!(program[0], Stmt::For { .. }));
        assert!(matches!(program[1], Stmt::ForOf { kind: Some(DeclKind::Const), .. }));
        assert!(matches!(program[2], Stmt::ForIn { .. }));
        assert!(matches!(program[3], Stmt::For { init: None, test: None, .. }));
    }

    #[test]
    fn parses_casts_and_non_null_assertions() {
        let program = parse_ok("let n = (value as number) + list!.length;");
        assert_eq!(program.len(), 1);
    }
}
