use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::error::CompileError;
use super::lexer::{SpannedToken, Token};
use super::scope::{Frame, ScopeTracker};
use super::visit::{rewrite_block, Rewrite, Role, Visit};

pub fn parse(tokens: Vec<SpannedToken>) -> Result<Program, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Parse a lone expression, as handed to `Eval`, surrounded by optional
/// line breaks.
pub fn parse_expression(tokens: Vec<SpannedToken>) -> Result<Expr, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.skip_terminators();
    let expr = parser.parse_expr()?;
    parser.skip_terminators();
    if !parser.at_eof() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Nesting depth of single-line `If` statements; inside one, `Else` and
    /// `End` also terminate a statement.
    inline_if: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            inline_if: 0,
        }
    }

    fn parse_program(&mut self) -> Result<Program, CompileError> {
        let body = self.parse_block(|_| false)?;
        if !self.at_eof() {
            return Err(self.unexpected("end of input"));
        }
        Ok(Program { body })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(Span::default(), |t| t.span)
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.prev_end().max(start.end))
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Whether whitespace separates the current token from the previous one.
    fn space_before(&self) -> bool {
        self.pos > 0 && self.prev_end() < self.span().start
    }

    fn advance(&mut self) -> Span {
        let span = self.span();
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        span
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{expected:?}")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        if let Token::Ident(name) = self.peek().clone() {
            let sp = self.advance();
            Ok((name, sp))
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// Soft keywords (`To`, `Step`, `Each`, `In`, ...) are lexed as identifiers.
    fn is_soft(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(w) if w.eq_ignore_ascii_case(word))
    }

    fn eat_soft(&mut self, word: &str) -> bool {
        if self.is_soft(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_soft(&mut self, word: &str) -> Result<(), CompileError> {
        if self.eat_soft(word) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{word}'")))
        }
    }

    /// `End <keyword>`
    fn expect_end(&mut self, keyword: &Token) -> Result<(), CompileError> {
        if self.peek() == &Token::End && self.peek_at(1) == keyword {
            self.advance();
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("End {keyword:?}")))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::parser(format!("Expected {expected}, got {:?}", self.peek()), self.span())
    }

    fn skip_terminators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Colon) {
            self.advance();
        }
    }

    fn at_stmt_end(&self) -> bool {
        match self.peek() {
            Token::Newline | Token::Colon | Token::Eof => true,
            Token::Else | Token::End => self.inline_if > 0,
            _ => false,
        }
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_block(&mut self, is_end: impl Fn(&Token) -> bool) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_eof() || is_end(self.peek()) {
                return Ok(stmts);
            }
            self.parse_stmt(&mut stmts)?;
            if !self.at_stmt_end() && !is_end(self.peek()) {
                return Err(self.unexpected("end of statement"));
            }
        }
    }

    /// Parse one source statement, appending zero or more statements.
    fn parse_stmt(&mut self, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
        let start = self.span();
        match self.peek() {
            Token::Option => {
                self.advance();
                self.expect_soft("Explicit")?;
            }
            Token::On => self.parse_on_error()?,
            Token::Private | Token::Public => {
                self.advance();
                self.eat_soft("Default");
                match self.peek() {
                    Token::Sub | Token::Function | Token::Property | Token::Const | Token::Class => {
                        self.parse_stmt(out)?;
                    }
                    _ => out.push(self.parse_dim(start)?),
                }
            }
            Token::Dim => {
                self.advance();
                out.push(self.parse_dim(start)?);
            }
            Token::Const => out.push(self.parse_const()?),
            Token::ReDim => self.parse_redim(out)?,
            Token::Set => {
                self.advance();
                out.push(self.parse_expr_stmt()?);
            }
            Token::Call => out.push(self.parse_call_stmt()?),
            Token::Sub | Token::Function | Token::Property => {
                let decl = self.parse_procedure(start)?;
                out.push(Stmt::new(StmtKind::Function(decl), self.span_from(start)));
            }
            Token::Class => out.push(self.parse_class()?),
            Token::Exit => out.push(self.parse_exit()?),
            Token::If => out.push(self.parse_if()?),
            Token::For => out.push(self.parse_for()?),
            Token::Do => out.push(self.parse_do()?),
            Token::While => out.push(self.parse_while()?),
            Token::Select => out.push(self.parse_select()?),
            _ => out.push(self.parse_expr_stmt()?),
        }
        Ok(())
    }

    /// `On Error Resume Next` / `On Error Goto 0` carry no output.
    fn parse_on_error(&mut self) -> Result<(), CompileError> {
        self.advance();
        self.expect_soft("Error")?;
        while !self.at_stmt_end() {
            self.advance();
        }
        Ok(())
    }

    fn parse_dim(&mut self, start: Span) -> Result<Stmt, CompileError> {
        let mut declarators = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            let init = self.parse_dimensions()?;
            declarators.push(Declarator { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::new(
            StmtKind::VarDecl {
                kind: VarKind::Let,
                declarators,
            },
            self.span_from(start),
        ))
    }

    /// Optional `(n, m)` array bounds after a declared name.
    fn parse_dimensions(&mut self) -> Result<Option<Expr>, CompileError> {
        if !self.eat(&Token::LParen) {
            return Ok(None);
        }
        let bounds = self.parse_args()?;
        Ok(Some(Expr::helper_call(
            "dim",
            vec![Expr::synthetic(ExprKind::Array(bounds))],
        )))
    }

    fn parse_const(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let mut declarators = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            self.expect(&Token::Eq)?;
            let value = self.parse_expr()?;
            declarators.push(Declarator {
                name,
                init: Some(value),
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::new(
            StmtKind::VarDecl {
                kind: VarKind::Const,
                declarators,
            },
            self.span_from(start),
        ))
    }

    /// `ReDim [Preserve] a(n)` becomes `a = __vbs.redim(a, [n], preserve)`.
    fn parse_redim(&mut self, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
        self.advance();
        let preserve = self.eat_soft("Preserve");
        loop {
            let start = self.span();
            let (name, span) = self.expect_ident()?;
            self.expect(&Token::LParen)?;
            let bounds = self.parse_args()?;
            let target = Expr::new(ExprKind::Ident(name), span);
            let value = Expr::helper_call(
                "redim",
                vec![
                    target.clone(),
                    Expr::synthetic(ExprKind::Array(bounds)),
                    Expr::synthetic(ExprKind::Bool(preserve)),
                ],
            );
            out.push(Stmt::new(
                StmtKind::Expr(Expr::assign(target, value)),
                self.span_from(start),
            ));
            if !self.eat(&Token::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_call_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let expr = self.parse_postfix(true)?;
        let call = match expr.kind {
            ExprKind::Call { .. } => expr,
            ExprKind::Ident(_) | ExprKind::Member { .. } => Expr::call(expr, Vec::new()),
            _ => {
                return Err(CompileError::parser(
                    "Expected a procedure call after 'Call'",
                    expr.span,
                ))
            }
        };
        Ok(Stmt::new(StmtKind::Expr(call), self.span_from(start)))
    }

    /// Assignments and procedure calls.
    ///
    /// The statement head is parsed without letting a whitespace-separated
    /// `(` start an argument list, so `Foo (0), -2` and `Foo(0)` can be told
    /// apart. What follows the head decides the statement's shape.
    fn parse_expr_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.span();
        let head = self.parse_postfix(false)?;

        if self.eat(&Token::Eq) {
            let value = self.parse_expr()?;
            let target = into_assign_target(head)?;
            return Ok(Stmt::new(
                StmtKind::Expr(Expr::assign(target, value)),
                self.span_from(start),
            ));
        }

        if !is_callable(&head) {
            return Err(CompileError::parser("Expected an assignment or a procedure call", head.span));
        }

        let call = if self.at_stmt_end() {
            match head.kind {
                ExprKind::Call { .. } => head,
                _ => Expr::call(head, Vec::new()),
            }
        } else if matches!(self.peek(), Token::Comma) {
            // `Foo(0), -2`: the parenthesized first argument was taken as a call
            match head.kind {
                ExprKind::Call { callee, mut args } if args.len() == 1 => {
                    self.advance();
                    args.extend(self.parse_arg_list()?);
                    Expr::call(*callee, args)
                }
                _ => return Err(self.unexpected("end of statement")),
            }
        } else {
            let args = self.parse_implicit_args()?;
            Expr::call(head, args)
        };
        let span = self.span_from(start);
        Ok(Stmt::new(StmtKind::Expr(Expr { span, ..call }), span))
    }

    /// Arguments of an implicit call statement (`Foo a, b`).
    fn parse_implicit_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        // `Foo (a, b)`: a parenthesized list spanning the whole argument list
        if matches!(self.peek(), Token::LParen) {
            let save = self.pos;
            self.advance();
            if let Ok(args) = self.parse_args() {
                if args.len() != 1 && self.at_stmt_end() {
                    return Ok(args);
                }
            }
            self.pos = save;
        }
        self.parse_arg_list()
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            args.push(self.parse_expr()?);
        }
        Ok(args)
    }

    // ── Procedures ────────────────────────────────────────────────

    /// `Sub`, `Function` or `Property Get|Let|Set` through its `End` line.
    fn parse_procedure(&mut self, start: Span) -> Result<FunctionDecl, CompileError> {
        let (kind, end) = match self.peek() {
            Token::Sub => (ProcKind::Sub, Token::Sub),
            Token::Function => (ProcKind::Function, Token::Function),
            Token::Property => {
                self.advance();
                let kind = match self.peek() {
                    Token::Set => ProcKind::PropertySet,
                    Token::Ident(w) if w.eq_ignore_ascii_case("get") => ProcKind::PropertyGet,
                    Token::Ident(w) if w.eq_ignore_ascii_case("let") => ProcKind::PropertyLet,
                    _ => return Err(self.unexpected("'Get', 'Let' or 'Set'")),
                };
                (kind, Token::Property)
            }
            _ => return Err(self.unexpected("'Sub', 'Function' or 'Property'")),
        };
        self.advance();

        let (name, _) = self.expect_ident()?;
        let params = if self.eat(&Token::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        let body = self.parse_block(|t| matches!(t, Token::End))?;
        self.expect_end(&end)?;

        Ok(FunctionDecl {
            name,
            kind,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(params);
        }
        loop {
            let mode = match self.peek() {
                Token::ByVal => {
                    self.advance();
                    PassingMode::ByVal
                }
                Token::ByRef => {
                    self.advance();
                    PassingMode::ByRef
                }
                _ => PassingMode::ByRef,
            };
            let (name, span) = self.expect_ident()?;
            // `arr()` marks an array parameter
            if self.eat(&Token::LParen) {
                self.expect(&Token::RParen)?;
            }
            params.push(Param { name, mode, span });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_class(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let (name, _) = self.expect_ident()?;
        let mut fields = Vec::new();
        let mut procedures = Vec::new();

        loop {
            self.skip_terminators();
            if matches!(self.peek(), Token::End | Token::Eof) {
                break;
            }
            let member_start = self.span();
            let modified = matches!(self.peek(), Token::Private | Token::Public | Token::Dim);
            if modified {
                self.advance();
                self.eat_soft("Default");
            }
            match self.peek() {
                Token::Sub | Token::Function | Token::Property => {
                    procedures.push(self.parse_procedure(member_start)?);
                }
                Token::Const => {
                    if let StmtKind::VarDecl { declarators, .. } = self.parse_const()?.kind {
                        fields.extend(declarators);
                    }
                }
                Token::Ident(_) if modified => {
                    if let StmtKind::VarDecl { declarators, .. } = self.parse_dim(member_start)?.kind {
                        fields.extend(declarators);
                    }
                }
                _ => return Err(self.unexpected("a class member")),
            }
            if !self.at_stmt_end() && !matches!(self.peek(), Token::End) {
                return Err(self.unexpected("end of statement"));
            }
        }
        self.expect_end(&Token::Class)?;

        let span = self.span_from(start);
        let decl = lower_class(name, fields, procedures, span)?;
        Ok(Stmt::new(StmtKind::Class(decl), span))
    }

    // ── Control flow ──────────────────────────────────────────────

    fn parse_exit(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let kind = match self.peek() {
            Token::Sub | Token::Function | Token::Property => StmtKind::Return(None),
            Token::For | Token::Do => StmtKind::Break,
            _ => return Err(self.unexpected("'Sub', 'Function', 'Property', 'For' or 'Do'")),
        };
        self.advance();
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let test = self.parse_expr()?;
        self.expect(&Token::Then)?;
        if matches!(self.peek(), Token::Newline | Token::Eof) {
            self.parse_block_if(start, test)
        } else {
            self.parse_inline_if(start, test)
        }
    }

    fn parse_block_if(&mut self, start: Span, test: Expr) -> Result<Stmt, CompileError> {
        let consequent = self.parse_block(|t| matches!(t, Token::ElseIf | Token::Else | Token::End))?;
        let alternate = match self.peek() {
            Token::ElseIf => {
                let branch_start = self.advance();
                let test = self.parse_expr()?;
                self.expect(&Token::Then)?;
                Some(vec![self.parse_block_if(branch_start, test)?])
            }
            Token::Else => {
                self.advance();
                let block = self.parse_block(|t| matches!(t, Token::End))?;
                self.expect_end(&Token::If)?;
                Some(block)
            }
            _ => {
                self.expect_end(&Token::If)?;
                None
            }
        };
        Ok(Stmt::new(
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
            self.span_from(start),
        ))
    }

    /// `If c Then a : b Else d` on one line.
    fn parse_inline_if(&mut self, start: Span, test: Expr) -> Result<Stmt, CompileError> {
        self.inline_if += 1;
        let result = self.parse_inline_branches();
        self.inline_if -= 1;
        let (consequent, alternate) = result?;

        // Tolerate a trailing `End If` on the same line
        if self.peek() == &Token::End && self.peek_at(1) == &Token::If {
            self.advance();
            self.advance();
        }
        Ok(Stmt::new(
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
            self.span_from(start),
        ))
    }

    fn parse_inline_branches(&mut self) -> Result<(Vec<Stmt>, Option<Vec<Stmt>>), CompileError> {
        let consequent = self.parse_inline_block()?;
        let alternate = if self.eat(&Token::Else) {
            Some(self.parse_inline_block()?)
        } else {
            None
        };
        Ok((consequent, alternate))
    }

    fn parse_inline_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&Token::Colon) {}
            if matches!(self.peek(), Token::Newline | Token::Eof | Token::Else | Token::End) {
                return Ok(stmts);
            }
            self.parse_stmt(&mut stmts)?;
            if !self.at_stmt_end() {
                return Err(self.unexpected("end of statement"));
            }
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();

        if self.eat_soft("Each") {
            let (name, span) = self.expect_ident()?;
            self.expect_soft("In")?;
            let iterable = self.parse_expr()?;
            let body = self.parse_block(|t| matches!(t, Token::Next))?;
            self.expect_next()?;
            return Ok(Stmt::new(
                StmtKind::ForOf {
                    target: Expr::new(ExprKind::Ident(name), span),
                    iterable,
                    body,
                },
                self.span_from(start),
            ));
        }

        let (name, span) = self.expect_ident()?;
        let counter = Expr::new(ExprKind::Ident(name), span);
        self.expect(&Token::Eq)?;
        let from = self.parse_expr()?;
        self.expect_soft("To")?;
        let to = self.parse_expr()?;
        let step = if self.eat_soft("Step") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let body = self.parse_block(|t| matches!(t, Token::Next))?;
        self.expect_next()?;

        let counts_down = step.as_ref().is_some_and(is_negative_literal);
        let test = binary(
            if counts_down { BinOp::Ge } else { BinOp::Le },
            counter.clone(),
            to,
        );
        let update = Expr::synthetic(ExprKind::Assign {
            op: AssignOp::AddAssign,
            target: Box::new(counter.clone()),
            value: Box::new(step.unwrap_or_else(|| Expr::synthetic(ExprKind::Number(1.0)))),
        });
        Ok(Stmt::new(
            StmtKind::For {
                init: Expr::assign(counter, from),
                test,
                update,
                body,
            },
            self.span_from(start),
        ))
    }

    /// `Next [counter]`
    fn expect_next(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Next)?;
        if matches!(self.peek(), Token::Ident(_)) {
            self.advance();
        }
        Ok(())
    }

    fn parse_do(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let leading = self.parse_loop_condition()?;
        let body = self.parse_block(|t| matches!(t, Token::Loop))?;
        self.expect(&Token::Loop)?;
        let trailing = self.parse_loop_condition()?;

        let kind = match (leading, trailing) {
            (Some(test), None) => StmtKind::While { test, body },
            (None, Some(test)) => StmtKind::DoWhile { body, test },
            (None, None) => StmtKind::While {
                test: Expr::synthetic(ExprKind::Bool(true)),
                body,
            },
            (Some(_), Some(_)) => {
                return Err(CompileError::parser(
                    "A loop cannot have both a leading and a trailing condition",
                    self.span_from(start),
                ))
            }
        };
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    /// `While c` or `Until c` (negated) after `Do` or `Loop`.
    fn parse_loop_condition(&mut self) -> Result<Option<Expr>, CompileError> {
        match self.peek() {
            Token::While => {
                self.advance();
                Ok(Some(self.parse_expr()?))
            }
            Token::Until => {
                self.advance();
                Ok(Some(Expr::not(self.parse_expr()?)))
            }
            _ => Ok(None),
        }
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let test = self.parse_expr()?;
        let body = self.parse_block(|t| matches!(t, Token::Wend))?;
        self.expect(&Token::Wend)?;
        Ok(Stmt::new(StmtKind::While { test, body }, self.span_from(start)))
    }

    fn parse_select(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance();
        self.expect(&Token::Case)?;
        let discriminant = self.parse_expr()?;
        let mut cases = Vec::new();

        loop {
            self.skip_terminators();
            if !self.eat(&Token::Case) {
                break;
            }
            let mut labels = Vec::new();
            if self.eat(&Token::Else) {
                labels.push(None);
            } else {
                labels.push(Some(self.parse_expr()?));
                while self.eat(&Token::Comma) {
                    labels.push(Some(self.parse_expr()?));
                }
            }
            let mut body = self.parse_block(|t| matches!(t, Token::Case | Token::End))?;
            body.push(Stmt::synthetic(StmtKind::Break));

            // `Case 1, 2` stacks empty labels above the last one
            let last = labels.pop().flatten();
            cases.extend(labels.into_iter().map(|test| SwitchCase { test, body: Vec::new() }));
            cases.push(SwitchCase { test: last, body });
        }
        self.expect_end(&Token::Select)?;

        Ok(Stmt::new(
            StmtKind::Switch {
                discriminant,
                cases,
            },
            self.span_from(start),
        ))
    }

    // ── Expression parsing (precedence climbing) ──────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_xor()
    }

    fn parse_xor(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_or()?;
        while self.eat(&Token::Xor) {
            let right = self.parse_or()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if matches!(self.peek(), Token::Not) {
            let start = self.advance();
            let operand = self.parse_not()?;
            let span = start.merge(operand.span);
            return Ok(Expr { span, ..Expr::not(operand) });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Token::Eq | Token::Ne => None,
                Token::Lt => Some(BinOp::Lt),
                Token::Gt => Some(BinOp::Gt),
                Token::Le => Some(BinOp::Le),
                Token::Ge => Some(BinOp::Ge),
                Token::Is => Some(BinOp::StrictEq),
                _ => break,
            };
            let negate = matches!(self.peek(), Token::Ne);
            self.advance();
            let right = self.parse_concat()?;
            left = match op {
                Some(op) => binary(op, left, right),
                None => {
                    let span = left.span.merge(right.span);
                    let equals = Expr { span, ..Expr::helper_call("equals", vec![left, right]) };
                    if negate {
                        Expr::not(equals)
                    } else {
                        equals
                    }
                }
            };
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_add()?;
        while self.eat(&Token::Ampersand) {
            let right = self.parse_add()?;
            left = binary(BinOp::Add, left, right);
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_mod()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mod()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_mod(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_int_div()?;
        while self.eat(&Token::Mod) {
            let right = self.parse_int_div()?;
            left = binary(BinOp::Mod, left, right);
        }
        Ok(left)
    }

    /// `a \ b` is `Math.floor(a / b)`.
    fn parse_int_div(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_mul()?;
        while self.eat(&Token::Backslash) {
            let right = self.parse_mul()?;
            let quotient = binary(BinOp::Div, left, right);
            let span = quotient.span;
            left = Expr {
                span,
                ..Expr::call(Expr::member(Expr::ident("Math"), "floor"), vec![quotient])
            };
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Token::Minus => {
                let start = self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// `^` binds tighter than unary minus and associates to the left.
    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_postfix(true)?;
        while self.eat(&Token::Caret) {
            let right = match self.peek() {
                Token::Minus | Token::Plus => self.parse_unary()?,
                _ => self.parse_postfix(true)?,
            };
            left = binary(BinOp::Pow, left, right);
        }
        Ok(left)
    }

    /// Member access and argument lists. With `allow_space_call` unset a `(`
    /// preceded by whitespace ends the chain.
    fn parse_postfix(&mut self, allow_space_call: bool) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let (property, property_span) = self.expect_ident()?;
                    let span = expr.span.merge(property_span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    );
                }
                Token::LParen if allow_space_call || !self.space_before() => {
                    self.advance();
                    let args = self.parse_args()?;
                    let span = Span::new(expr.span.start, self.prev_end());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Comma-separated expressions through the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            args.push(self.parse_expr()?);
            while matches!(self.peek(), Token::Comma) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        let kind = match self.peek().clone() {
            Token::Number(v) => ExprKind::Number(v),
            Token::String(s) => ExprKind::Str(s),
            Token::True => ExprKind::Bool(true),
            Token::False => ExprKind::Bool(false),
            Token::Nothing | Token::Null => ExprKind::Null,
            Token::Empty => ExprKind::Undefined,
            Token::Me => ExprKind::This,
            Token::Ident(name) => ExprKind::Ident(name),
            Token::LParen => {
                // Grouping only; parentheses are re-derived on output
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::New => {
                self.advance();
                let (name, name_span) = self.expect_ident()?;
                if matches!(self.peek(), Token::LParen) && !self.space_before() {
                    self.advance();
                    self.expect(&Token::RParen)?;
                }
                return Ok(Expr::new(
                    ExprKind::New {
                        callee: Box::new(Expr::new(ExprKind::Ident(name), name_span)),
                        args: Vec::new(),
                    },
                    self.span_from(span),
                ));
            }
            other => {
                return Err(CompileError::parser(
                    format!("Unexpected token {other:?}"),
                    span,
                ))
            }
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

fn is_negative_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Number(v) => *v < 0.0,
        ExprKind::Unary { op: UnaryOp::Neg, operand } => matches!(operand.kind, ExprKind::Number(v) if v > 0.0),
        _ => false,
    }
}

/// `a(i, j) = v` assigns an array element: `a[i][j] = v`.
/// Whether a statement head names something that can be called.
fn is_callable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) | ExprKind::Member { .. } => true,
        ExprKind::Call { callee, .. } => is_callable(callee),
        _ => false,
    }
}

fn into_assign_target(expr: Expr) -> Result<Expr, CompileError> {
    let span = expr.span;
    match expr.kind {
        ExprKind::Call { callee, args } if !args.is_empty() => {
            let target = Expr::index_chain(into_assign_target(*callee)?, args);
            Ok(Expr { span, ..target })
        }
        kind @ (ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }) => Ok(Expr { kind, span }),
        _ => Err(CompileError::parser("Invalid assignment target", span)),
    }
}

// ── Class lowering ────────────────────────────────────────────────

/// Build the class declaration: fields initialize in the constructor,
/// `Class_Initialize` runs after them, bare member references inside method
/// bodies go through `this`, and parameterless `Property Get` / single-value
/// `Property Let|Set` become accessors.
fn lower_class(
    name: String,
    fields: Vec<Declarator>,
    procedures: Vec<FunctionDecl>,
    span: Span,
) -> Result<ClassDecl, CompileError> {
    let mut member_names = HashMap::new();
    let mut field_names = HashSet::new();
    for field in &fields {
        member_names.insert(field.name.to_ascii_lowercase(), field.name.clone());
        field_names.insert(field.name.to_ascii_lowercase());
    }
    for procedure in &procedures {
        member_names.insert(procedure.name.to_ascii_lowercase(), procedure.name.clone());
    }

    let mut constructor: Vec<Stmt> = fields
        .into_iter()
        .map(|field| {
            let target = Expr::member(Expr::synthetic(ExprKind::This), field.name);
            let value = field.init.unwrap_or_else(|| Expr::synthetic(ExprKind::Undefined));
            Stmt::expr(Expr::assign(target, value))
        })
        .collect();

    let mut members = Vec::new();
    for mut function in procedures {
        qualify_members(&mut function, &member_names, &field_names)?;
        if function.kind == ProcKind::Sub && function.name.eq_ignore_ascii_case("Class_Initialize") {
            constructor.append(&mut function.body);
            continue;
        }
        let kind = match function.kind {
            ProcKind::PropertyGet if function.params.is_empty() => MethodKind::Getter,
            ProcKind::PropertyLet | ProcKind::PropertySet if function.params.len() == 1 => MethodKind::Setter,
            _ => MethodKind::Method,
        };
        members.push(ClassMember { kind, function });
    }

    Ok(ClassDecl {
        name,
        constructor,
        members,
        span,
    })
}

/// Rewrites bare references to class members into `this.<member>` unless a
/// parameter or local shadows them.
struct MemberQualifier<'a> {
    members: &'a HashMap<String, String>,
    fields: &'a HashSet<String>,
    locals: Frame,
    /// The method being qualified; calling it by name recurses.
    method: &'a str,
}

impl Rewrite for MemberQualifier<'_> {
    fn enter_expr(&mut self, expr: &mut Expr, role: Role) -> Result<Visit<Expr>, CompileError> {
        let Some(name) = expr.as_ident() else {
            return Ok(Visit::Keep);
        };
        let recursive = role == Role::Callee && name.eq_ignore_ascii_case(self.method);
        if self.locals.get(name).is_some() && !recursive {
            return Ok(Visit::Keep);
        }
        Ok(match self.members.get(&name.to_ascii_lowercase()) {
            Some(canonical) => Visit::Replace(Expr::new(
                ExprKind::Member {
                    object: Box::new(Expr::new(ExprKind::This, expr.span)),
                    property: canonical.clone(),
                },
                expr.span,
            )),
            None => Visit::Keep,
        })
    }

    /// `this.field(i)` reads an array field.
    fn leave_expr(&mut self, expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            return Ok(Visit::Keep);
        };
        let is_field = matches!(&callee.kind, ExprKind::Member { object, property }
            if object.kind == ExprKind::This && self.fields.contains(&property.to_ascii_lowercase()));
        if !is_field || args.is_empty() {
            return Ok(Visit::Keep);
        }
        let object = std::mem::replace(callee.as_mut(), Expr::synthetic(ExprKind::Undefined));
        let indices = std::mem::take(args);
        Ok(Visit::Replace(Expr {
            span: expr.span,
            ..Expr::index_chain(object, indices)
        }))
    }
}

fn qualify_members(
    function: &mut FunctionDecl,
    members: &HashMap<String, String>,
    fields: &HashSet<String>,
) -> Result<(), CompileError> {
    let locals = ScopeTracker::function_frame(function)?;
    let mut qualifier = MemberQualifier {
        members,
        fields,
        locals,
        method: &function.name,
    };
    rewrite_block(&mut function.body, &mut qualifier)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::lexer::lex;

    fn parse_str(s: &str) -> Program {
        let tokens = lex(s).unwrap();
        parse(tokens).unwrap()
    }

    fn parse_err(s: &str) -> CompileError {
        let tokens = lex(s).unwrap();
        parse(tokens).unwrap_err()
    }

    fn only_expr(program: &Program) -> &Expr {
        assert_eq!(program.body.len(), 1);
        match &program.body[0].kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    fn call_parts(expr: &Expr) -> (&Expr, &[Expr]) {
        match &expr.kind {
            ExprKind::Call { callee, args } => (callee, args),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn bare_name_is_a_zero_arg_call() {
        let program = parse_str("BallRelease");
        let (callee, args) = call_parts(only_expr(&program));
        assert_eq!(callee.as_ident(), Some("BallRelease"));
        assert!(args.is_empty());
    }

    #[test]
    fn chained_empty_calls_call_the_result() {
        let program = parse_str("BallRelease()()");
        let (callee, args) = call_parts(only_expr(&program));
        assert!(args.is_empty());
        let (inner, inner_args) = call_parts(callee);
        assert_eq!(inner.as_ident(), Some("BallRelease"));
        assert!(inner_args.is_empty());
    }

    #[test]
    fn implicit_call_with_arguments() {
        let program = parse_str("BallRelease 5, -2");
        let (callee, args) = call_parts(only_expr(&program));
        assert_eq!(callee.as_ident(), Some("BallRelease"));
        assert_eq!(args.len(), 2);
        assert!(matches!(args[0].kind, ExprKind::Number(v) if v == 5.0));
        assert!(matches!(args[1].kind, ExprKind::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn parenthesized_single_arguments_are_grouping() {
        for source in [
            "BallRelease.KickBall (0), -2",
            "BallRelease.KickBall 0, (-2)",
            "BallRelease.KickBall (0), (-2)",
            "BallRelease.KickBall(0), -2",
        ] {
            let program = parse_str(source);
            let (callee, args) = call_parts(only_expr(&program));
            assert!(matches!(&callee.kind, ExprKind::Member { property, .. } if property == "KickBall"));
            assert_eq!(args.len(), 2, "{source}");
            assert!(matches!(args[0].kind, ExprKind::Number(v) if v == 0.0));
        }
    }

    #[test]
    fn spaced_paren_list_is_the_argument_list() {
        let program = parse_str("Foo (a, b)");
        let (_, args) = call_parts(only_expr(&program));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn member_call_chain() {
        let program = parse_str("BallRelease.Kicker.KickBall (0), (-2)");
        let (callee, args) = call_parts(only_expr(&program));
        assert_eq!(args.len(), 2);
        let ExprKind::Member { object, property } = &callee.kind else { panic!("expected member") };
        assert_eq!(property, "KickBall");
        assert!(matches!(&object.kind, ExprKind::Member { property, .. } if property == "Kicker"));
    }

    #[test]
    fn call_statement_keeps_call_shape() {
        let program = parse_str("Call mQue(ii)(3)(mQue(ii)(2))");
        let (callee, args) = call_parts(only_expr(&program));
        assert_eq!(args.len(), 1);
        call_parts(&args[0]);
        let (inner, inner_args) = call_parts(callee);
        assert!(matches!(inner_args[0].kind, ExprKind::Number(v) if v == 3.0));
        call_parts(inner);

        let program = parse_str("Call Foo");
        let (_, args) = call_parts(only_expr(&program));
        assert!(args.is_empty());
    }

    #[test]
    fn array_element_assignment() {
        let program = parse_str("grid(i, j) = 5");
        let ExprKind::Assign { target, .. } = &only_expr(&program).kind else { panic!("expected assignment") };
        let ExprKind::Index { object, .. } = &target.kind else { panic!("expected index") };
        assert!(matches!(object.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn comparison_uses_helper() {
        let program = parse_str("x = a <> b");
        let ExprKind::Assign { value, .. } = &only_expr(&program).kind else { panic!("expected assignment") };
        let ExprKind::Unary { op: UnaryOp::Not, operand } = &value.kind else { panic!("expected negation") };
        let (callee, args) = call_parts(operand);
        assert!(matches!(&callee.kind, ExprKind::Member { property, .. } if property == "equals"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn dim_and_const() {
        let program = parse_str("Dim a, b(3)\nConst X = 1");
        let StmtKind::VarDecl { kind: VarKind::Let, declarators } = &program.body[0].kind else { panic!("expected let") };
        assert!(declarators[0].init.is_none());
        assert!(declarators[1].init.is_some());
        assert!(matches!(program.body[1].kind, StmtKind::VarDecl { kind: VarKind::Const, .. }));
    }

    #[test]
    fn option_explicit_and_on_error_are_dropped() {
        let program = parse_str("Option Explicit\nOn Error Resume Next\nDim x\nOn Error Goto 0");
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn single_line_if_with_else() {
        let program = parse_str("If x Then a = 1 : b Else c");
        let StmtKind::If { consequent, alternate, .. } = &program.body[0].kind else { panic!("expected if") };
        assert_eq!(consequent.len(), 2);
        assert_eq!(alternate.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn block_if_with_elseif_chain() {
        let program = parse_str("If a Then\nx = 1\nElseIf b Then\nx = 2\nElse\nx = 3\nEnd If");
        let StmtKind::If { alternate, .. } = &program.body[0].kind else { panic!("expected if") };
        let nested = alternate.as_ref().unwrap();
        let StmtKind::If { alternate: last, .. } = &nested[0].kind else { panic!("expected else-if") };
        assert_eq!(last.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn for_with_negative_step_counts_down() {
        let program = parse_str("For i = 10 To 1 Step -1\nx = i\nNext");
        let StmtKind::For { test, .. } = &program.body[0].kind else { panic!("expected for") };
        assert!(matches!(test.kind, ExprKind::Binary { op: BinOp::Ge, .. }));
    }

    #[test]
    fn do_until_negates_condition() {
        let program = parse_str("Do Until done\nTick\nLoop");
        let StmtKind::While { test, .. } = &program.body[0].kind else { panic!("expected while") };
        assert!(matches!(test.kind, ExprKind::Unary { op: UnaryOp::Not, .. }));

        let program = parse_str("Do\nTick\nLoop While busy");
        assert!(matches!(program.body[0].kind, StmtKind::DoWhile { .. }));
    }

    #[test]
    fn select_case_stacks_labels() {
        let program = parse_str("Select Case n\nCase 1, 2\nA\nCase Else\nB\nEnd Select");
        let StmtKind::Switch { cases, .. } = &program.body[0].kind else { panic!("expected switch") };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].body.is_empty());
        assert!(matches!(cases[1].body.last().unwrap().kind, StmtKind::Break));
        assert!(cases[2].test.is_none());
    }

    #[test]
    fn exit_statements() {
        let program = parse_str("Sub Foo\nFor i = 1 To 2\nExit For\nNext\nExit Sub\nEnd Sub");
        let StmtKind::Function(decl) = &program.body[0].kind else { panic!("expected sub") };
        assert!(matches!(decl.body[1].kind, StmtKind::Return(None)));
    }

    #[test]
    fn parameters_default_to_byref() {
        let program = parse_str("Private Sub foo(ByRef x, ByVal y, z)\nEnd Sub");
        let StmtKind::Function(decl) = &program.body[0].kind else { panic!("expected sub") };
        let modes: Vec<_> = decl.params.iter().map(|p| p.mode).collect();
        assert_eq!(modes, vec![PassingMode::ByRef, PassingMode::ByVal, PassingMode::ByRef]);
    }

    #[test]
    fn class_lowering() {
        let source = "Class cvpmTest\n\
            Private mEnabled\n\
            Private Sub Class_Initialize : mEnabled = True : End Sub\n\
            Public Property Get Enabled : Enabled = mEnabled : End Property\n\
            Public Property Let Enabled(aValue) : mEnabled = aValue : End Property\n\
            Public Sub Reset(mEnabled) : mEnabled = 0 : Me.Toggle : End Sub\n\
            End Class";
        let program = parse_str(source);
        let StmtKind::Class(class) = &program.body[0].kind else { panic!("expected class") };
        assert_eq!(class.name, "cvpmTest");
        assert_eq!(class.constructor.len(), 2);
        assert_eq!(class.members.len(), 3);
        assert_eq!(class.members[0].kind, MethodKind::Getter);
        assert_eq!(class.members[1].kind, MethodKind::Setter);
        assert_eq!(class.members[2].kind, MethodKind::Method);

        // Field reference in a getter goes through `this`, the own name does not
        let StmtKind::Expr(assign) = &class.members[0].function.body[0].kind else { panic!("expected assignment") };
        let ExprKind::Assign { target, value, .. } = &assign.kind else { panic!("expected assignment") };
        assert_eq!(target.as_ident(), Some("Enabled"));
        assert!(matches!(&value.kind, ExprKind::Member { object, property } if property == "mEnabled" && object.kind == ExprKind::This));

        // A parameter shadows the field
        let StmtKind::Expr(assign) = &class.members[2].function.body[0].kind else { panic!("expected assignment") };
        let ExprKind::Assign { target, .. } = &assign.kind else { panic!("expected assignment") };
        assert_eq!(target.as_ident(), Some("mEnabled"));
        let StmtKind::Expr(call) = &class.members[2].function.body[1].kind else { panic!("expected call") };
        let (callee, _) = call_parts(call);
        assert!(matches!(&callee.kind, ExprKind::Member { object, .. } if object.kind == ExprKind::This));
    }

    #[test]
    fn field_calls_inside_classes_are_array_reads() {
        let program = parse_str("Class Queue\nDim mSlots(3)\nSub Put(v) : x = mSlots(1) : Run v : End Sub\nSub Run(v) : End Sub\nEnd Class");
        let StmtKind::Class(class) = &program.body[0].kind else { panic!("expected class") };
        let body = &class.members[0].function.body;
        let StmtKind::Expr(assign) = &body[0].kind else { panic!("expected assignment") };
        let ExprKind::Assign { value, .. } = &assign.kind else { panic!("expected assignment") };
        assert!(matches!(&value.kind, ExprKind::Index { object, .. }
            if matches!(&object.kind, ExprKind::Member { property, .. } if property == "mSlots")));

        // Methods stay calls
        let StmtKind::Expr(call) = &body[1].kind else { panic!("expected call") };
        let (callee, args) = call_parts(call);
        assert!(matches!(&callee.kind, ExprKind::Member { property, .. } if property == "Run"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn statement_heads_must_be_callable() {
        for source in ["1 + 1", "\"abc\" 5", "True", "Me"] {
            let err = parse_err(source);
            assert_eq!(err.kind, crate::script::error::ErrorKind::Parser, "{source}");
        }
        // Members and calls still are
        assert_eq!(parse_str("Me.Reset").body.len(), 1);
        assert_eq!(parse_str("Foo(1)(2)").body.len(), 1);
    }

    #[test]
    fn lone_expressions_parse_on_their_own() {
        let expr = parse_expression(lex("\n1 + x\n").unwrap()).unwrap();
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinOp::Add, .. }));
        assert!(parse_expression(lex("1 + x : y").unwrap()).is_err());
    }

    #[test]
    fn recursive_method_calls_go_through_this() {
        let program = parse_str("Class Tree
Function Depth(n)
Depth = Depth(n - 1) + 1
End Function
End Class");
        let StmtKind::Class(class) = &program.body[0].kind else { panic!("expected class") };
        let StmtKind::Expr(assign) = &class.members[0].function.body[0].kind else { panic!("expected assignment") };
        let ExprKind::Assign { target, value, .. } = &assign.kind else { panic!("expected assignment") };
        // The return value stays local
        assert_eq!(target.as_ident(), Some("Depth"));
        let ExprKind::Binary { left, .. } = &value.kind else { panic!("expected addition") };
        let (callee, _) = call_parts(left);
        assert!(matches!(&callee.kind, ExprKind::Member { object, property }
            if object.kind == ExprKind::This && property == "Depth"));
    }

    #[test]
    fn exit_property_inside_single_line_if() {
        let program = parse_str("Class C\nPublic Property Get Balls(t):If Balls=1 Then Exit Property:End Property\nEnd Class");
        let StmtKind::Class(class) = &program.body[0].kind else { panic!("expected class") };
        let body = &class.members[0].function.body;
        let StmtKind::If { consequent, .. } = &body[0].kind else { panic!("expected if") };
        assert!(matches!(consequent[0].kind, StmtKind::Return(None)));
    }

    #[test]
    fn missing_end_if_is_reported() {
        let err = parse_err("If x Then\ny = 1\n");
        assert!(err.is_parse_error());
        assert!(err.message.contains("End If"), "{}", err.message);
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse_err("5 = x");
        assert!(err.message.contains("Invalid assignment target"));
    }
}
