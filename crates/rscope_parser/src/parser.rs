//! The parser implementation.
//!
//! A recursive descent parser over the scanner's token stream. It builds an
//! arena-allocated AST, assigns node ids, tracks strict-mode context from
//! `"use strict"` directives, and reports the early errors that depend on it.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use rscope_ast::node::*;
use rscope_ast::{NodeIdGenerator, SyntaxKind};
use rscope_core::intern::StringInterner;
use rscope_core::text::TextSpan;
use rscope_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};

use crate::scanner::Scanner;

/// Maximum recursion depth to prevent stack overflow on deeply nested input.
const MAX_RECURSION_DEPTH: u32 = 200;

/// A parsed program together with everything reported while parsing it.
#[derive(Debug)]
pub struct ParseResult<'a> {
    pub program: Program<'a>,
    pub diagnostics: DiagnosticCollection,
    /// Number of node ids assigned; side tables can be presized with it.
    pub node_count: u32,
}

/// The parser produces a [`Program`] from source text.
pub struct Parser<'a> {
    arena: &'a Bump,
    scanner: Scanner,
    interner: StringInterner,
    ids: NodeIdGenerator,
    file_name: String,
    diagnostics: DiagnosticCollection,
    /// Strictness of the innermost function or program being parsed.
    strict: bool,
    /// Number of enclosing function bodies.
    function_depth: u32,
    recursion_depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a Bump, file_name: &str, source_text: &str, interner: &StringInterner) -> Self {
        Self {
            arena,
            scanner: Scanner::new(source_text),
            interner: interner.clone(),
            ids: NodeIdGenerator::new(),
            file_name: file_name.to_string(),
            diagnostics: DiagnosticCollection::new(),
            strict: false,
            function_depth: 0,
            recursion_depth: 0,
        }
    }

    /// Start parsing in strict mode regardless of directives.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn parse_program(mut self) -> ParseResult<'a> {
        self.next_token();
        let id = self.ids.next_id();

        let mut statements = BumpVec::new_in(self.arena);
        let strict = self.parse_directives(&mut statements);
        while self.current_token() != SyntaxKind::EndOfFileToken {
            self.parse_statement_into(&mut statements);
        }
        let end = self.scanner.token_end() as u32;

        let mut diagnostics = self.scanner.take_diagnostics();
        diagnostics.extend(self.diagnostics);
        diagnostics.attribute_to(&self.file_name);
        diagnostics.sort();

        ParseResult {
            program: Program {
                id,
                file_name: self.file_name,
                statements: statements.into_bump_slice(),
                strict,
                span: TextSpan::from_bounds(0, end),
            },
            diagnostics,
            node_count: self.ids.count(),
        }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    #[inline]
    fn current_token(&self) -> SyntaxKind {
        self.scanner.token()
    }

    #[inline]
    fn next_token(&mut self) -> SyntaxKind {
        self.scanner.scan()
    }

    #[inline]
    fn token_pos(&self) -> u32 {
        self.scanner.token_start() as u32
    }

    #[inline]
    fn token_end(&self) -> u32 {
        self.scanner.token_end() as u32
    }

    fn token_span(&self) -> TextSpan {
        TextSpan::from_bounds(self.token_pos(), self.token_end())
    }

    fn error_at(&mut self, span: TextSpan, message: &DiagnosticMessage, args: &[&str]) {
        self.diagnostics.add(Diagnostic::with_location(
            self.file_name.clone(),
            span,
            message,
            args,
        ));
    }

    fn error(&mut self, message: &DiagnosticMessage, args: &[&str]) {
        let span = self.token_span();
        self.error_at(span, message, args);
    }

    fn optional_token(&mut self, kind: SyntaxKind) -> bool {
        if self.current_token() == kind {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, kind: SyntaxKind) -> bool {
        if self.optional_token(kind) {
            return true;
        }
        let text = kind
            .punctuation_text()
            .or_else(|| kind.keyword_text())
            .unwrap_or("token");
        self.error(&messages::_0_EXPECTED, &[text]);
        false
    }

    /// Semicolons may be omitted before `}`, at end of input, or after a line break.
    fn parse_expected_semicolon(&mut self) {
        if self.optional_token(SyntaxKind::SemicolonToken) {
            return;
        }
        if matches!(
            self.current_token(),
            SyntaxKind::CloseBraceToken | SyntaxKind::EndOfFileToken
        ) || self.scanner.has_preceding_line_break()
        {
            return;
        }
        self.error(&messages::_0_EXPECTED, &[";"]);
    }

    fn parse_identifier(&mut self) -> Identifier {
        let span = self.token_span();
        let name = if self.current_token() == SyntaxKind::Identifier {
            let name = self.interner.intern(self.scanner.token_value());
            self.next_token();
            name
        } else {
            self.error(&messages::IDENTIFIER_EXPECTED, &[]);
            // Leave the offending token for the caller's recovery.
            self.interner.intern("")
        };
        Identifier {
            id: self.ids.next_id(),
            name,
            span,
        }
    }

    /// Names that strict code may not bind or assign.
    fn check_binding_name(&mut self, ident: &Identifier, strict: bool) {
        if !strict {
            return;
        }
        let well_known = self.interner.well_known();
        if ident.name == well_known.eval || ident.name == well_known.arguments {
            let text = self.interner.resolve(ident.name).to_string();
            self.error_at(ident.span, &messages::INVALID_USE_OF_0_IN_STRICT_MODE, &[&text]);
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parse a directive prologue and report whether it contains `"use strict"`.
    /// The directives themselves are kept as ordinary statements.
    fn parse_directives(&mut self, statements: &mut BumpVec<'a, Statement<'a>>) -> bool {
        while self.current_token() == SyntaxKind::StringLiteral {
            let is_use_strict = self.scanner.token_value() == "use strict";
            let statement = self.parse_statement();
            let is_directive = matches!(
                statement,
                Statement::Expression(Expression::String(_))
            );
            statements.push(statement);
            if !is_directive {
                break;
            }
            if is_use_strict {
                self.strict = true;
            }
        }
        self.strict
    }

    /// Parse one statement, skipping a token if nothing could be consumed.
    fn parse_statement_into(&mut self, statements: &mut BumpVec<'a, Statement<'a>>) {
        let start = self.token_pos();
        let statement = self.parse_statement();
        if self.token_pos() == start && self.current_token() != SyntaxKind::EndOfFileToken {
            self.next_token();
        }
        statements.push(statement);
    }

    fn parse_statement(&mut self) -> Statement<'a> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.recursion_depth -= 1;
            self.error(&messages::DECLARATION_OR_STATEMENT_EXPECTED, &[]);
            return Statement::Empty;
        }
        let statement = match self.current_token() {
            SyntaxKind::VarKeyword => self.parse_var_statement(),
            SyntaxKind::FunctionKeyword => {
                self.next_token();
                let function = self.parse_function_rest(true);
                Statement::Function(function)
            }
            SyntaxKind::ReturnKeyword => self.parse_return_statement(),
            SyntaxKind::IfKeyword => self.parse_if_statement(),
            SyntaxKind::WhileKeyword => self.parse_while_statement(),
            SyntaxKind::OpenBraceToken => Statement::Block(self.parse_block()),
            SyntaxKind::TryKeyword => self.parse_try_statement(),
            SyntaxKind::ThrowKeyword => {
                self.next_token();
                let argument = self.parse_expression();
                self.parse_expected_semicolon();
                Statement::Throw(argument)
            }
            SyntaxKind::SemicolonToken => {
                self.next_token();
                Statement::Empty
            }
            SyntaxKind::CloseBraceToken | SyntaxKind::EndOfFileToken => {
                self.error(&messages::DECLARATION_OR_STATEMENT_EXPECTED, &[]);
                Statement::Empty
            }
            _ => {
                let expression = self.parse_expression();
                self.parse_expected_semicolon();
                Statement::Expression(expression)
            }
        };
        self.recursion_depth -= 1;
        statement
    }

    fn parse_var_statement(&mut self) -> Statement<'a> {
        self.next_token();
        let mut declarators = BumpVec::new_in(self.arena);
        loop {
            let name = self.parse_identifier();
            self.check_binding_name(&name, self.strict);
            let init = if self.optional_token(SyntaxKind::EqualsToken) {
                Some(self.parse_assignment_expression())
            } else {
                None
            };
            declarators.push(VariableDeclarator { name, init });
            if !self.optional_token(SyntaxKind::CommaToken) {
                break;
            }
        }
        self.parse_expected_semicolon();
        Statement::Var(declarators.into_bump_slice())
    }

    fn parse_return_statement(&mut self) -> Statement<'a> {
        let span = self.token_span();
        if self.function_depth == 0 {
            self.error(&messages::A_RETURN_STATEMENT_CAN_ONLY_BE_USED_WITHIN_A_FUNCTION_BODY, &[]);
        }
        self.next_token();
        let argument = if matches!(
            self.current_token(),
            SyntaxKind::SemicolonToken | SyntaxKind::CloseBraceToken | SyntaxKind::EndOfFileToken
        ) || self.scanner.has_preceding_line_break()
        {
            None
        } else {
            Some(self.parse_expression())
        };
        self.parse_expected_semicolon();
        Statement::Return(argument, span)
    }

    fn parse_if_statement(&mut self) -> Statement<'a> {
        self.next_token();
        self.expect_token(SyntaxKind::OpenParenToken);
        let test = self.parse_expression();
        self.expect_token(SyntaxKind::CloseParenToken);
        let consequent = self.arena.alloc(self.parse_statement());
        let alternate = if self.optional_token(SyntaxKind::ElseKeyword) {
            Some(&*self.arena.alloc(self.parse_statement()))
        } else {
            None
        };
        Statement::If(self.arena.alloc(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> Statement<'a> {
        self.next_token();
        self.expect_token(SyntaxKind::OpenParenToken);
        let test = self.parse_expression();
        self.expect_token(SyntaxKind::CloseParenToken);
        let body = self.arena.alloc(self.parse_statement());
        Statement::While(self.arena.alloc(WhileStatement { test, body }))
    }

    fn parse_block(&mut self) -> NodeList<'a, Statement<'a>> {
        let mut statements = BumpVec::new_in(self.arena);
        if !self.expect_token(SyntaxKind::OpenBraceToken) {
            return statements.into_bump_slice();
        }
        while !matches!(
            self.current_token(),
            SyntaxKind::CloseBraceToken | SyntaxKind::EndOfFileToken
        ) {
            self.parse_statement_into(&mut statements);
        }
        self.expect_token(SyntaxKind::CloseBraceToken);
        statements.into_bump_slice()
    }

    fn parse_try_statement(&mut self) -> Statement<'a> {
        self.next_token();
        let block = self.parse_block();

        let handler = if self.optional_token(SyntaxKind::CatchKeyword) {
            let id = self.ids.next_id();
            self.expect_token(SyntaxKind::OpenParenToken);
            let param = self.parse_identifier();
            self.check_binding_name(&param, self.strict);
            self.expect_token(SyntaxKind::CloseParenToken);
            let body = self.parse_block();
            Some(CatchClause { id, param, body })
        } else {
            None
        };

        let finalizer = if self.optional_token(SyntaxKind::FinallyKeyword) {
            Some(self.parse_block())
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            self.error(&messages::CATCH_OR_FINALLY_EXPECTED, &[]);
        }

        Statement::Try(self.arena.alloc(TryStatement {
            block,
            handler,
            finalizer,
        }))
    }

    /// Parse a function after the `function` keyword.
    fn parse_function_rest(&mut self, is_declaration: bool) -> &'a Function<'a> {
        let start = self.token_pos();
        let id = self.ids.next_id();
        let name = if is_declaration || self.current_token() == SyntaxKind::Identifier {
            Some(self.parse_identifier())
        } else {
            None
        };

        let mut params = BumpVec::new_in(self.arena);
        self.expect_token(SyntaxKind::OpenParenToken);
        if self.current_token() != SyntaxKind::CloseParenToken {
            loop {
                params.push(self.parse_identifier());
                if !self.optional_token(SyntaxKind::CommaToken) {
                    break;
                }
            }
        }
        self.expect_token(SyntaxKind::CloseParenToken);

        let outer_strict = self.strict;
        self.function_depth += 1;
        let mut body = BumpVec::new_in(self.arena);
        if self.expect_token(SyntaxKind::OpenBraceToken) {
            self.parse_directives(&mut body);
            while !matches!(
                self.current_token(),
                SyntaxKind::CloseBraceToken | SyntaxKind::EndOfFileToken
            ) {
                self.parse_statement_into(&mut body);
            }
            self.expect_token(SyntaxKind::CloseBraceToken);
        }
        let strict = self.strict;
        self.function_depth -= 1;
        self.strict = outer_strict;

        // A function's own directive governs its name and parameters too.
        if let Some(name) = &name {
            self.check_binding_name(name, strict);
        }
        for (i, param) in params.iter().enumerate() {
            self.check_binding_name(param, strict);
            if strict && params[..i].iter().any(|p| p.name == param.name) {
                let text = self.interner.resolve(param.name).to_string();
                self.error_at(param.span, &messages::DUPLICATE_PARAMETER_0_IN_STRICT_MODE, &[&text]);
            }
        }

        self.arena.alloc(Function {
            id,
            name,
            params: params.into_bump_slice(),
            body: body.into_bump_slice(),
            strict,
            span: TextSpan::from_bounds(start, self.token_pos().max(start)),
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> &'a Expression<'a> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> &'a Expression<'a> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.recursion_depth -= 1;
            self.error(&messages::EXPRESSION_EXPECTED, &[]);
            return self.arena.alloc(Expression::Null);
        }
        let target_span = self.token_span();
        let left = self.parse_binary_expression(0);
        let result = if self.current_token() == SyntaxKind::EqualsToken {
            self.next_token();
            let value = self.parse_assignment_expression();
            match left.as_identifier() {
                Some(target) => {
                    self.check_binding_name(target, self.strict);
                    &*self.arena.alloc(Expression::Assign {
                        target: *target,
                        value,
                    })
                }
                None => {
                    self.error_at(target_span, &messages::INVALID_ASSIGNMENT_TARGET, &[]);
                    value
                }
            }
        } else {
            left
        };
        self.recursion_depth -= 1;
        result
    }

    fn parse_binary_expression(&mut self, min_precedence: u8) -> &'a Expression<'a> {
        let mut left = self.parse_unary_expression();
        while let Some((op, precedence)) = binary_operator(self.current_token()) {
            if precedence < min_precedence {
                break;
            }
            self.next_token();
            let right = self.parse_binary_expression(precedence + 1);
            left = self.arena.alloc(Expression::Binary { op, left, right });
        }
        left
    }

    fn parse_unary_expression(&mut self) -> &'a Expression<'a> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            self.error(&messages::EXPRESSION_EXPECTED, &[]);
            self.recursion_depth -= 1;
            return self.arena.alloc(Expression::Null);
        }
        let result = self.parse_unary_operand();
        self.recursion_depth -= 1;
        result
    }

    fn parse_unary_operand(&mut self) -> &'a Expression<'a> {
        let span = self.token_span();
        let op = match self.current_token() {
            SyntaxKind::ExclamationToken => Some(UnaryOperator::Not),
            SyntaxKind::MinusToken => Some(UnaryOperator::Minus),
            SyntaxKind::PlusToken => Some(UnaryOperator::Plus),
            SyntaxKind::TypeOfKeyword => {
                self.next_token();
                let operand = self.parse_unary_expression();
                return self.arena.alloc(Expression::TypeOf(operand));
            }
            SyntaxKind::DeleteKeyword => {
                self.next_token();
                let operand = self.parse_unary_expression();
                if self.strict && operand.as_identifier().is_some() {
                    self.error_at(
                        span,
                        &messages::DELETE_CANNOT_BE_CALLED_ON_AN_IDENTIFIER_IN_STRICT_MODE,
                        &[],
                    );
                }
                let span = TextSpan::from_bounds(span.start, self.token_pos().max(span.start));
                return self.arena.alloc(Expression::Delete(operand, span));
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.next_token();
                let operand = self.parse_unary_expression();
                self.arena.alloc(Expression::Unary { op, operand })
            }
            None => self.parse_call_expression(),
        }
    }

    fn parse_call_expression(&mut self) -> &'a Expression<'a> {
        let start = self.token_pos();
        let mut expression = self.parse_primary_expression();
        while self.current_token() == SyntaxKind::OpenParenToken {
            self.next_token();
            let mut args = BumpVec::new_in(self.arena);
            if self.current_token() != SyntaxKind::CloseParenToken {
                loop {
                    args.push(self.parse_assignment_expression());
                    if !self.optional_token(SyntaxKind::CommaToken) {
                        break;
                    }
                }
            }
            let end = self.token_end();
            self.expect_token(SyntaxKind::CloseParenToken);
            expression = self.arena.alloc(Expression::Call {
                callee: expression,
                args: args.into_bump_slice(),
                span: TextSpan::from_bounds(start, end),
            });
        }
        expression
    }

    fn parse_primary_expression(&mut self) -> &'a Expression<'a> {
        let expression = match self.current_token() {
            SyntaxKind::NumericLiteral => {
                let value = parse_numeric_literal(self.scanner.token_value());
                self.next_token();
                Expression::Number(value)
            }
            SyntaxKind::StringLiteral => {
                let value = self.arena.alloc_str(self.scanner.token_value());
                self.next_token();
                Expression::String(value)
            }
            SyntaxKind::TrueKeyword => {
                self.next_token();
                Expression::Boolean(true)
            }
            SyntaxKind::FalseKeyword => {
                self.next_token();
                Expression::Boolean(false)
            }
            SyntaxKind::NullKeyword => {
                self.next_token();
                Expression::Null
            }
            SyntaxKind::ThisKeyword => {
                let span = self.token_span();
                self.next_token();
                Expression::This(Identifier {
                    id: self.ids.next_id(),
                    name: self.interner.well_known().this,
                    span,
                })
            }
            SyntaxKind::Identifier => Expression::Identifier(self.parse_identifier()),
            SyntaxKind::FunctionKeyword => {
                self.next_token();
                Expression::Function(self.parse_function_rest(false))
            }
            SyntaxKind::OpenParenToken => {
                self.next_token();
                let inner = self.parse_expression();
                self.expect_token(SyntaxKind::CloseParenToken);
                return inner;
            }
            _ => {
                self.error(&messages::EXPRESSION_EXPECTED, &[]);
                Expression::Null
            }
        };
        self.arena.alloc(expression)
    }
}

/// Operator and binding power of a binary operator token.
fn binary_operator(kind: SyntaxKind) -> Option<(BinaryOperator, u8)> {
    let entry = match kind {
        SyntaxKind::BarBarToken => (BinaryOperator::LogicalOr, 1),
        SyntaxKind::AmpersandAmpersandToken => (BinaryOperator::LogicalAnd, 2),
        SyntaxKind::EqualsEqualsToken => (BinaryOperator::LooseEquals, 3),
        SyntaxKind::ExclamationEqualsToken => (BinaryOperator::LooseNotEquals, 3),
        SyntaxKind::EqualsEqualsEqualsToken => (BinaryOperator::StrictEquals, 3),
        SyntaxKind::ExclamationEqualsEqualsToken => (BinaryOperator::StrictNotEquals, 3),
        SyntaxKind::LessThanToken => (BinaryOperator::LessThan, 4),
        SyntaxKind::GreaterThanToken => (BinaryOperator::GreaterThan, 4),
        SyntaxKind::LessThanEqualsToken => (BinaryOperator::LessThanEquals, 4),
        SyntaxKind::GreaterThanEqualsToken => (BinaryOperator::GreaterThanEquals, 4),
        SyntaxKind::PlusToken => (BinaryOperator::Add, 5),
        SyntaxKind::MinusToken => (BinaryOperator::Subtract, 5),
        SyntaxKind::AsteriskToken => (BinaryOperator::Multiply, 6),
        SyntaxKind::SlashToken => (BinaryOperator::Divide, 6),
        SyntaxKind::PercentToken => (BinaryOperator::Remainder, 6),
        _ => return None,
    };
    Some(entry)
}

fn parse_numeric_literal(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    text.parse().unwrap_or(f64::NAN)
}
