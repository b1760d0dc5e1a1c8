use super::{ast::NodeId, intern::InternedSymbol};
use crate::frontend::{
    SourceFile,
    ast::{
        Block, BlockItem, BinaryOperatorKind, CompilationUnit, Declaration, DeclarationKind,
        Definition, Expression, ExpressionKind, FunctionDefinition, Identifier, Initializer,
        InitializerKind, Item, ItemKind, LValue, Parameter, ParameterKind, ReturnKind, Statement,
        StatementKind, UnaryOperatorKind,
    },
    lexer::{Keyword, Lexer, Span, Token, TokenKind},
};

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    next_node_id: u32,
}

impl<'source> Parser<'source> {
    pub fn parse_compilation_unit(source_file: &'source SourceFile) -> CompilationUnit<'source> {
        let mut parser = Self {
            lexer: Lexer::new(source_file),
            next_node_id: 0,
        };

        let mut unit = CompilationUnit {
            source_file,
            items: Vec::new(),
        };

        while parser.lexer.peek().is_some() {
            unit.items.push(parser.parse_item());
        }

        unit
    }

    fn create_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn report_fatal_error(&self, offending_span: Span, message: &str) -> ! {
        self.lexer.source().report_fatal_error(offending_span, message)
    }

    fn end_of_file_span(&self) -> Span {
        let end = self.lexer.source().contents.len();
        Span::new(end.saturating_sub(1), end)
    }

    fn expect_peek(&mut self, expecting: &str) -> Token {
        let Some(token) = self.lexer.peek() else {
            self.report_fatal_error(
                self.end_of_file_span(),
                &format!("Expected {expecting} but reached end of file"),
            )
        };

        token
    }

    fn expect_next(&mut self, expecting: &str) -> Token {
        let Some(token) = self.lexer.next() else {
            self.report_fatal_error(
                self.end_of_file_span(),
                &format!("Expected {expecting} but reached end of file"),
            )
        };

        token
    }

    fn expect_next_to_be(&mut self, kind: TokenKind) -> Token {
        let token = self.expect_next(&format!("{kind:?}"));

        if token.kind != kind {
            self.report_fatal_error(
                token.span,
                &format!(
                    "Expected {:?} but found {:?} ({})",
                    kind,
                    token.kind,
                    self.lexer.source().value_of_span(token.span)
                ),
            )
        }

        token
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Token {
        self.expect_next_to_be(TokenKind::Keyword(keyword))
    }

    fn next_is(&mut self, kind: TokenKind) -> bool {
        self.lexer.peek().is_some_and(|t| t.kind == kind)
    }

    /// Consumes the next token if it matches `kind`
    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.next_is(kind) {
            return self.lexer.next();
        }

        None
    }

    fn parse_item(&mut self) -> Item {
        let peeked = self.expect_peek("a declaration or function definition");

        match peeked.kind {
            TokenKind::Keyword(Keyword::Const) => {
                let declaration = Box::new(self.parse_declaration());

                Item {
                    id: self.create_node_id(),
                    span: declaration.span,
                    kind: ItemKind::Declaration(declaration),
                }
            }
            TokenKind::Keyword(Keyword::Void) => {
                let function = Box::new(self.parse_function_definition());

                Item {
                    id: self.create_node_id(),
                    span: function.span,
                    kind: ItemKind::FunctionDefinition(function),
                }
            }
            TokenKind::Keyword(Keyword::Int) => {
                // `int name (` starts a function definition; anything else
                // is a global variable declaration
                if self
                    .lexer
                    .peek_nth(2)
                    .is_some_and(|t| t.kind == TokenKind::OpenParen)
                {
                    let function = Box::new(self.parse_function_definition());

                    Item {
                        id: self.create_node_id(),
                        span: function.span,
                        kind: ItemKind::FunctionDefinition(function),
                    }
                } else {
                    let declaration = Box::new(self.parse_declaration());

                    Item {
                        id: self.create_node_id(),
                        span: declaration.span,
                        kind: ItemKind::Declaration(declaration),
                    }
                }
            }
            _ => self.report_fatal_error(
                peeked.span,
                &format!(
                    "Expected a declaration or function definition but found: {} ({:?})",
                    self.lexer.source().value_of_span(peeked.span),
                    peeked.kind
                ),
            ),
        }
    }

    /// ("int" | "void") name "(" params ")" block
    fn parse_function_definition(&mut self) -> FunctionDefinition {
        let return_keyword = self.expect_next("`int` or `void`");

        let return_kind = match return_keyword.kind {
            TokenKind::Keyword(Keyword::Int) => ReturnKind::Int,
            TokenKind::Keyword(Keyword::Void) => ReturnKind::Void,
            _ => self.report_fatal_error(
                return_keyword.span,
                "Expected `int` or `void` as a function return type",
            ),
        };

        let name = self.parse_identifier();

        self.expect_next_to_be(TokenKind::OpenParen);

        let mut parameters = Vec::new();

        if !self.next_is(TokenKind::CloseParen) {
            loop {
                parameters.push(self.parse_parameter());

                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        self.expect_next_to_be(TokenKind::CloseParen);

        let body = self.parse_block();

        FunctionDefinition {
            id: self.create_node_id(),
            span: Span::new(return_keyword.span.start, body.span.end),
            return_kind,
            name,
            parameters,
            body,
        }
    }

    /// "int" name ("[" "]" ("[" const_exp "]")*)?
    fn parse_parameter(&mut self) -> Parameter {
        let int_keyword = self.expect_keyword(Keyword::Int);
        let name = self.parse_identifier();

        let mut end = name.span.end;

        let kind = if self.next_is(TokenKind::OpenBracket) {
            // The first dimension is always elided
            self.expect_next_to_be(TokenKind::OpenBracket);
            let close = self.expect_next_to_be(TokenKind::CloseBracket);
            end = close.span.end;

            let mut extents = Vec::new();

            while self.eat(TokenKind::OpenBracket).is_some() {
                extents.push(self.parse_expression());
                let close = self.expect_next_to_be(TokenKind::CloseBracket);
                end = close.span.end;
            }

            ParameterKind::Array { extents }
        } else {
            ParameterKind::Scalar
        };

        Parameter {
            id: self.create_node_id(),
            span: Span::new(int_keyword.span.start, end),
            name,
            kind,
        }
    }

    /// ("const")? "int" def ("," def)* ";"
    fn parse_declaration(&mut self) -> Declaration {
        let first = self.expect_peek("a declaration");

        let kind = if first.kind == TokenKind::Keyword(Keyword::Const) {
            self.expect_keyword(Keyword::Const);
            DeclarationKind::Const
        } else {
            DeclarationKind::Variable
        };

        self.expect_keyword(Keyword::Int);

        let mut definitions = Vec::new();

        loop {
            definitions.push(self.parse_definition(kind));

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

        Declaration {
            id: self.create_node_id(),
            span: Span::new(first.span.start, semicolon.span.end),
            kind,
            definitions,
        }
    }

    /// name ("[" const_exp "]")* ("=" initializer)?
    fn parse_definition(&mut self, declaration_kind: DeclarationKind) -> Definition {
        let name = self.parse_identifier();

        let mut extents = Vec::new();
        let mut end = name.span.end;

        while self.eat(TokenKind::OpenBracket).is_some() {
            extents.push(self.parse_expression());
            let close = self.expect_next_to_be(TokenKind::CloseBracket);
            end = close.span.end;
        }

        let initializer = if self.eat(TokenKind::Equals).is_some() {
            let initializer = self.parse_initializer();
            end = initializer.span.end;
            Some(initializer)
        } else {
            if declaration_kind == DeclarationKind::Const {
                self.report_fatal_error(
                    Span::new(name.span.start, end),
                    "A constant declaration requires an initializer",
                );
            }

            None
        };

        Definition {
            id: self.create_node_id(),
            span: Span::new(name.span.start, end),
            name,
            extents,
            initializer,
        }
    }

    /// expression | "{" (initializer ("," initializer)*)? "}"
    fn parse_initializer(&mut self) -> Initializer {
        if self.next_is(TokenKind::OpenBrace) {
            let open = self.expect_next_to_be(TokenKind::OpenBrace);

            let mut elements = Vec::new();

            if !self.next_is(TokenKind::CloseBrace) {
                loop {
                    elements.push(self.parse_initializer());

                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }

            let close = self.expect_next_to_be(TokenKind::CloseBrace);

            return Initializer {
                id: self.create_node_id(),
                span: Span::new(open.span.start, close.span.end),
                kind: InitializerKind::List(elements),
            };
        }

        let expression = self.parse_expression();

        Initializer {
            id: self.create_node_id(),
            span: expression.span,
            kind: InitializerKind::Expression(Box::new(expression)),
        }
    }

    fn parse_identifier(&mut self) -> Identifier {
        let token = self.expect_next_to_be(TokenKind::Identifier);
        let symbol = InternedSymbol::new(self.lexer.source().value_of_span(token.span));

        Identifier {
            id: self.create_node_id(),
            span: token.span,
            symbol,
        }
    }

    fn parse_block(&mut self) -> Block {
        let open = self.expect_next_to_be(TokenKind::OpenBrace);

        let mut items = Vec::new();

        while !self.next_is(TokenKind::CloseBrace) {
            let peeked = self.expect_peek("a declaration, statement, or `}`");

            match peeked.kind {
                TokenKind::Keyword(Keyword::Const) | TokenKind::Keyword(Keyword::Int) => {
                    items.push(BlockItem::Declaration(Box::new(self.parse_declaration())));
                }
                _ => items.push(BlockItem::Statement(Box::new(self.parse_statement()))),
            }
        }

        let close = self.expect_next_to_be(TokenKind::CloseBrace);

        Block {
            id: self.create_node_id(),
            span: Span::new(open.span.start, close.span.end),
            items,
        }
    }

    fn parse_statement(&mut self) -> Statement {
        let peeked = self.expect_peek("a statement");

        match peeked.kind {
            TokenKind::OpenBrace => {
                let block = self.parse_block();

                Statement {
                    id: self.create_node_id(),
                    span: block.span,
                    kind: StatementKind::Block(Box::new(block)),
                }
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Break) => {
                let keyword = self.expect_keyword(Keyword::Break);
                let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

                Statement {
                    id: self.create_node_id(),
                    span: Span::new(keyword.span.start, semicolon.span.end),
                    kind: StatementKind::Break,
                }
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let keyword = self.expect_keyword(Keyword::Continue);
                let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

                Statement {
                    id: self.create_node_id(),
                    span: Span::new(keyword.span.start, semicolon.span.end),
                    kind: StatementKind::Continue,
                }
            }
            TokenKind::Keyword(Keyword::Return) => {
                let keyword = self.expect_keyword(Keyword::Return);

                let value = if self.next_is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()))
                };

                let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

                Statement {
                    id: self.create_node_id(),
                    span: Span::new(keyword.span.start, semicolon.span.end),
                    kind: StatementKind::Return(value),
                }
            }
            TokenKind::Semicolon => {
                let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

                Statement {
                    id: self.create_node_id(),
                    span: semicolon.span,
                    kind: StatementKind::Expression(None),
                }
            }
            _ => self.parse_expression_or_assignment_statement(),
        }
    }

    /// Disambiguates `lval = exp ;` from a bare expression statement by
    /// parsing a full expression first and checking for `=` after it
    fn parse_expression_or_assignment_statement(&mut self) -> Statement {
        let expression = self.parse_expression();

        if self.eat(TokenKind::Equals).is_some() {
            let ExpressionKind::LValue(target) = expression.kind else {
                self.report_fatal_error(
                    expression.span,
                    "The target of an assignment must be a variable or array element",
                );
            };

            let value = self.parse_expression();
            let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

            return Statement {
                id: self.create_node_id(),
                span: Span::new(expression.span.start, semicolon.span.end),
                kind: StatementKind::Assign {
                    target,
                    value: Box::new(value),
                },
            };
        }

        let semicolon = self.expect_next_to_be(TokenKind::Semicolon);

        Statement {
            id: self.create_node_id(),
            span: Span::new(expression.span.start, semicolon.span.end),
            kind: StatementKind::Expression(Some(Box::new(expression))),
        }
    }

    /// "if" "(" exp ")" stmt ("else" stmt)?
    fn parse_if_statement(&mut self) -> Statement {
        let keyword = self.expect_keyword(Keyword::If);

        self.expect_next_to_be(TokenKind::OpenParen);
        let condition = self.parse_expression();
        self.expect_next_to_be(TokenKind::CloseParen);

        let then_branch = self.parse_statement();
        let mut end = then_branch.span.end;

        // The dangling else binds to the innermost `if`
        let else_branch = if self.eat(TokenKind::Keyword(Keyword::Else)).is_some() {
            let statement = self.parse_statement();
            end = statement.span.end;
            Some(Box::new(statement))
        } else {
            None
        };

        Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, end),
            kind: StatementKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
        }
    }

    /// "while" "(" exp ")" stmt
    fn parse_while_statement(&mut self) -> Statement {
        let keyword = self.expect_keyword(Keyword::While);

        self.expect_next_to_be(TokenKind::OpenParen);
        let condition = self.parse_expression();
        self.expect_next_to_be(TokenKind::CloseParen);

        let body = self.parse_statement();

        Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, body.span.end),
            kind: StatementKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
        }
    }

    pub fn parse_expression(&mut self) -> Expression {
        self.parse_logical_or_expression()
    }

    /// land_exp ("||" land_exp)*
    fn parse_logical_or_expression(&mut self) -> Expression {
        let mut lhs = self.parse_logical_and_expression();

        while self.eat(TokenKind::LogicalOr).is_some() {
            let rhs = self.parse_logical_and_expression();

            lhs = self.new_binary_expression(lhs, BinaryOperatorKind::LogicalOr, rhs);
        }

        lhs
    }

    /// eq_exp ("&&" eq_exp)*
    fn parse_logical_and_expression(&mut self) -> Expression {
        let mut lhs = self.parse_equality_expression();

        while self.eat(TokenKind::LogicalAnd).is_some() {
            let rhs = self.parse_equality_expression();

            lhs = self.new_binary_expression(lhs, BinaryOperatorKind::LogicalAnd, rhs);
        }

        lhs
    }

    /// rel_exp (("==" | "!=") rel_exp)*
    fn parse_equality_expression(&mut self) -> Expression {
        let mut lhs = self.parse_relational_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_equality_operator())
        {
            let operator = match self.expect_next("an equality operator").kind {
                TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
                TokenKind::NotEquals => BinaryOperatorKind::NotEquals,
                _ => unreachable!(),
            };

            let rhs = self.parse_relational_expression();

            lhs = self.new_binary_expression(lhs, operator, rhs);
        }

        lhs
    }

    /// add_exp (("<" | ">" | "<=" | ">=") add_exp)*
    fn parse_relational_expression(&mut self) -> Expression {
        let mut lhs = self.parse_additive_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_relational_operator())
        {
            let operator = match self.expect_next("a relational operator").kind {
                TokenKind::LessThan => BinaryOperatorKind::LessThan,
                TokenKind::LessThanOrEqualTo => BinaryOperatorKind::LessThanOrEqualTo,
                TokenKind::GreaterThan => BinaryOperatorKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo => BinaryOperatorKind::GreaterThanOrEqualTo,
                _ => unreachable!(),
            };

            let rhs = self.parse_additive_expression();

            lhs = self.new_binary_expression(lhs, operator, rhs);
        }

        lhs
    }

    /// mul_exp (("+" | "-") mul_exp)*
    fn parse_additive_expression(&mut self) -> Expression {
        let mut lhs = self.parse_multiplicative_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_term_operator())
        {
            let operator = match self.expect_next("an additive operator").kind {
                TokenKind::Plus => BinaryOperatorKind::Add,
                TokenKind::Minus => BinaryOperatorKind::Subtract,
                _ => unreachable!(),
            };

            let rhs = self.parse_multiplicative_expression();

            lhs = self.new_binary_expression(lhs, operator, rhs);
        }

        lhs
    }

    /// unary_exp (("*" | "/" | "%") unary_exp)*
    fn parse_multiplicative_expression(&mut self) -> Expression {
        let mut lhs = self.parse_unary_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_factor_operator())
        {
            let operator = match self.expect_next("a multiplicative operator").kind {
                TokenKind::Asterisk => BinaryOperatorKind::Multiply,
                TokenKind::Divide => BinaryOperatorKind::Divide,
                TokenKind::Modulus => BinaryOperatorKind::Modulus,
                _ => unreachable!(),
            };

            let rhs = self.parse_unary_expression();

            lhs = self.new_binary_expression(lhs, operator, rhs);
        }

        lhs
    }

    /// ("+" | "-" | "!")* primary_exp
    fn parse_unary_expression(&mut self) -> Expression {
        let peeked = self.expect_peek("an expression");

        if peeked.kind.is_unary_operator() {
            let operator_token = self.expect_next("a unary operator");

            let operator = match operator_token.kind {
                TokenKind::Plus => UnaryOperatorKind::Plus,
                TokenKind::Minus => UnaryOperatorKind::Negate,
                TokenKind::Bang => UnaryOperatorKind::LogicalNot,
                _ => unreachable!(),
            };

            let operand = self.parse_unary_expression();

            return Expression {
                id: self.create_node_id(),
                span: Span::new(operator_token.span.start, operand.span.end),
                kind: ExpressionKind::Unary {
                    operator,
                    operand: Box::new(operand),
                },
            };
        }

        self.parse_primary_expression()
    }

    /// "(" exp ")" | literal | call | lval
    fn parse_primary_expression(&mut self) -> Expression {
        let peeked = self.expect_peek("an expression");

        match peeked.kind {
            TokenKind::OpenParen => {
                self.expect_next_to_be(TokenKind::OpenParen);
                let inner = self.parse_expression();
                let close = self.expect_next_to_be(TokenKind::CloseParen);

                Expression {
                    id: self.create_node_id(),
                    span: Span::new(peeked.span.start, close.span.end),
                    kind: inner.kind,
                }
            }
            TokenKind::IntegerLiteral => {
                let token = self.expect_next_to_be(TokenKind::IntegerLiteral);
                let value = self.parse_integer_literal(&token);

                Expression {
                    id: self.create_node_id(),
                    span: token.span,
                    kind: ExpressionKind::Literal(value),
                }
            }
            TokenKind::Identifier => {
                if self
                    .lexer
                    .peek_nth(1)
                    .is_some_and(|t| t.kind == TokenKind::OpenParen)
                {
                    return self.parse_call_expression();
                }

                let lvalue = self.parse_lvalue();

                Expression {
                    id: self.create_node_id(),
                    span: lvalue.span,
                    kind: ExpressionKind::LValue(Box::new(lvalue)),
                }
            }
            _ => self.report_fatal_error(
                peeked.span,
                &format!(
                    "Expected an expression but found: {} ({:?})",
                    self.lexer.source().value_of_span(peeked.span),
                    peeked.kind
                ),
            ),
        }
    }

    /// name "(" (exp ("," exp)*)? ")"
    fn parse_call_expression(&mut self) -> Expression {
        let callee = self.parse_identifier();

        self.expect_next_to_be(TokenKind::OpenParen);

        let mut arguments = Vec::new();

        if !self.next_is(TokenKind::CloseParen) {
            loop {
                arguments.push(self.parse_expression());

                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        let close = self.expect_next_to_be(TokenKind::CloseParen);

        Expression {
            id: self.create_node_id(),
            span: Span::new(callee.span.start, close.span.end),
            kind: ExpressionKind::Call { callee, arguments },
        }
    }

    /// name ("[" exp "]")*
    fn parse_lvalue(&mut self) -> LValue {
        let name = self.parse_identifier();

        let mut indices = Vec::new();
        let mut end = name.span.end;

        while self.eat(TokenKind::OpenBracket).is_some() {
            indices.push(self.parse_expression());
            let close = self.expect_next_to_be(TokenKind::CloseBracket);
            end = close.span.end;
        }

        LValue {
            id: self.create_node_id(),
            span: Span::new(name.span.start, end),
            name,
            indices,
        }
    }

    fn parse_integer_literal(&self, token: &Token) -> i32 {
        let text = self.lexer.source().value_of_span(token.span);

        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            i64::from_str_radix(hex, 16)
        } else if text.len() > 1 && text.starts_with('0') {
            i64::from_str_radix(&text[1..], 8)
        } else {
            text.parse::<i64>()
        };

        match parsed {
            Ok(value) => value as i32,
            Err(_) => self.report_fatal_error(
                token.span,
                &format!("Invalid integer literal: {text}"),
            ),
        }
    }

    fn new_binary_expression(
        &mut self,
        lhs: Expression,
        operator: BinaryOperatorKind,
        rhs: Expression,
    ) -> Expression {
        Expression {
            id: self.create_node_id(),
            span: Span::new(lhs.span.start, rhs.span.end),
            kind: ExpressionKind::Binary {
                lhs: Box::new(lhs),
                operator,
                rhs: Box::new(rhs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast;

    fn parse(source: &SourceFile) -> CompilationUnit<'_> {
        Parser::parse_compilation_unit(source)
    }

    #[test]
    fn parses_function_with_parameters() {
        let source = SourceFile::new_in_memory("int f(int a, int b[], int c[][3]) { return a; }");
        let unit = parse(&source);

        assert_eq!(unit.items.len(), 1);

        let ItemKind::FunctionDefinition(function) = &unit.items[0].kind else {
            panic!("expected a function definition");
        };

        assert_eq!(function.name.symbol.value(), "f");
        assert_eq!(function.return_kind, ReturnKind::Int);
        assert_eq!(function.parameters.len(), 3);

        assert!(matches!(function.parameters[0].kind, ParameterKind::Scalar));
        assert!(matches!(
            &function.parameters[1].kind,
            ParameterKind::Array { extents } if extents.is_empty()
        ));
        assert!(matches!(
            &function.parameters[2].kind,
            ParameterKind::Array { extents } if extents.len() == 1
        ));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let source = SourceFile::new_in_memory("int main() { return 1 + 2 * 3; }");
        let unit = parse(&source);

        let ItemKind::FunctionDefinition(function) = &unit.items[0].kind else {
            panic!("expected a function definition");
        };
        let BlockItem::Statement(statement) = &function.body.items[0] else {
            panic!("expected a statement");
        };
        let StatementKind::Return(Some(value)) = &statement.kind else {
            panic!("expected a return statement");
        };
        let ExpressionKind::Binary { operator, rhs, .. } = &value.kind else {
            panic!("expected a binary expression");
        };

        assert_eq!(*operator, ast::BinaryOperatorKind::Add);
        assert!(matches!(
            rhs.kind,
            ExpressionKind::Binary {
                operator: ast::BinaryOperatorKind::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn dangling_else_binds_to_innermost_if() {
        let source =
            SourceFile::new_in_memory("int main() { if (1) if (2) return 1; else return 2; return 0; }");
        let unit = parse(&source);

        let ItemKind::FunctionDefinition(function) = &unit.items[0].kind else {
            panic!("expected a function definition");
        };
        let BlockItem::Statement(statement) = &function.body.items[0] else {
            panic!("expected a statement");
        };
        let StatementKind::If {
            then_branch,
            else_branch,
            ..
        } = &statement.kind
        else {
            panic!("expected an if statement");
        };

        assert!(else_branch.is_none());
        assert!(matches!(
            then_branch.kind,
            StatementKind::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn parses_nested_initializers() {
        let source = SourceFile::new_in_memory("int a[2][3] = {{1, 2}, 4, 5};");
        let unit = parse(&source);

        let ItemKind::Declaration(declaration) = &unit.items[0].kind else {
            panic!("expected a declaration");
        };

        let definition = &declaration.definitions[0];
        assert_eq!(definition.extents.len(), 2);

        let Some(Initializer {
            kind: InitializerKind::List(elements),
            ..
        }) = &definition.initializer
        else {
            panic!("expected a list initializer");
        };

        assert_eq!(elements.len(), 3);
        assert!(matches!(elements[0].kind, InitializerKind::List(_)));
    }
}
