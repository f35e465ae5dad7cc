use crate::error::CompileError;
use crate::ir::ast;
use crate::span::Location;
use super::lexer::{Token, TokenKind};

/// Deepest nesting of expressions and blocks the parser accepts.
pub const MAX_NESTING: usize = 256;

pub fn parse_tokens(tokens: Vec<Token>) -> Result<ast::Program, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0, depth: 0 }
    }

    fn parse_program(&mut self) -> Result<ast::Program, CompileError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_top_level()?);
        }

        Ok(ast::Program { statements })
    }

    fn parse_top_level(&mut self) -> Result<ast::Statement, CompileError> {
        match self.peek() {
            Some(token) if token.is_keyword("proc") || token.is_keyword("export") => {
                self.parse_proc()
            }
            _ => self.parse_statement(),
        }
    }

    fn parse_statement(&mut self) -> Result<ast::Statement, CompileError> {
        let token = self.current()?.clone();

        match token.kind {
            TokenKind::Keyword => match token.value.as_str() {
                "echo" => self.parse_echo(),
                "let" => self.parse_declaration(),
                "while" => self.parse_while(),
                "if" => self.parse_if(),
                "proc" | "export" => Err(CompileError::syntax(
                    token.location,
                    "Procedures can only be declared at the top level",
                )),
                _ => Err(CompileError::syntax(
                    token.location,
                    format!("Unrecognized statement: {}", token),
                )),
            },
            TokenKind::Identifier if self.lookahead(1).is_some_and(|t| t.is(TokenKind::Operator, "=")) => {
                self.parse_assignment()
            }
            _ => Err(CompileError::syntax(
                token.location,
                format!("Unrecognized token: {}", token),
            )),
        }
    }

    fn parse_proc(&mut self) -> Result<ast::Statement, CompileError> {
        let first = self.advance_token()?;
        let export = first.is_keyword("export");
        if export {
            let proc_keyword = self.advance_token()?;
            if !proc_keyword.is_keyword("proc") {
                return Err(CompileError::syntax(
                    proc_keyword.location,
                    format!("Expected `proc` after `export`, found {}", proc_keyword),
                ));
            }
        }

        let name = self.expect_identifier("procedure name")?;
        let (body, _) = self.parse_block(first.location, "proc", &["end"])?;

        Ok(ast::Statement::ProcDecl {
            name: name.value,
            export,
            body,
            location: first.location,
        })
    }

    fn parse_echo(&mut self) -> Result<ast::Statement, CompileError> {
        let echo = self.advance_token()?; // consume 'echo'
        let expression = self.parse_expression()?;
        Ok(ast::Statement::Print {
            expression,
            location: echo.location,
        })
    }

    fn parse_declaration(&mut self) -> Result<ast::Statement, CompileError> {
        self.advance(); // consume 'let'
        let identifier = self.expect_identifier("variable name after `let`")?;

        match self.peek() {
            Some(token) if token.is(TokenKind::Operator, "=") => {
                self.advance(); // consume '='
            }
            _ => {
                return Err(CompileError::syntax(
                    identifier.location,
                    format!("A variable must be initialized: `{}`", identifier.value),
                ));
            }
        }

        let value = self.parse_expression()?;
        Ok(ast::Statement::VarDeclAssign {
            name: identifier.value,
            value,
            location: identifier.location,
        })
    }

    fn parse_assignment(&mut self) -> Result<ast::Statement, CompileError> {
        let identifier = self.advance_token()?;
        self.advance(); // consume '='
        let value = self.parse_expression()?;
        Ok(ast::Statement::VarAssign {
            name: identifier.value,
            value,
            location: identifier.location,
        })
    }

    fn parse_while(&mut self) -> Result<ast::Statement, CompileError> {
        let keyword = self.advance_token()?; // consume 'while'
        let condition = self.parse_condition("while")?;
        let (body, _) = self.parse_block(keyword.location, "while", &["end"])?;

        Ok(ast::Statement::While {
            condition,
            body,
            location: keyword.location,
        })
    }

    fn parse_if(&mut self) -> Result<ast::Statement, CompileError> {
        let keyword = self.advance_token()?; // consume 'if'
        let condition = self.parse_condition("if")?;
        let (then_branch, terminator) = self.parse_block(keyword.location, "if", &["else", "end"])?;

        let else_branch = if terminator == "else" {
            let (statements, _) = self.parse_block(keyword.location, "if", &["end"])?;
            Some(statements)
        } else {
            None
        };

        Ok(ast::Statement::If {
            condition,
            then_branch,
            else_branch,
            location: keyword.location,
        })
    }

    /// `( expr )` header shared by `while` and `if`.
    fn parse_condition(&mut self, construct: &str) -> Result<ast::Expression, CompileError> {
        let open = self.advance_token()?;
        if open.kind != TokenKind::OpenParen {
            return Err(CompileError::syntax(
                open.location,
                format!("`{}` should be followed by an open parenthesis, found {}", construct, open),
            ));
        }

        let condition = self.parse_expression()?;

        match self.peek() {
            Some(token) if token.kind == TokenKind::CloseParen => {
                self.advance();
                Ok(condition)
            }
            Some(token) => Err(CompileError::syntax(
                token.location,
                format!("`{}` condition should end with a close parenthesis, found {}", construct, token),
            )),
            None => Err(CompileError::syntax(
                open.location,
                format!("Unclosed parenthesis in `{}` condition", construct),
            )),
        }
    }

    /// Parses statements until one of `terminators` and consumes it.
    fn parse_block(
        &mut self,
        opened_at: Location,
        construct: &str,
        terminators: &[&str],
    ) -> Result<(Vec<ast::Statement>, String), CompileError> {
        self.nested(opened_at, |parser| parser.parse_block_body(opened_at, construct, terminators))
    }

    fn parse_block_body(
        &mut self,
        opened_at: Location,
        construct: &str,
        terminators: &[&str],
    ) -> Result<(Vec<ast::Statement>, String), CompileError> {
        let mut body = Vec::new();

        loop {
            match self.peek() {
                Some(token)
                    if token.kind == TokenKind::Keyword
                        && terminators.contains(&token.value.as_str()) =>
                {
                    let terminator = token.value.clone();
                    self.advance();
                    return Ok((body, terminator));
                }
                Some(_) => body.push(self.parse_statement()?),
                None => {
                    return Err(CompileError::syntax(
                        opened_at,
                        format!("`{}` is never closed, expected `end`", construct),
                    ));
                }
            }
        }
    }

    /// operand (OPERATOR expr)?
    ///
    /// There are no precedence levels: an operator takes the whole rest of
    /// the expression as its right operand, so `a - b + c` is `a - (b + c)`.
    fn parse_expression(&mut self) -> Result<ast::Expression, CompileError> {
        let location = self.current()?.location;
        self.nested(location, |parser| parser.parse_binary())
    }

    fn parse_binary(&mut self) -> Result<ast::Expression, CompileError> {
        let left = self.parse_operand()?;

        let operator = match self.peek() {
            Some(token) if token.kind == TokenKind::Operator => token.clone(),
            _ => return Ok(left),
        };

        let op = ast::BinaryOperator::from_symbol(&operator.value).ok_or_else(|| {
            CompileError::syntax(
                operator.location,
                format!("{} cannot be used inside an expression", operator),
            )
        })?;
        self.advance(); // consume operator

        let right = self.parse_expression()?;
        Ok(ast::Expression::BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
            location: operator.location,
        })
    }

    fn parse_operand(&mut self) -> Result<ast::Expression, CompileError> {
        let token = self.advance_token()?;

        match token.kind {
            TokenKind::Number => {
                let value = token.value.parse::<f32>().map_err(|_| {
                    CompileError::syntax(token.location, format!("Invalid number literal {}", token))
                })?;
                Ok(ast::Expression::NumberLiteral {
                    value,
                    location: token.location,
                })
            }
            TokenKind::Identifier => Ok(ast::Expression::Identifier {
                name: token.value,
                location: token.location,
            }),
            TokenKind::OpenParen => {
                let expression = self.parse_expression()?;
                match self.peek() {
                    Some(close) if close.kind == TokenKind::CloseParen => {
                        self.advance();
                        Ok(ast::Expression::SubExpr {
                            expression: Box::new(expression),
                            location: token.location,
                        })
                    }
                    _ => Err(CompileError::syntax(token.location, "Unclosed parenthesis")),
                }
            }
            _ => Err(CompileError::syntax(
                token.location,
                format!("Expected number, identifier, or '(', found {}", token),
            )),
        }
    }

    /// Runs `parse` one nesting level deeper, refusing to go past
    /// [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        location: Location,
        parse: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth == MAX_NESTING {
            return Err(CompileError::syntax(
                location,
                format!("Nesting deeper than {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_identifier(&mut self, what: &str) -> Result<Token, CompileError> {
        let token = self.advance_token()?;
        if token.kind == TokenKind::Identifier {
            Ok(token)
        } else {
            Err(CompileError::syntax(
                token.location,
                format!("Expected {}, found {}", what, token),
            ))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn lookahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    fn current(&self) -> Result<&Token, CompileError> {
        self.peek().ok_or_else(|| self.unexpected_end())
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    fn advance_token(&mut self) -> Result<Token, CompileError> {
        let token = self.current()?.clone();
        self.position += 1;
        Ok(token)
    }

    fn unexpected_end(&self) -> CompileError {
        let location = self
            .tokens
            .last()
            .map(|t| t.location)
            .unwrap_or_default();
        CompileError::syntax(location, "Unexpected end of input")
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_none()
    }
}
