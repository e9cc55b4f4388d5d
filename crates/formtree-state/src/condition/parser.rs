//! Recursive-descent parser for condition expressions.
//!
//! Precedence, loosest first: `||`, `&&`, equality, `!`, method call.

use serde_json::Value;

use formtree_core::pointer::{CURRENT_TOKEN, PARENT_TOKEN, ROOT_TOKEN};
use formtree_core::ConditionError;

use super::lexer::{Token, TokenKind};
use super::Expr;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::End, |t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token {
            kind: TokenKind::End,
            offset: 0,
        });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(token: Token) -> ConditionError {
        match token.kind {
            TokenKind::End => ConditionError::UnexpectedEnd,
            kind => ConditionError::UnexpectedToken {
                found: kind.render(),
                offset: token.offset,
            },
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ConditionError> {
        let token = self.advance();
        if token.kind == kind {
            Ok(())
        } else {
            Err(Self::unexpected(token))
        }
    }

    /// Parse a whole expression; trailing tokens are an error.
    pub(crate) fn parse(mut self) -> Result<Expr, ConditionError> {
        let expr = self.or()?;
        match self.peek() {
            TokenKind::End => Ok(expr),
            _ => Err(Self::unexpected(self.advance())),
        }
    }

    fn or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and()?;
        while *self.peek() == TokenKind::Or {
            self.advance();
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.equality()?;
        while *self.peek() == TokenKind::And {
            self.advance();
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.unary()?;
        loop {
            let (strict, negated) = match self.peek() {
                TokenKind::StrictEq => (true, false),
                TokenKind::LooseEq => (false, false),
                TokenKind::StrictNe => (true, true),
                TokenKind::LooseNe => (false, true),
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Equals {
                left: Box::new(left),
                right: Box::new(right),
                strict,
                negated,
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if *self.peek() == TokenKind::Not {
            self.advance();
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.primary()?;
        while *self.peek() == TokenKind::Dot {
            self.advance();
            let name = match self.advance() {
                Token {
                    kind: TokenKind::Ident(name),
                    ..
                } => name,
                other => return Err(Self::unexpected(other)),
            };
            if name != "includes" {
                return Err(ConditionError::UnknownMethod { name });
            }
            self.expect(TokenKind::LParen)?;
            let item = self.or()?;
            self.expect(TokenKind::RParen)?;
            expr = Expr::Includes {
                collection: Box::new(expr),
                item: Box::new(item),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Literal(value) => Ok(Expr::Literal(value)),
            TokenKind::Path(path) => {
                if [ROOT_TOKEN, PARENT_TOKEN, CURRENT_TOKEN].contains(&path.as_str()) {
                    return Err(ConditionError::EmptyPath { path });
                }
                Ok(Expr::Path(path))
            }
            TokenKind::LParen => {
                let inner = self.or()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.list(),
            kind => Err(Self::unexpected(Token {
                kind,
                offset: token.offset,
            })),
        }
    }

    /// Array literal; folds to a single literal when every element is one.
    fn list(&mut self) -> Result<Expr, ConditionError> {
        let mut items = Vec::new();
        if *self.peek() != TokenKind::RBracket {
            loop {
                items.push(self.or()?);
                if *self.peek() == TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;

        let literals: Option<Vec<Value>> = items
            .iter()
            .map(|item| match item {
                Expr::Literal(value) => Some(value.clone().unwrap_or(Value::Null)),
                _ => None,
            })
            .collect();
        Ok(match literals {
            Some(values) => Expr::Literal(Some(Value::Array(values))),
            None => Expr::List(items),
        })
    }
}
