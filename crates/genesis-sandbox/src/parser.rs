//! Recursive-descent parser: token stream to [`TraitDef`].
//!
//! The grammar is small by construction rather than by an external
//! restriction bolted on afterwards: there is no AST node a `for` loop's
//! upper bound could occupy other than a literal integer, so "loop bounds
//! must be statically known" is enforced by what the parser is able to
//! build, not by a check run over what it already built.

use crate::ast::{AssignOp, AssignTarget, BinOp, Builtin, ConstDecl, Expr, Method, Stmt, TraitDef, UnOp};
use crate::lexer::Token;

const MAX_FOR_UPPER_BOUND: u32 = 100;

/// Why parsing failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Ran out of tokens mid-construct.
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),
    /// Found a token where a different one was required.
    #[error("expected {expected} but found {found:?}")]
    Expected {
        /// What was required.
        expected: &'static str,
        /// What was actually there.
        found: Token,
    },
    /// An identifier used as a keyword or entity field isn't one the DSL recognizes.
    #[error("unknown {what}: {name}")]
    Unknown {
        /// What kind of name this was (field, method, builtin).
        what: &'static str,
        /// The offending name.
        name: String,
    },
    /// A `for` loop's upper bound was not a literal integer in `[0, 100]`.
    #[error("for-loop upper bound must be a literal integer from 0 to {MAX_FOR_UPPER_BOUND}, got {0}")]
    LoopBoundTooLarge(f64),
    /// There was more than one `trait` block, or none at all.
    #[error("a trait file must declare exactly one `trait` block")]
    WrongTraitBlockCount,
    /// Trailing tokens after the single trait block.
    #[error("unexpected trailing tokens after the trait block")]
    TrailingTokens,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name.clone()),
            Some(found) => Err(ParseError::Expected { expected, found: found.clone() }),
            None => Err(ParseError::UnexpectedEof(expected)),
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some(Token::Ident(name)) if name == keyword => Ok(()),
            Some(found) => Err(ParseError::Expected { expected: keyword, found: found.clone() }),
            None => Err(ParseError::UnexpectedEof(keyword)),
        }
    }

    fn expect_token(&mut self, expected_tok: Token, label: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some(found) if *found == expected_tok => Ok(()),
            Some(found) => Err(ParseError::Expected { expected: label, found: found.clone() }),
            None => Err(ParseError::UnexpectedEof(label)),
        }
    }

    fn peek_is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn parse_file(&mut self) -> Result<TraitDef, ParseError> {
        let mut consts = Vec::new();
        let mut trait_def: Option<TraitDef> = None;

        while self.peek().is_some() {
            if self.peek_is_keyword("const") {
                consts.push(self.parse_const()?);
            } else if self.peek_is_keyword("trait") {
                if trait_def.is_some() {
                    return Err(ParseError::WrongTraitBlockCount);
                }
                trait_def = Some(self.parse_trait(consts.clone())?);
            } else {
                return Err(ParseError::TrailingTokens);
            }
        }

        trait_def.ok_or(ParseError::WrongTraitBlockCount)
    }

    fn parse_const(&mut self) -> Result<ConstDecl, ParseError> {
        self.expect_keyword("const")?;
        let name = self.expect_ident("constant name")?;
        self.expect_token(Token::Eq, "'='")?;
        let value = self.parse_number_literal("constant value")?;
        self.expect_token(Token::Semicolon, "';'")?;
        Ok(ConstDecl { name, value })
    }

    fn parse_number_literal(&mut self, what: &'static str) -> Result<f64, ParseError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Number(n)) => Ok(-n),
                Some(found) => Err(ParseError::Expected { expected: what, found: found.clone() }),
                None => Err(ParseError::UnexpectedEof(what)),
            },
            Some(found) => Err(ParseError::Expected { expected: what, found: found.clone() }),
            None => Err(ParseError::UnexpectedEof(what)),
        }
    }

    fn parse_trait(&mut self, consts: Vec<ConstDecl>) -> Result<TraitDef, ParseError> {
        self.expect_keyword("trait")?;
        let name = self.expect_ident("trait name")?;
        self.expect_token(Token::LBrace, "'{'")?;
        self.expect_keyword("fn")?;
        self.expect_keyword("execute")?;
        self.expect_token(Token::LParen, "'('")?;
        self.expect_keyword("entity")?;
        self.expect_token(Token::RParen, "')'")?;
        self.expect_token(Token::LBrace, "'{'")?;
        let body = self.parse_stmts()?;
        self.expect_token(Token::RBrace, "'}' closing execute")?;
        self.expect_token(Token::RBrace, "'}' closing trait")?;
        Ok(TraitDef { name, consts, body })
    }

    fn parse_stmts(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !matches!(self.peek(), Some(Token::RBrace) | None) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_is_keyword("if") {
            return self.parse_if();
        }
        if self.peek_is_keyword("for") {
            return self.parse_for();
        }
        if self.peek_is_keyword("entity") {
            return self.parse_entity_stmt();
        }
        Err(ParseError::Expected {
            expected: "a statement (if/for/entity.*)",
            found: self.peek().cloned().unwrap_or(Token::RBrace),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("if")?;
        let cond = self.parse_expr()?;
        self.expect_token(Token::LBrace, "'{'")?;
        let then_branch = self.parse_stmts()?;
        self.expect_token(Token::RBrace, "'}'")?;
        let else_branch = if self.peek_is_keyword("else") {
            self.advance();
            self.expect_token(Token::LBrace, "'{'")?;
            let stmts = self.parse_stmts()?;
            self.expect_token(Token::RBrace, "'}'")?;
            stmts
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("for")?;
        let var = self.expect_ident("loop variable")?;
        self.expect_keyword("in")?;
        let lower = self.parse_number_literal("range lower bound")?;
        if lower != 0.0 {
            return Err(ParseError::Expected {
                expected: "a range starting at 0",
                found: Token::Number(lower),
            });
        }
        self.expect_token(Token::DotDot, "'..'")?;
        let upper = self.parse_number_literal("range upper bound")?;
        if upper.fract() != 0.0 || upper < 0.0 || upper > f64::from(MAX_FOR_UPPER_BOUND) {
            return Err(ParseError::LoopBoundTooLarge(upper));
        }
        self.expect_token(Token::LBrace, "'{'")?;
        let body = self.parse_stmts()?;
        self.expect_token(Token::RBrace, "'}'")?;
        Ok(Stmt::For { var, upper: upper as u32, body })
    }

    fn parse_entity_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("entity")?;
        self.expect_token(Token::Dot, "'.'")?;
        let member = self.expect_ident("entity member")?;

        if member == "move" {
            self.expect_token(Token::LParen, "'('")?;
            let dx = self.parse_expr()?;
            self.expect_token(Token::Comma, "','")?;
            let dy = self.parse_expr()?;
            self.expect_token(Token::RParen, "')'")?;
            self.expect_token(Token::Semicolon, "';'")?;
            return Ok(Stmt::Call(Method::Move(dx, dy)));
        }
        if member == "consume_resource" {
            self.expect_token(Token::LParen, "'('")?;
            let radius = self.parse_expr()?;
            self.expect_token(Token::RParen, "')'")?;
            self.expect_token(Token::Semicolon, "';'")?;
            return Ok(Stmt::Call(Method::ConsumeResource(radius)));
        }

        let target = match member.as_str() {
            "energy" => AssignTarget::Energy,
            "energy_consumption_rate" => AssignTarget::EnergyConsumptionRate,
            other => return Err(ParseError::Unknown { what: "assignable entity field", name: other.to_string() }),
        };
        let op = match self.advance() {
            Some(Token::Eq) => AssignOp::Set,
            Some(Token::PlusEq) => AssignOp::AddAssign,
            Some(Token::MinusEq) => AssignOp::SubAssign,
            Some(Token::StarEq) => AssignOp::MulAssign,
            Some(found) => return Err(ParseError::Expected { expected: "an assignment operator", found: found.clone() }),
            None => return Err(ParseError::UnexpectedEof("an assignment operator")),
        };
        let value = self.parse_expr()?;
        self.expect_token(Token::Semicolon, "';'")?;
        Ok(Stmt::Assign { target, op, value })
    }

    // Expression grammar, lowest to highest precedence:
    // comparison -> additive -> multiplicative -> unary -> primary
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::Ge,
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect_token(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "entity" => {
                self.expect_token(Token::Dot, "'.'")?;
                let field = self.expect_ident("entity field")?;
                match field.as_str() {
                    "x" | "y" | "energy" | "max_energy" | "age" | "generation" | "metabolism_rate"
                    | "energy_consumption_rate" => Ok(Expr::EntityField(field)),
                    other => Err(ParseError::Unknown { what: "readable entity field", name: other.to_string() }),
                }
            }
            Some(Token::Ident(name)) => {
                if let Some(builtin) = builtin_from_name(&name) {
                    self.expect_token(Token::LParen, "'('")?;
                    let args = self.parse_call_args()?;
                    Ok(Expr::BuiltinCall(builtin, args))
                } else if matches!(self.peek(), Some(Token::LParen)) {
                    Err(ParseError::Unknown { what: "function", name })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(found) => Err(ParseError::Expected { expected: "an expression", found }),
            None => Err(ParseError::UnexpectedEof("an expression")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(found) => return Err(ParseError::Expected { expected: "',' or ')'", found: found.clone() }),
                None => return Err(ParseError::UnexpectedEof("',' or ')'")),
            }
        }
        Ok(args)
    }
}

fn builtin_from_name(name: &str) -> Option<Builtin> {
    match name {
        "abs" => Some(Builtin::Abs),
        "min" => Some(Builtin::Min),
        "max" => Some(Builtin::Max),
        "clamp" => Some(Builtin::Clamp),
        "rand" => Some(Builtin::Rand),
        "distance" => Some(Builtin::Distance),
        "nearest_resource_distance" => Some(Builtin::NearestResourceDistance),
        "nearest_entity_distance" => Some(Builtin::NearestEntityDistance),
        _ => None,
    }
}

/// Parse a full trait-file token stream into a [`TraitDef`].
pub fn parse(tokens: &[Token]) -> Result<TraitDef, ParseError> {
    Parser::new(tokens).parse_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_src(src: &str) -> Result<TraitDef, ParseError> {
        let tokens = lex(src).expect("lex");
        parse(&tokens)
    }

    #[test]
    fn parses_a_minimal_trait() {
        let def = parse_src("trait wander { fn execute(entity) { entity.move(1.0, 0.0); } }").expect("parse");
        assert_eq!(def.name, "wander");
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn parses_consts_and_for_and_if() {
        let src = "const STEP = 2.0; \
                   trait forage { fn execute(entity) { \
                       for i in 0..3 { \
                           if entity.energy < STEP { entity.energy += STEP; } else { entity.move(STEP, 0.0); } \
                       } \
                   } }";
        let def = parse_src(src).expect("parse");
        assert_eq!(def.consts.len(), 1);
        assert!(matches!(&def.body[0], Stmt::For { upper: 3, .. }));
    }

    #[test]
    fn rejects_a_for_loop_bound_above_the_cap() {
        let src = "trait x { fn execute(entity) { for i in 0..101 { entity.energy += 1; } } }";
        let err = parse_src(src).unwrap_err();
        assert!(matches!(err, ParseError::LoopBoundTooLarge(101.0)));
    }

    #[test]
    fn rejects_a_for_loop_bound_that_is_not_a_literal() {
        let src = "const N = 5; trait x { fn execute(entity) { for i in 0..N { entity.energy += 1; } } }";
        let err = parse_src(src).unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }) || matches!(err, ParseError::UnexpectedEof(_)));
    }

    #[test]
    fn rejects_an_unknown_entity_field() {
        let src = "trait x { fn execute(entity) { entity.mood = 1; } }";
        let err = parse_src(src).unwrap_err();
        assert!(matches!(err, ParseError::Unknown { .. }));
    }

    #[test]
    fn rejects_a_second_trait_block() {
        let src = "trait a { fn execute(entity) {} } trait b { fn execute(entity) {} }";
        let err = parse_src(src).unwrap_err();
        assert_eq!(err, ParseError::WrongTraitBlockCount);
    }
}
