//! # Condition Compiler
//!
//! Computed node properties (`visible`, `readOnly`, `disabled`,
//! `required`, `watch`) are written as small expressions over other
//! nodes' values:
//!
//! ```text
//! ../category === "movie" && !#/settings/locked
//! ["a", "b"].includes(../kind)
//! ```
//!
//! ## Grammar
//!
//! ```text
//! or       := and ( "||" and )*
//! and      := equality ( "&&" equality )*
//! equality := unary ( ("===" | "==" | "!==" | "!=") unary )*
//! unary    := "!" unary | postfix
//! postfix  := primary ( "." "includes" "(" or ")" )*
//! primary  := literal | path | "(" or ")" | "[" (or ("," or)*)? "]"
//! path     := ("#" | ".." | ".") ( "/" segment )+
//! ```
//!
//! Literals are JSON strings, single-quoted strings, numbers, `true`,
//! `false`, `null`, and `undefined`.
//!
//! ## Binding
//!
//! Parsing yields an [`Expr`] with path strings. Binding replaces each
//! path with an index into a node's shared [`Dependencies`] list, appending
//! first-seen paths. Evaluation reads a parallel slice of resolved values,
//! so `values[i]` is the value at `dependencies.paths()[i]`.

mod eval;
mod lexer;
mod parser;

pub use eval::{equals, truthy};

use serde_json::Value;

use formtree_core::ConditionError;

/// Expression AST, generic over how paths are represented.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P = String> {
    /// A constant. `None` is `undefined`.
    Literal(Option<Value>),
    /// A value reference.
    Path(P),
    /// An array literal with non-constant elements.
    List(Vec<Expr<P>>),
    /// `!x`.
    Not(Box<Expr<P>>),
    /// `a && b`.
    And(Box<Expr<P>>, Box<Expr<P>>),
    /// `a || b`.
    Or(Box<Expr<P>>, Box<Expr<P>>),
    /// `===`, `==`, `!==`, `!=`.
    Equals {
        /// Left operand.
        left: Box<Expr<P>>,
        /// Right operand.
        right: Box<Expr<P>>,
        /// `===` / `!==`.
        strict: bool,
        /// `!==` / `!=`.
        negated: bool,
    },
    /// `collection.includes(item)`.
    Includes {
        /// Array (or string) searched.
        collection: Box<Expr<P>>,
        /// Searched-for value.
        item: Box<Expr<P>>,
    },
}

impl<P> Expr<P> {
    /// Every path reference, in source order.
    pub fn paths(&self) -> Vec<&P> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a P>) {
        match self {
            Self::Literal(_) => {}
            Self::Path(p) => out.push(p),
            Self::List(items) => items.iter().for_each(|i| i.collect_paths(out)),
            Self::Not(inner) => inner.collect_paths(out),
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_paths(out);
                r.collect_paths(out);
            }
            Self::Equals { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
            Self::Includes { collection, item } => {
                collection.collect_paths(out);
                item.collect_paths(out);
            }
        }
    }

    fn map_paths<Q>(&self, f: &mut dyn FnMut(&P) -> Q) -> Expr<Q> {
        match self {
            Self::Literal(v) => Expr::Literal(v.clone()),
            Self::Path(p) => Expr::Path(f(p)),
            Self::List(items) => Expr::List(items.iter().map(|i| i.map_paths(f)).collect()),
            Self::Not(inner) => Expr::Not(Box::new(inner.map_paths(f))),
            Self::And(l, r) => Expr::And(Box::new(l.map_paths(f)), Box::new(r.map_paths(f))),
            Self::Or(l, r) => Expr::Or(Box::new(l.map_paths(f)), Box::new(r.map_paths(f))),
            Self::Equals {
                left,
                right,
                strict,
                negated,
            } => Expr::Equals {
                left: Box::new(left.map_paths(f)),
                right: Box::new(right.map_paths(f)),
                strict: *strict,
                negated: *negated,
            },
            Self::Includes { collection, item } => Expr::Includes {
                collection: Box::new(collection.map_paths(f)),
                item: Box::new(item.map_paths(f)),
            },
        }
    }
}

/// Strip whitespace and trailing `;` terminators.
pub fn strip_terminators(source: &str) -> &str {
    source.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Parse an expression. An empty expression is `Ok(None)`.
///
/// # Errors
///
/// Returns `ConditionError` for malformed input.
pub fn parse_expression(source: &str) -> Result<Option<Expr>, ConditionError> {
    let source = strip_terminators(source);
    if source.is_empty() {
        return Ok(None);
    }
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(tokens).parse().map(Some)
}

/// A node's ordered, de-duplicated dependency paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    paths: Vec<String>,
}

impl Dependencies {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `path`, appending it if unseen.
    pub fn index_of(&mut self, path: &str) -> usize {
        match self.paths.iter().position(|p| p == path) {
            Some(index) => index,
            None => {
                self.paths.push(path.to_string());
                self.paths.len() - 1
            }
        }
    }

    /// Paths in index order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is referenced.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A compiled predicate over dependency values.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr<usize>,
}

impl Predicate {
    /// Bind a parsed expression against a node's dependency list.
    pub fn bind(expr: &Expr, dependencies: &mut Dependencies) -> Self {
        Self {
            expr: expr.map_paths(&mut |path: &String| dependencies.index_of(path)),
        }
    }

    /// Truthiness of the expression for the given dependency values.
    pub fn evaluate(&self, values: &[Option<Value>]) -> bool {
        truthy(self.expr.evaluate(values).as_ref())
    }

    /// The bound expression.
    pub fn expr(&self) -> &Expr<usize> {
        &self.expr
    }
}

/// How a computed boolean property is decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// A schema literal that bypasses expressions.
    Constant(bool),
    /// A compiled expression.
    Compiled(Predicate),
}

impl Rule {
    /// Evaluate, falling back to `identity` when there is no rule.
    pub fn resolve(rule: Option<&Rule>, values: &[Option<Value>], identity: bool) -> bool {
        match rule {
            None => identity,
            Some(Rule::Constant(b)) => *b,
            Some(Rule::Compiled(p)) => p.evaluate(values),
        }
    }
}
