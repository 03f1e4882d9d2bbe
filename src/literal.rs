//! Safe evaluation of literal syntax.
//!
//! Settings files are PowerShell data files. They are never executed: the
//! hashtable literal they contain is walked and turned into a
//! [`LiteralValue`]. Only the literal subset below is accepted; any other
//! node (commands, arithmetic, interpolation, casts, `$( )`, script blocks,
//! variables other than `$true`/`$false`) is rejected with
//! [`UnsupportedLiteral`].
//!
//! | Syntax | Value |
//! |--------|-------|
//! | `@{ Key = value }` | [`LiteralValue::Map`] |
//! | `@( ... )`, `a, b` | [`LiteralValue::Array`] |
//! | `'text'`, `"text"`, here-strings | [`LiteralValue::String`] |
//! | `42`, `-1`, `0x10`, `1.5` | [`LiteralValue::Number`] |
//! | `$true`, `$false` | [`LiteralValue::Bool`] |
//! | `('text')` | one-element [`LiteralValue::Array`] |
//!
//! ```
//! use pslint::literal::evaluate;
//! use pslint::LiteralValue;
//!
//! let ast = pslint::parser::parse_string("@{ Severity = @('Error', 'Warning') }").unwrap();
//! let value = evaluate(ast.first_hashtable().unwrap()).unwrap();
//! let severity = value.as_map().unwrap().get("severity").unwrap();
//! assert_eq!(severity.as_string_list().unwrap(), vec!["Error", "Warning"]);
//! ```

use pslint_common::parser::ast::{Extent, Node, NodeKind};
use pslint_common::{LiteralValue, NameMap};
use thiserror::Error;

/// A node outside the accepted literal grammar.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{kind} is not allowed in a settings literal at line {}, column {}",
    .extent.start.line,
    .extent.start.column
)]
pub struct UnsupportedLiteral {
    /// Extent of the offending node
    pub extent: Extent,
    /// Short description of the node kind
    pub kind: &'static str,
}

impl UnsupportedLiteral {
    fn new(node: &Node) -> Self {
        Self {
            extent: node.extent.clone(),
            kind: node.kind.describe(),
        }
    }
}

/// Evaluate a literal node.
pub fn evaluate(node: &Node) -> Result<LiteralValue, UnsupportedLiteral> {
    match &node.kind {
        NodeKind::Hashtable(entries) => {
            let mut map = NameMap::new();
            for entry in entries {
                map.insert(entry.key.clone(), evaluate(&entry.value)?);
            }
            Ok(LiteralValue::Map(map))
        }
        NodeKind::ArrayExpression(statements) => {
            let mut items = Vec::new();
            for statement in statements {
                match evaluate(statement)? {
                    LiteralValue::Array(inner) => items.extend(inner),
                    value => items.push(value),
                }
            }
            Ok(LiteralValue::Array(items))
        }
        NodeKind::ArrayLiteral(elements) => elements
            .iter()
            .map(evaluate)
            .collect::<Result<Vec<_>, _>>()
            .map(LiteralValue::Array),
        NodeKind::Paren(inner) => match evaluate(inner)? {
            // ('x') reads as a one-element array
            scalar @ (LiteralValue::Bool(_)
            | LiteralValue::Number(_)
            | LiteralValue::String(_)) => Ok(LiteralValue::Array(vec![scalar])),
            value => Ok(value),
        },
        NodeKind::StringConstant { value, .. } => Ok(LiteralValue::String(value.clone())),
        NodeKind::Number(number) => Ok(LiteralValue::Number(*number)),
        NodeKind::Variable(name) if name.eq_ignore_ascii_case("true") => {
            Ok(LiteralValue::Bool(true))
        }
        NodeKind::Variable(name) if name.eq_ignore_ascii_case("false") => {
            Ok(LiteralValue::Bool(false))
        }
        _ => Err(UnsupportedLiteral::new(node)),
    }
}
