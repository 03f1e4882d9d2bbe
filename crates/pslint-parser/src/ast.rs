//! AST types for PowerShell scripts and data files.
//!
//! This module defines the tree produced by [`crate::parse_string`] and
//! [`crate::parse_file`]. The node set is closed: it covers the literal subset
//! needed to read settings files (hashtables, arrays, scalars, variables) plus
//! the statement forms rules commonly look at (commands, pipelines, functions,
//! `param()` blocks with attributes, class headers). Everything carries an
//! [`Extent`] so diagnostics and corrections can point back at the source.
//!
//! # AST Structure
//!
//! ```text
//! ScriptAst
//!  ├─ param_block      (Option<ParamBlock>, with attributes)
//!  └─ statements: Vec<Node>
//!       ├─ Hashtable / ArrayExpression / ArrayLiteral / Paren
//!       ├─ StringConstant / ExpandableString / Number / Variable
//!       ├─ Command { name, arguments }  ── Pipeline
//!       ├─ FunctionDefinition { name, body: ScriptBlock }
//!       └─ TypeDefinition { name, attributes }
//! ```
//!
//! # Example
//!
//! ```
//! use pslint_parser::ast::NodeKind;
//! use pslint_parser::parse_string;
//!
//! let ast = parse_string("@{ Severity = 'Error' }").unwrap();
//! let table = ast.first_hashtable().unwrap();
//! assert!(matches!(table.kind, NodeKind::Hashtable(_)));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// A position (line, column, byte offset) in the source text.
///
/// Lines and columns are 1-based, columns count characters; `offset` is a
/// 0-based byte offset suitable for slicing the original source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    /// 0-based byte offset in the source string.
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Order two positions by (line, column) only.
    ///
    /// Byte offsets are ignored because extents coming from other parsers
    /// may not carry them.
    pub fn cmp_line_column(&self, other: &Position) -> Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// A half-open source range defined by a start and end [`Position`].
///
/// `start` is inclusive, `end` is exclusive (one past the last character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start position.
    pub start: Position,
    /// Exclusive end position.
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A source region with its originating file and raw text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// The source text covered by the extent.
    pub text: String,
}

impl Extent {
    pub fn new(span: Span, file: Option<&Path>, text: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            file: file.map(Path::to_path_buf),
            text: text.into(),
        }
    }

    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn start_column(&self) -> usize {
        self.start.column
    }

    pub fn end_line(&self) -> usize {
        self.end.line
    }

    pub fn end_column(&self) -> usize {
        self.end.column
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Whether `other` lies entirely within this extent.
    pub fn contains(&self, other: &Extent) -> bool {
        self.start.cmp_line_column(&other.start) != Ordering::Greater
            && other.end.cmp_line_column(&self.end) != Ordering::Greater
    }

    /// Whether the two extents share at least one character.
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.start.cmp_line_column(&other.end) == Ordering::Less
            && other.start.cmp_line_column(&self.end) == Ordering::Less
    }

    /// Whether this extent belongs to `path`.
    ///
    /// Extents without a file are treated as belonging to whatever file is
    /// being processed.
    pub fn is_in_file(&self, path: Option<&Path>) -> bool {
        match (&self.file, path) {
            (Some(own), Some(path)) => own == path,
            _ => true,
        }
    }
}

/// A numeric literal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn negate(self) -> Self {
        match self {
            Number::Int(v) => Number::Int(-v),
            Number::Float(v) => Number::Float(-v),
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// How a string literal was quoted in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteKind {
    /// `'text'`
    Single,
    /// `"text"`
    Double,
    /// `@' ... '@`
    SingleHere,
    /// `@" ... "@`
    DoubleHere,
}

impl QuoteKind {
    pub fn is_double(&self) -> bool {
        matches!(self, QuoteKind::Double | QuoteKind::DoubleHere)
    }
}

/// A node in the AST together with its source extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub extent: Extent,
}

/// The closed set of node kinds produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// `@{ key = value; ... }`
    Hashtable(Vec<HashEntry>),
    /// `@( statements )`
    ArrayExpression(Vec<Node>),
    /// `a, b, c`
    ArrayLiteral(Vec<Node>),
    /// `( pipeline )`
    Paren(Box<Node>),
    /// `$( statements )`
    SubExpression(Vec<Node>),
    /// `{ ... }` used as a value
    ScriptBlock(Box<ScriptBlock>),
    /// A string without interpolation.
    StringConstant { value: String, quote: QuoteKind },
    /// A double-quoted string containing `$` interpolation.
    ExpandableString { value: String, quote: QuoteKind },
    Number(Number),
    /// `$name` (the name is stored without the `$`).
    Variable(String),
    /// An unquoted word in argument position.
    BareWord(String),
    /// `-Name` in argument position.
    CommandParameter(String),
    /// A command invocation such as `Get-ChildItem -Path .`
    Command {
        name: String,
        name_extent: Extent,
        arguments: Vec<Node>,
    },
    /// `a | b | c`
    Pipeline(Vec<Node>),
    /// `$x = value`, `$x += value`
    Assignment {
        target: Box<Node>,
        operator: String,
        value: Box<Node>,
    },
    BinaryExpression {
        operator: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryExpression {
        operator: String,
        operand: Box<Node>,
    },
    /// `[type]operand`
    Convert {
        type_name: String,
        operand: Box<Node>,
    },
    /// `[type]` on its own
    TypeLiteral(String),
    /// `target.member`, `target.member(args)` and `[type]::member`
    MemberAccess {
        target: Box<Node>,
        member: String,
        is_static: bool,
        arguments: Option<Vec<Node>>,
    },
    /// `target[index]`
    Index { target: Box<Node>, index: Box<Node> },
    FunctionDefinition(Box<FunctionDefinition>),
    TypeDefinition(Box<TypeDefinition>),
}

impl NodeKind {
    /// A short human-readable description, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Hashtable(_) => "hashtable",
            NodeKind::ArrayExpression(_) => "array expression",
            NodeKind::ArrayLiteral(_) => "array literal",
            NodeKind::Paren(_) => "parenthesized expression",
            NodeKind::SubExpression(_) => "sub-expression",
            NodeKind::ScriptBlock(_) => "script block",
            NodeKind::StringConstant { .. } => "string",
            NodeKind::ExpandableString { .. } => "expandable string",
            NodeKind::Number(_) => "number",
            NodeKind::Variable(_) => "variable",
            NodeKind::BareWord(_) => "bare word",
            NodeKind::CommandParameter(_) => "command parameter",
            NodeKind::Command { .. } => "command",
            NodeKind::Pipeline(_) => "pipeline",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::BinaryExpression { .. } => "binary expression",
            NodeKind::UnaryExpression { .. } => "unary expression",
            NodeKind::Convert { .. } => "type conversion",
            NodeKind::TypeLiteral(_) => "type literal",
            NodeKind::MemberAccess { .. } => "member access",
            NodeKind::Index { .. } => "index expression",
            NodeKind::FunctionDefinition(_) => "function definition",
            NodeKind::TypeDefinition(_) => "class definition",
        }
    }
}

/// One `key = value` entry of a hashtable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    pub key: String,
    pub key_extent: Extent,
    pub value: Node,
}

/// The body of a function or a `{ ... }` expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub param_block: Option<ParamBlock>,
    pub statements: Vec<Node>,
}

/// `[attributes] param( ... )`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBlock {
    pub attributes: Vec<Attribute>,
    pub parameters: Vec<Parameter>,
    pub extent: Extent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub attributes: Vec<Attribute>,
    pub name: String,
    pub default: Option<Node>,
    pub extent: Extent,
}

/// `[TypeName(positional, Name = value)]` or a bare type constraint `[string]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub type_name: String,
    pub positional: Vec<Node>,
    pub named: Vec<NamedArgument>,
    pub extent: Extent,
}

impl Attribute {
    /// Look up a named argument case-insensitively.
    pub fn named_argument(&self, name: &str) -> Option<&NamedArgument> {
        self.named
            .iter()
            .find(|arg| arg.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArgument {
    pub name: String,
    /// `None` for switch-style arguments such as `[Parameter(Mandatory)]`.
    pub value: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub is_filter: bool,
    /// Parameters declared as `function f($a, $b)`.
    pub parameters: Vec<Parameter>,
    pub body: ScriptBlock,
}

/// A `class` definition. Members are not modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

/// The kind of a named construct that can own suppressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructKind {
    Function,
    Class,
}

impl std::fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructKind::Function => write!(f, "function"),
            ConstructKind::Class => write!(f, "class"),
        }
    }
}

/// A function or class found in a script, with the attributes that apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedConstruct<'a> {
    pub kind: ConstructKind,
    pub name: &'a str,
    pub extent: &'a Extent,
    pub attributes: &'a [Attribute],
}

/// Root node of a parsed script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptAst {
    pub param_block: Option<ParamBlock>,
    pub statements: Vec<Node>,
    pub extent: Extent,
}

impl ScriptAst {
    /// The full source text of the script.
    pub fn source(&self) -> &str {
        &self.extent.text
    }

    pub fn file(&self) -> Option<&Path> {
        self.extent.file.as_deref()
    }

    /// Visit every node in pre-order.
    pub fn walk<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node)) {
        self.visit(&mut |node| {
            visitor(node);
            true
        });
    }

    /// Pre-order traversal where `visitor` returns whether to descend into
    /// the node it was given.
    pub fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        if let Some(param_block) = &self.param_block {
            param_block.visit(visitor);
        }
        for statement in &self.statements {
            statement.visit(visitor);
        }
    }

    /// Collect all nodes matching `predicate`, in pre-order.
    pub fn find_all<'a>(&'a self, predicate: impl Fn(&Node) -> bool) -> Vec<&'a Node> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if predicate(node) {
                found.push(node);
            }
        });
        found
    }

    /// The first (outermost, leftmost) hashtable literal in the script.
    ///
    /// Function bodies and script blocks are not searched.
    pub fn first_hashtable(&self) -> Option<&Node> {
        let mut found = None;
        self.visit(&mut |node| {
            if found.is_some() {
                return false;
            }
            match node.kind {
                NodeKind::Hashtable(_) => {
                    found = Some(node);
                    false
                }
                NodeKind::FunctionDefinition(_) | NodeKind::ScriptBlock(_) => false,
                _ => true,
            }
        });
        found
    }

    /// All functions and classes, outermost first.
    pub fn named_constructs(&self) -> Vec<NamedConstruct<'_>> {
        let mut constructs = Vec::new();
        self.walk(&mut |node| match &node.kind {
            NodeKind::FunctionDefinition(function) => constructs.push(NamedConstruct {
                kind: ConstructKind::Function,
                name: &function.name,
                extent: &node.extent,
                attributes: function
                    .body
                    .param_block
                    .as_ref()
                    .map(|block| block.attributes.as_slice())
                    .unwrap_or(&[]),
            }),
            NodeKind::TypeDefinition(class) => constructs.push(NamedConstruct {
                kind: ConstructKind::Class,
                name: &class.name,
                extent: &node.extent,
                attributes: &class.attributes,
            }),
            _ => {}
        });
        constructs
    }
}

impl ParamBlock {
    fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        for attribute in &self.attributes {
            attribute.visit(visitor);
        }
        for parameter in &self.parameters {
            parameter.visit(visitor);
        }
    }
}

impl Parameter {
    fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        for attribute in &self.attributes {
            attribute.visit(visitor);
        }
        if let Some(default) = &self.default {
            default.visit(visitor);
        }
    }
}

impl Attribute {
    fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        for arg in &self.positional {
            arg.visit(visitor);
        }
        for arg in &self.named {
            if let Some(value) = &arg.value {
                value.visit(visitor);
            }
        }
    }
}

impl ScriptBlock {
    fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        if let Some(param_block) = &self.param_block {
            param_block.visit(visitor);
        }
        for statement in &self.statements {
            statement.visit(visitor);
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind, extent: Extent) -> Self {
        Self { kind, extent }
    }

    /// Visit this node and all of its descendants in pre-order.
    pub fn walk<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node)) {
        self.visit(&mut |node| {
            visitor(node);
            true
        });
    }

    /// Pre-order traversal where `visitor` returns whether to descend into
    /// the node it was given.
    pub fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node) -> bool) {
        if !visitor(self) {
            return;
        }
        match &self.kind {
            NodeKind::Hashtable(entries) => {
                for entry in entries {
                    entry.value.visit(visitor);
                }
            }
            NodeKind::ArrayExpression(items)
            | NodeKind::ArrayLiteral(items)
            | NodeKind::SubExpression(items)
            | NodeKind::Pipeline(items) => {
                for item in items {
                    item.visit(visitor);
                }
            }
            NodeKind::Command { arguments, .. } => {
                for arg in arguments {
                    arg.visit(visitor);
                }
            }
            NodeKind::Paren(inner) => inner.visit(visitor),
            NodeKind::ScriptBlock(block) => block.visit(visitor),
            NodeKind::Assignment { target, value, .. } => {
                target.visit(visitor);
                value.visit(visitor);
            }
            NodeKind::BinaryExpression { left, right, .. } => {
                left.visit(visitor);
                right.visit(visitor);
            }
            NodeKind::UnaryExpression { operand, .. } | NodeKind::Convert { operand, .. } => {
                operand.visit(visitor)
            }
            NodeKind::MemberAccess {
                target, arguments, ..
            } => {
                target.visit(visitor);
                for arg in arguments.iter().flatten() {
                    arg.visit(visitor);
                }
            }
            NodeKind::Index { target, index } => {
                target.visit(visitor);
                index.visit(visitor);
            }
            NodeKind::FunctionDefinition(function) => {
                for parameter in &function.parameters {
                    parameter.visit(visitor);
                }
                function.body.visit(visitor);
            }
            NodeKind::TypeDefinition(class) => {
                for attribute in &class.attributes {
                    attribute.visit(visitor);
                }
            }
            NodeKind::StringConstant { .. }
            | NodeKind::ExpandableString { .. }
            | NodeKind::Number(_)
            | NodeKind::Variable(_)
            | NodeKind::BareWord(_)
            | NodeKind::CommandParameter(_)
            | NodeKind::TypeLiteral(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(start: (usize, usize), end: (usize, usize)) -> Extent {
        Extent::new(
            Span::new(
                Position::new(start.0, start.1, 0),
                Position::new(end.0, end.1, 0),
            ),
            None,
            "",
        )
    }

    #[test]
    fn test_extent_contains() {
        let outer = extent((1, 1), (10, 2));
        let inner = extent((2, 5), (3, 1));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));
    }

    #[test]
    fn test_extent_overlaps() {
        let a = extent((1, 1), (1, 4));
        let b = extent((1, 3), (1, 8));
        let c = extent((1, 4), (1, 8));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c), "touching extents do not overlap");
    }

    #[test]
    fn test_extent_file_matching() {
        let mut e = extent((1, 1), (1, 2));
        assert!(e.is_in_file(Some(Path::new("a.ps1"))));
        e.file = Some(PathBuf::from("a.ps1"));
        assert!(e.is_in_file(Some(Path::new("a.ps1"))));
        assert!(!e.is_in_file(Some(Path::new("b.ps1"))));
    }

    #[test]
    fn test_named_constructs() {
        let ast = crate::parse_string(
            "function Get-Foo { gci }\nfunction Get-Bar { function Inner { } }\nclass Widget { }",
        )
        .unwrap();
        let names: Vec<_> = ast
            .named_constructs()
            .iter()
            .map(|c| (c.kind, c.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (ConstructKind::Function, "Get-Foo"),
                (ConstructKind::Function, "Get-Bar"),
                (ConstructKind::Function, "Inner"),
                (ConstructKind::Class, "Widget"),
            ]
        );
    }

    fn first_keys(source: &str) -> Vec<String> {
        let ast = crate::parse_string(source).unwrap();
        match &ast.first_hashtable().unwrap().kind {
            NodeKind::Hashtable(entries) => entries.iter().map(|e| e.key.clone()).collect(),
            other => panic!("expected hashtable, got {:?}", other),
        }
    }

    #[test]
    fn test_first_hashtable_skips_function_bodies() {
        let keys = first_keys(
            "function Get-Defaults { @{ IncludeRules = @('Wrong') } }\n@{ ExcludeRules = @('Right') }\n",
        );
        assert_eq!(keys, vec!["ExcludeRules"]);
    }

    #[test]
    fn test_first_hashtable_skips_script_blocks() {
        let keys = first_keys("$sb = { @{ Bogus = 1 } }\n@{ Severity = 'Error' }");
        assert_eq!(keys, vec!["Severity"]);
    }

    #[test]
    fn test_first_hashtable_takes_outer_table() {
        let keys = first_keys("@{ Rules = @{ PSAvoidUsingCmdletAliases = @{} } }");
        assert_eq!(keys, vec!["Rules"]);
    }

    #[test]
    fn test_first_hashtable_only_nested() {
        let ast = crate::parse_string("function Get-Defaults { @{ A = 1 } }").unwrap();
        assert!(ast.first_hashtable().is_none());
    }
}
