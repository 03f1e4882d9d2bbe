//! Core types shared between the pslint analyzer, its rules and its hosts.
//!
//! # Modules
//!
//! - [`value`] — Literal values produced from settings files ([`LiteralValue`], [`NameMap`])
//! - [`diagnostic`] — Findings and proposed edits ([`Diagnostic`], [`Correction`], [`Severity`])
//! - [`rule`] — The [`Rule`] trait and its [`RuleDescriptor`]
//! - [`context`] — Per-run state handed to rules ([`RuleContext`], [`AliasTable`], [`CancellationToken`])
//! - [`suppression`] — `[SuppressMessageAttribute(...)]` extraction and filtering
//!
//! # Quick reference
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Rule`] | Trait that every rule (builtin or custom) implements |
//! | [`Diagnostic`] | A single finding with extent, severity and optional corrections |
//! | [`Correction`] | A replacement for one source extent |
//! | [`RuleContext`] | Aliases, the rule's own arguments and the cancellation token |
//! | [`SuppressionMatcher`] | Drops diagnostics covered by suppression attributes |
//!
//! # Re-exports
//!
//! The [`parser`] module re-exports the entire [`pslint_parser`] crate.

pub mod context;
pub mod diagnostic;
pub mod rule;
pub mod suppression;
pub mod value;

// Re-export parser crate
pub use pslint_parser as parser;

pub use context::{AliasTable, CancellationToken, RuleArguments, RuleContext, RunContext};
pub use diagnostic::{Correction, Diagnostic, Severity, UnknownSeverity};
pub use rule::{Rule, RuleDescriptor, RuleError, SourceType, names_match};
pub use suppression::{
    FilterResult, ConstructInfo, RegionKind, SuppressedRegion, SuppressionEntry,
    SuppressionMatcher, SuppressionScope, SuppressionTarget, SuppressionWarning,
};
pub use value::{LiteralValue, NameMap};
pub use pslint_parser::ast::{Extent, Number, Position, ScriptAst};
