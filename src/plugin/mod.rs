//! Custom rule discovery
//!
//! Custom rules live in module files under the settings' `CustomRulePath`
//! entries. A [`RuleLoader`] turns such a path into rules; the bundled
//! [`ModuleRuleLoader`] maps module files to factories registered by the
//! host.

mod error;
mod loader;

pub use error::PluginError;
pub use loader::{LoadedRules, MODULE_EXTENSIONS, ModuleRuleLoader, RuleFactory, RuleLoader};
