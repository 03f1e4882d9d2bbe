//! Builtin rules

pub mod best_practices;
pub mod style;

#[cfg(test)]
pub(crate) mod testing;

pub use best_practices::AvoidUsingCmdletAliases;
pub use style::{AvoidTrailingWhitespace, AvoidUsingDoubleQuotesForConstantString};

use pslint_common::Rule;
use std::sync::Arc;

/// Every builtin rule, in reporting order.
pub fn builtin_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(AvoidUsingCmdletAliases),
        Arc::new(AvoidTrailingWhitespace),
        Arc::new(AvoidUsingDoubleQuotesForConstantString),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_are_reentrant() {
        assert!(builtin_rules().iter().all(|rule| rule.is_reentrant()));
    }
}
