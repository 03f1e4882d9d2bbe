//! Rules with scripted behavior for dispatcher and registry tests.

use pslint_common::{Diagnostic, Rule, RuleContext, RuleDescriptor, RuleError, ScriptAst};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Reports the same diagnostics for every script.
pub struct FixedRule {
    descriptor: RuleDescriptor,
    diagnostics: Vec<Diagnostic>,
}

impl FixedRule {
    pub fn new(descriptor: RuleDescriptor, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            descriptor,
            diagnostics,
        }
    }

    pub fn empty(descriptor: RuleDescriptor) -> Self {
        Self::new(descriptor, Vec::new())
    }
}

impl Rule for FixedRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn analyze(
        &self,
        _ast: &ScriptAst,
        _path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        Ok(self.diagnostics.clone())
    }
}

/// Always returns an error.
pub struct FailingRule {
    descriptor: RuleDescriptor,
}

impl FailingRule {
    pub fn new(descriptor: RuleDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Rule for FailingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn analyze(
        &self,
        _ast: &ScriptAst,
        _path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        Err(RuleError::failed("cannot analyze"))
    }
}

/// Always panics.
pub struct PanickingRule {
    descriptor: RuleDescriptor,
}

impl PanickingRule {
    pub fn new(descriptor: RuleDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Rule for PanickingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn analyze(
        &self,
        _ast: &ScriptAst,
        _path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        panic!("rule exploded")
    }

    fn is_reentrant(&self) -> bool {
        false
    }
}

/// In-flight `analyze` calls across a group of [`TrackingRule`]s.
#[derive(Debug, Default)]
pub struct Concurrency {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Concurrency {
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Sleeps inside `analyze` while recording how many rules overlap.
pub struct TrackingRule {
    descriptor: RuleDescriptor,
    concurrency: Arc<Concurrency>,
    reentrant: bool,
}

impl TrackingRule {
    pub fn new(descriptor: RuleDescriptor, concurrency: Arc<Concurrency>, reentrant: bool) -> Self {
        Self {
            descriptor,
            concurrency,
            reentrant,
        }
    }
}

impl Rule for TrackingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn analyze(
        &self,
        _ast: &ScriptAst,
        _path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        let running = self.concurrency.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.concurrency.max.fetch_max(running, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.concurrency.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}
