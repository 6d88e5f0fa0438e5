#![forbid(unsafe_code)]

use crate::{AssertionListener, AssertionPool, Emitter, PoolError};
use arbor_core::{Assertion, Phase, Settings};

/// Contract of a pluggable analysis module.
///
/// `bootstrap` runs while the pool is in bulk mode and may assert freely
/// without notifying anyone. `init` runs afterwards and must read whatever it
/// needs from the pool directly, since suppressed facts are never replayed.
pub trait AnalysisModule<St> {
    fn name(&self) -> &str;

    fn phase(&self) -> Phase;

    fn bootstrap(
        &mut self,
        _store: &mut St,
        _pool: &mut AssertionPool,
        _settings: &Settings,
    ) -> Result<(), PoolError> {
        Ok(())
    }

    fn init(
        &mut self,
        _store: &mut St,
        _pool: &AssertionPool,
        _settings: &Settings,
    ) -> Result<(), PoolError> {
        Ok(())
    }

    fn on_assertion(&mut self, assertion: &Assertion, emit: &mut Emitter) -> Result<(), PoolError>;
}

/// Drives the module lifecycle against one store and one pool.
pub struct ModuleHost<St> {
    modules: Vec<Box<dyn AnalysisModule<St>>>,
}

impl<St> Default for ModuleHost<St> {
    fn default() -> Self {
        Self { modules: Vec::new() }
    }
}

impl<St: 'static> ModuleHost<St> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, module: Box<dyn AnalysisModule<St>>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Bulk-mode bootstrap in phase order, then `init`, then listener
    /// registration. Bulk mode is switched off even when a bootstrap fails.
    pub fn start(
        mut self,
        store: &mut St,
        pool: &mut AssertionPool,
        settings: &Settings,
    ) -> Result<(), PoolError> {
        if pool.is_bulk_mode() {
            return Err(PoolError::BulkModeActive);
        }
        self.modules.sort_by_key(|module| module.phase());

        pool.set_bulk_mode(true);
        let bootstrapped = self.bootstrap_all(store, pool, settings);
        pool.set_bulk_mode(false);
        bootstrapped?;

        for module in self.modules.iter_mut() {
            module.init(store, pool, settings)?;
        }
        for module in self.modules {
            tracing::info!(module = module.name(), phase = module.phase().as_str(), "module started");
            pool.add_listener(Box::new(ModuleListener { module }))?;
        }
        Ok(())
    }

    fn bootstrap_all(
        &mut self,
        store: &mut St,
        pool: &mut AssertionPool,
        settings: &Settings,
    ) -> Result<(), PoolError> {
        for module in self.modules.iter_mut() {
            let before = pool.len();
            module.bootstrap(store, pool, settings)?;
            tracing::info!(
                module = module.name(),
                asserted = pool.len() - before,
                "module bootstrapped"
            );
        }
        Ok(())
    }
}

struct ModuleListener<St> {
    module: Box<dyn AnalysisModule<St>>,
}

impl<St> AssertionListener for ModuleListener<St> {
    fn name(&self) -> &str {
        self.module.name()
    }

    fn phase(&self) -> Phase {
        self.module.phase()
    }

    fn on_assertion(&mut self, assertion: &Assertion, emit: &mut Emitter) -> Result<(), PoolError> {
        self.module.on_assertion(assertion, emit)
    }
}
