#![forbid(unsafe_code)]

use crate::PoolError;
use arbor_core::{Assertion, Intelligence, Phase, Settings};
use arbor_storage::Counter;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const DEFAULT_MAX_CASCADE_DEPTH: usize = 16;

/// Subscriber notified of every assertion made outside bulk mode.
pub trait AssertionListener {
    fn name(&self) -> &str;

    fn phase(&self) -> Phase;

    fn on_assertion(&mut self, assertion: &Assertion, emit: &mut Emitter) -> Result<(), PoolError>;
}

/// Collects assertions a listener derives while handling a notification.
/// They are appended and dispatched after the current round completes.
#[derive(Debug, Default)]
pub struct Emitter {
    pending: Vec<Assertion>,
}

impl Emitter {
    pub fn emit(&mut self, assertion: Assertion) {
        self.pending.push(assertion);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Append-only fact base with phase-ordered, synchronous listener dispatch.
pub struct AssertionPool {
    assertions: Vec<Assertion>,
    listeners: Vec<Box<dyn AssertionListener>>,
    bulk_mode: bool,
    counter: Counter,
    max_cascade_depth: usize,
}

impl std::fmt::Debug for AssertionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionPool")
            .field("assertions", &self.assertions.len())
            .field(
                "listeners",
                &self.listeners.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .field("bulk_mode", &self.bulk_mode)
            .field("counter", &self.counter)
            .field("max_cascade_depth", &self.max_cascade_depth)
            .finish()
    }
}

impl AssertionPool {
    pub fn new(counter: Counter) -> Self {
        Self {
            assertions: Vec::new(),
            listeners: Vec::new(),
            bulk_mode: false,
            counter,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PoolError> {
        let counter = Counter::open(settings.counter_root())?;
        Ok(Self::new(counter).with_max_cascade_depth(settings.max_cascade_depth))
    }

    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Records `assertion`. Outside bulk mode every listener sees it in phase
    /// order, followed by whatever the listeners derived from it, round by round.
    pub fn assert(&mut self, assertion: Assertion) -> Result<(), PoolError> {
        assertion.validate()?;
        self.assertions.push(assertion.clone());
        if self.bulk_mode || self.listeners.is_empty() {
            return Ok(());
        }

        let mut round = vec![assertion];
        let mut depth = 0usize;
        let mut dispatched = 0usize;
        while !round.is_empty() {
            let mut emitter = Emitter::default();
            for fact in &round {
                for listener in self.listeners.iter_mut() {
                    listener.on_assertion(fact, &mut emitter)?;
                }
            }
            dispatched += round.len();
            if emitter.is_empty() {
                break;
            }
            depth += 1;
            if depth > self.max_cascade_depth {
                tracing::warn!(
                    depth = self.max_cascade_depth,
                    dropped = emitter.len(),
                    "assertion cascade stopped"
                );
                return Err(PoolError::CascadeLimit {
                    depth: self.max_cascade_depth,
                });
            }
            for derived in &emitter.pending {
                derived.validate()?;
            }
            self.assertions.extend(emitter.pending.iter().cloned());
            round = emitter.pending;
        }
        tracing::debug!(dispatched, depth, listeners = self.listeners.len(), "assertion dispatched");
        Ok(())
    }

    /// Appends the opposite-rated twin of `assertion` and returns it.
    pub fn retract(
        &mut self,
        assertion: &Assertion,
        intelligence: Intelligence,
        confidence: f64,
    ) -> Result<Assertion, PoolError> {
        let retraction = assertion.retraction(intelligence, confidence)?;
        self.assert(retraction.clone())?;
        Ok(retraction)
    }

    /// Toggles notification suppression. Leaving bulk mode does not replay the
    /// suppressed facts; modules re-read the pool in their `init` instead.
    pub fn set_bulk_mode(&mut self, enabled: bool) {
        if self.bulk_mode != enabled {
            tracing::info!(enabled, assertions = self.assertions.len(), "bulk mode toggled");
        }
        self.bulk_mode = enabled;
    }

    pub fn is_bulk_mode(&self) -> bool {
        self.bulk_mode
    }

    /// Registers `listener` for future notifications. Listeners run by phase,
    /// then in registration order within a phase.
    pub fn add_listener(&mut self, listener: Box<dyn AssertionListener>) -> Result<(), PoolError> {
        if self.bulk_mode {
            return Err(PoolError::BulkModeActive);
        }
        let phase = listener.phase();
        let at = self.listeners.partition_point(|existing| existing.phase() <= phase);
        tracing::debug!(listener = listener.name(), phase = phase.as_str(), "listener registered");
        self.listeners.insert(at, listener);
        Ok(())
    }

    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|listener| listener.name()).collect()
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter()
    }

    pub fn about<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Assertion> + 'a {
        self.assertions
            .iter()
            .filter(move |assertion| assertion.subject == subject)
    }

    pub fn matching<'a>(
        &'a self,
        subject: &'a str,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Assertion> + 'a {
        self.assertions
            .iter()
            .filter(move |assertion| assertion.concerns(subject, predicate))
    }

    /// Authoritative assertion for `subject`/`predicate`, see [`arbor_core::resolve`].
    pub fn resolve(&self, subject: &str, predicate: &str) -> Option<&Assertion> {
        arbor_core::resolve(
            self.assertions
                .iter()
                .filter(|assertion| assertion.concerns(subject, predicate)),
        )
    }

    /// Writes the fact base as JSON lines, replacing `path` atomically.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), PoolError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("jsonl.tmp");
        {
            let file = std::fs::File::create(&tmp)?;
            let mut out = BufWriter::new(file);
            for assertion in &self.assertions {
                serde_json::to_writer(&mut out, assertion)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), assertions = self.assertions.len(), "pool saved");
        Ok(())
    }

    /// Restores a pool written by [`AssertionPool::save_jsonl`]. No listener is
    /// notified; blank lines are skipped. Every line is validated like a live
    /// assertion, and the first bad one fails the whole load.
    pub fn load_jsonl(path: impl AsRef<Path>, counter: Counter) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut pool = Self::new(counter);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let assertion: Assertion = serde_json::from_str(&line)?;
            assertion.validate()?;
            pool.assertions.push(assertion);
        }
        tracing::debug!(path = %path.display(), assertions = pool.assertions.len(), "pool loaded");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests;
