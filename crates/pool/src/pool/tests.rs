#![forbid(unsafe_code)]

use super::*;

struct Named(&'static str, Phase);

impl AssertionListener for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn phase(&self) -> Phase {
        self.1
    }

    fn on_assertion(&mut self, _assertion: &Assertion, _emit: &mut Emitter) -> Result<(), PoolError> {
        Ok(())
    }
}

fn pool() -> (tempfile::TempDir, AssertionPool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let counter = Counter::open(dir.path()).expect("counter");
    (dir, AssertionPool::new(counter))
}

#[test]
fn listeners_are_kept_in_phase_then_registration_order() {
    let (_dir, mut pool) = pool();
    for (name, phase) in [
        ("review", Phase::Review),
        ("discovery_a", Phase::Discovery),
        ("import", Phase::Import),
        ("discovery_b", Phase::Discovery),
        ("terminology", Phase::Terminology),
    ] {
        pool.add_listener(Box::new(Named(name, phase))).expect("add listener");
    }
    assert_eq!(
        pool.listener_names(),
        vec!["import", "discovery_a", "discovery_b", "terminology", "review"]
    );
}

#[test]
fn bulk_mode_refuses_new_listeners() {
    let (_dir, mut pool) = pool();
    pool.set_bulk_mode(true);
    let err = pool
        .add_listener(Box::new(Named("late", Phase::Import)))
        .expect_err("bulk mode");
    assert!(matches!(err, PoolError::BulkModeActive));

    pool.set_bulk_mode(false);
    pool.add_listener(Box::new(Named("late", Phase::Import))).expect("after bulk");
}

#[test]
fn emitter_collects_in_order() {
    let mut emitter = Emitter::default();
    assert!(emitter.is_empty());
    for object in ["a", "b"] {
        let fact = Assertion::try_new(
            "s",
            "p",
            object,
            arbor_core::Rating::Positive,
            Intelligence::Ai,
            0.5,
            Phase::Discovery,
        )
        .expect("assertion");
        emitter.emit(fact);
    }
    assert_eq!(emitter.len(), 2);
    let objects = emitter.pending.iter().map(|a| a.object.as_str()).collect::<Vec<_>>();
    assert_eq!(objects, vec!["a", "b"]);
}
