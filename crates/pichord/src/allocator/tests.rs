use crate::{
    Allocator, AssignmentStore, Claim, Claimant, DigitSequence, FileStore, MemoryStore,
    StoreError, TimeSource,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::scope;

const PI: &str = "3.14159265358979323846264338327950288419716939937510";

struct FixedTime;

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_735_689_600_000).unwrap()
    }
}

fn digits() -> DigitSequence {
    DigitSequence::from_text(PI)
}

fn run_first_claims_are_sequential<S: AssignmentStore>(store: S) {
    let allocator = Allocator::with_clock(store, digits(), FixedTime);

    for (i, who) in ["a", "b", "c", "d"].into_iter().enumerate() {
        let claim = allocator.assign(who).unwrap();
        assert!(claim.is_created());
        let assignment = claim.assignment();
        assert_eq!(assignment.position, i as u64 + 1);
        assert_eq!(assignment.digit_at_position, digits().get(i as u64));
        assert_eq!(assignment.assigned_at, FixedTime.now());
    }

    assert_eq!(allocator.store().counter().unwrap().assigned_count, 4);
}

fn run_repeat_claims_are_idempotent<S: AssignmentStore>(store: S) {
    let allocator = Allocator::with_clock(store, digits(), FixedTime);

    let first = allocator.assign("alice").unwrap();
    let second = allocator.assign("alice").unwrap();
    let third = allocator.store().claim("alice", Utc::now(), &digits()).unwrap();

    assert!(first.is_created());
    assert_eq!(second, Claim::Existing(first.assignment().clone()));
    assert_eq!(third, Claim::Existing(first.assignment().clone()));
    assert_eq!(allocator.store().counter().unwrap().assigned_count, 1);
    assert_eq!(
        allocator.assignment("alice").unwrap().as_ref(),
        Some(first.assignment())
    );
    assert_eq!(allocator.assignment("bob").unwrap(), None);
}

fn run_concurrent_distinct_claims<S: AssignmentStore>(store: S) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 64;
    const TOTAL: usize = THREADS * PER_THREAD;

    let allocator = Arc::new(Allocator::with_clock(store, digits(), FixedTime));
    let seen = Arc::new(Mutex::new(HashSet::with_capacity(TOTAL)));

    scope(|s| {
        for t in 0..THREADS {
            let allocator = Arc::clone(&allocator);
            let seen = Arc::clone(&seen);
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let claim = allocator.assign(&format!("user-{t}-{i}")).unwrap();
                    assert!(claim.is_created());
                    assert!(seen.lock().unwrap().insert(claim.assignment().position));
                }
            });
        }
    });

    let counter = allocator.store().counter().unwrap();
    assert_eq!(counter.assigned_count, TOTAL as u64);

    let positions: Vec<u64> = allocator
        .store()
        .list()
        .unwrap()
        .iter()
        .map(|a| a.position)
        .collect();
    assert_eq!(positions, (1..=TOTAL as u64).collect::<Vec<_>>());
    assert_eq!(
        *seen.lock().unwrap(),
        (1..=TOTAL as u64).collect::<HashSet<_>>()
    );
}

fn run_concurrent_duplicate_claims<S: AssignmentStore>(store: S) {
    const THREADS: usize = 8;
    const ROUNDS: usize = 32;

    let allocator = Arc::new(Allocator::with_clock(store, digits(), FixedTime));

    for round in 0..ROUNDS {
        let who = format!("racer-{round}");
        let results = Arc::new(Mutex::new(Vec::with_capacity(THREADS)));
        scope(|s| {
            for _ in 0..THREADS {
                let allocator = Arc::clone(&allocator);
                let results = Arc::clone(&results);
                let who = who.clone();
                s.spawn(move || {
                    let claim = allocator.assign(&who).unwrap();
                    results.lock().unwrap().push(claim);
                });
            }
        });

        let results = results.lock().unwrap();
        assert_eq!(results.iter().filter(|c| c.is_created()).count(), 1);
        let expected = results[0].assignment();
        assert!(results.iter().all(|c| c.assignment() == expected));
        assert_eq!(expected.position, round as u64 + 1);
    }

    assert_eq!(
        allocator.store().counter().unwrap().assigned_count,
        ROUNDS as u64
    );
}

fn run_reset_clears_everything<S: AssignmentStore>(store: S) {
    let allocator = Allocator::with_clock(store, digits(), FixedTime);
    allocator.assign("a").unwrap();
    allocator.assign("b").unwrap();
    allocator
        .store()
        .remember(
            "a",
            Claimant {
                display_name: Some("Ada".into()),
                handle: None,
            },
        )
        .unwrap();
    allocator.store().mark_rendered(FixedTime.now()).unwrap();

    allocator.store().reset().unwrap();

    let counter = allocator.store().counter().unwrap();
    assert_eq!(counter.assigned_count, 0);
    assert_eq!(counter.last_rendered_at, None);
    assert!(allocator.store().list().unwrap().is_empty());
    assert!(allocator.store().claimants().unwrap().is_empty());

    let claim = allocator.assign("b").unwrap();
    assert!(claim.is_created());
    assert_eq!(claim.assignment().position, 1);
}

fn run_digit_past_source_is_zero<S: AssignmentStore>(store: S) {
    let allocator = Allocator::with_clock(store, DigitSequence::from_text("3.1"), FixedTime);
    let digits: Vec<u8> = (0..4)
        .map(|i| {
            allocator
                .assign(&format!("p{i}"))
                .unwrap()
                .assignment()
                .digit_at_position
        })
        .collect();
    assert_eq!(digits, vec![3, 1, 0, 0]);
}

fn file_store() -> (tempfile::TempDir, FileStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("state.json")).unwrap();
    (dir, store)
}

#[test]
fn memory_first_claims_are_sequential() {
    run_first_claims_are_sequential(MemoryStore::new());
}

#[test]
fn file_first_claims_are_sequential() {
    let (_dir, store) = file_store();
    run_first_claims_are_sequential(store);
}

#[test]
fn memory_repeat_claims_are_idempotent() {
    run_repeat_claims_are_idempotent(MemoryStore::new());
}

#[test]
fn file_repeat_claims_are_idempotent() {
    let (_dir, store) = file_store();
    run_repeat_claims_are_idempotent(store);
}

#[test]
fn memory_concurrent_distinct_claims() {
    run_concurrent_distinct_claims(MemoryStore::new());
}

#[test]
fn file_concurrent_distinct_claims() {
    let (_dir, store) = file_store();
    run_concurrent_distinct_claims(store);
}

#[test]
fn memory_concurrent_duplicate_claims() {
    run_concurrent_duplicate_claims(MemoryStore::new());
}

#[test]
fn file_concurrent_duplicate_claims() {
    let (_dir, store) = file_store();
    run_concurrent_duplicate_claims(store);
}

#[test]
fn boxed_concurrent_duplicate_claims() {
    let store: Box<dyn AssignmentStore> = Box::new(MemoryStore::new());
    run_concurrent_duplicate_claims(store);
}

#[test]
fn memory_reset_clears_everything() {
    run_reset_clears_everything(MemoryStore::new());
}

#[test]
fn file_reset_clears_everything() {
    let (_dir, store) = file_store();
    run_reset_clears_everything(store);
}

#[test]
fn memory_digit_past_source_is_zero() {
    run_digit_past_source_is_zero(MemoryStore::new());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let first = {
        let store = FileStore::open(&path).unwrap();
        let allocator = Allocator::with_clock(store, digits(), FixedTime);
        allocator.assign("a").unwrap();
        allocator
            .store()
            .remember(
                "a",
                Claimant {
                    display_name: Some("Ada".into()),
                    handle: Some("@ada".into()),
                },
            )
            .unwrap();
        allocator.assign("b").unwrap().into_assignment()
    };

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.counter().unwrap().assigned_count, 2);
    assert_eq!(store.get("b").unwrap(), Some(first));
    assert_eq!(
        store.claimants().unwrap()["a"].handle.as_deref(),
        Some("@ada")
    );

    let allocator = Allocator::with_clock(store, digits(), FixedTime);
    assert_eq!(allocator.assign("c").unwrap().assignment().position, 3);
}

#[test]
fn file_store_reconciles_counter_with_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{
            "assignedCount": 7,
            "assignments": [
                {"participantId": "a", "position": 1, "digitAtPosition": 3, "assignedAt": "2025-01-01T00:00:00Z"},
                {"participantId": "b", "position": 2, "digitAtPosition": 1, "assignedAt": "2025-01-01T00:00:01Z"}
            ]
        }"#,
    )
    .unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.counter().unwrap().assigned_count, 2);

    let allocator = Allocator::with_clock(store, digits(), FixedTime);
    assert_eq!(allocator.assign("c").unwrap().assignment().position, 3);
}

#[test]
fn file_store_rejects_gaps_and_duplicates() {
    let dir = tempfile::tempdir().unwrap();

    let gap = dir.path().join("gap.json");
    std::fs::write(
        &gap,
        r#"{"assignedCount": 2, "assignments": [
            {"participantId": "a", "position": 1, "digitAtPosition": 3, "assignedAt": "2025-01-01T00:00:00Z"},
            {"participantId": "b", "position": 3, "digitAtPosition": 4, "assignedAt": "2025-01-01T00:00:00Z"}
        ]}"#,
    )
    .unwrap();
    assert!(matches!(
        FileStore::open(&gap),
        Err(StoreError::Corrupt { .. })
    ));

    let dup = dir.path().join("dup.json");
    std::fs::write(
        &dup,
        r#"{"assignedCount": 2, "assignments": [
            {"participantId": "a", "position": 1, "digitAtPosition": 3, "assignedAt": "2025-01-01T00:00:00Z"},
            {"participantId": "a", "position": 2, "digitAtPosition": 1, "assignedAt": "2025-01-01T00:00:00Z"}
        ]}"#,
    )
    .unwrap();
    assert!(matches!(
        FileStore::open(&dup),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn failed_persist_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = FileStore::open(&path).unwrap();
    // A non-empty directory where the snapshot should land makes the rename fail.
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let result = store.claim("a", Utc::now(), &digits());
    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert_eq!(store.counter().unwrap().assigned_count, 0);
    assert_eq!(store.get("a").unwrap(), None);
}

#[test]
fn from_digit_is_previous_position() {
    let allocator = Allocator::with_clock(MemoryStore::new(), digits(), FixedTime);
    let first = allocator.assign("a").unwrap().into_assignment();
    let second = allocator.assign("b").unwrap().into_assignment();
    assert_eq!(first.from_digit(allocator.digits()), None);
    assert_eq!(second.from_digit(allocator.digits()), Some(3));
    assert_eq!(second.digit_at_position, 1);
}
