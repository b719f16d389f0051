use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use sob_core::{NumberingMode, RunId, Topology};
use sob_results::{
    CleanupPolicy, EvaluationRecord, ResultsError, RunManager, Sample, SignalSet,
};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

#[test]
fn concurrent_sequential_allocations_are_distinct() {
    let root = unique_temp_dir("sob_runs_concurrent");
    let manager = Arc::new(RunManager::new(&root).unwrap());
    let n = 16;
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.allocate(Topology::StarBox, 0, true).unwrap())
        })
        .collect();
    let ids: BTreeSet<u64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().run_id.get())
        .collect();
    assert_eq!(ids, (1..=n as u64).collect());
    fs::remove_dir_all(root).ok();
}

#[test]
fn sequential_continues_after_existing_runs() {
    let root = unique_temp_dir("sob_runs_sequence");
    fs::create_dir_all(root.join("starbox_deck7")).unwrap();
    fs::create_dir_all(root.join("crashtube_deck40")).unwrap();
    let manager = RunManager::new(&root).unwrap();
    let run = manager.allocate(Topology::StarBox, 253, true).unwrap();
    assert_eq!(run.run_id, RunId::new(8));
    assert_eq!(run.numbering, NumberingMode::Sequential);
    assert_eq!(run.dir(), root.join("starbox_deck8"));
    fs::remove_dir_all(root).ok();
}

#[test]
fn explicit_id_is_verbatim_and_clears_stale_files() {
    let root = unique_temp_dir("sob_runs_explicit");
    let manager = RunManager::new(&root).unwrap();
    let stale = root.join("threepointbending_deck253");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("ThreePointBending_0001.out"), "NORMAL TERMINATION").unwrap();

    let run = manager.allocate(Topology::ThreePointBending, 253, false).unwrap();
    assert_eq!(run.dir(), stale);
    assert_eq!(run.numbering, NumberingMode::Explicit);
    assert!(!stale.join("ThreePointBending_0001.out").exists());
    fs::remove_dir_all(root).ok();
}

#[test]
fn explicit_id_in_use_is_a_conflict() {
    let root = unique_temp_dir("sob_runs_in_use");
    let manager = RunManager::new(&root).unwrap();
    let shared = manager.clone();
    let first = manager.allocate(Topology::StarBox, 5, false).unwrap();
    fs::write(first.file("combine.k"), "*KEYWORD").unwrap();

    assert!(matches!(
        shared.allocate(Topology::StarBox, 5, false),
        Err(ResultsError::DirectoryAllocationConflict { .. })
    ));
    assert!(first.file("combine.k").exists());

    manager.release(&first);
    let again = shared.allocate(Topology::StarBox, 5, false).unwrap();
    assert_eq!(again.dir(), first.dir());
    assert!(!again.file("combine.k").exists());
    fs::remove_dir_all(root).ok();
}

fn record(run_id: RunId) -> EvaluationRecord {
    EvaluationRecord {
        evaluation_id: "e1".into(),
        run_id,
        numbering: NumberingMode::Explicit,
        topology: Topology::StarBox,
        dimension: 2,
        design: vec![2.5, -1.0],
        design_fingerprint: "abc".into(),
        timestamp: "2026-01-01T00:00:00+00:00".into(),
        metrics: vec!["intrusion".into()],
        objectives: vec![41.5],
        constraints: vec![],
        solver_status: "success".into(),
        solver_message: None,
        elapsed_s: 1.0,
    }
}

#[test]
fn save_list_load_roundtrip() {
    let root = unique_temp_dir("sob_runs_roundtrip");
    let manager = RunManager::new(&root).unwrap();
    let run = manager.allocate(Topology::StarBox, 253, false).unwrap();
    let signals = SignalSet::new().with(
        "intrusion",
        vec![Sample { t: 0.0, v: 0.0 }, Sample { t: 0.05, v: -0.35 }],
    );
    manager
        .save_evaluation(&run, &record(run.run_id), &signals)
        .unwrap();

    let (loaded, loaded_signals) = manager
        .load_evaluation(Topology::StarBox, RunId::new(253))
        .unwrap();
    assert_eq!(loaded, record(run.run_id));
    assert_eq!(loaded_signals, signals);
    assert_eq!(manager.list_evaluations(Topology::StarBox).unwrap().len(), 1);
    assert!(manager.list_evaluations(Topology::CrashTube).unwrap().is_empty());

    assert!(matches!(
        manager.load_evaluation(Topology::StarBox, RunId::new(9)),
        Err(ResultsError::RunNotFound { .. })
    ));
    fs::remove_dir_all(root).ok();
}

#[test]
fn remove_binaries_keeps_tables_and_listings() {
    let root = unique_temp_dir("sob_runs_cleanup");
    let manager = RunManager::new(&root)
        .unwrap()
        .with_cleanup(CleanupPolicy::RemoveBinaries);
    let run = manager.allocate(Topology::CrashTube, 1, false).unwrap();
    for name in [
        "combineT01",
        "combineA001",
        "combineA002",
        "combine_0000.rst",
        "combineT01.csv",
        "combine_0001.out",
        "combine.k",
    ] {
        fs::write(run.file(name), "x").unwrap();
    }
    assert_eq!(manager.cleanup(&run, "combine").unwrap(), 4);
    assert!(run.file("combineT01.csv").exists());
    assert!(run.file("combine_0001.out").exists());
    assert!(!run.file("combineT01").exists());

    let keep = RunManager::new(&root).unwrap();
    assert_eq!(keep.cleanup(&run, "combine").unwrap(), 0);
    fs::remove_dir_all(root).ok();
}
