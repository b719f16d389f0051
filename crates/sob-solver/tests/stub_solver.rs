#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sob_core::RunId;
use sob_deck::DeckSet;
use sob_solver::{
    CancelToken, DriverState, FailureReason, Phase, Phases, SlotPool, SolverDriver,
    SolverExecutables, SolverInvocation, SolverOutcome,
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

fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const STARTER_OK: &str = "echo ' NORMAL TERMINATION' > combine_0000.out";
const ENGINE_OK: &str = "echo \"$OMP_NUM_THREADS\" > omp.txt
echo ' NORMAL TERMINATION' > combine_0001.out
echo 'time' > combineT01
echo 'frame' > combineA001";

struct Fixture {
    root: PathBuf,
    run: PathBuf,
    decks: DeckSet,
}

impl Fixture {
    fn new(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        let run = root.join("starbox_deck1");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("combine.k"), "*KEYWORD\n*END\n").unwrap();
        fs::write(run.join("combine_0001.rad"), "/END\n").unwrap();
        let decks = DeckSet {
            base: "combine".into(),
            starter: run.join("combine.k"),
            engine: run.join("combine_0001.rad"),
            includes: Vec::new(),
        };
        Self { root, run, decks }
    }

    fn invocation(&self, starter: &str, engine: &str) -> SolverInvocation {
        let bin = self.root.join("bin");
        let exe = SolverExecutables::from_install_root(&self.root)
            .with_starter(stub(&bin, "starter.sh", starter))
            .with_engine(stub(&bin, "engine.sh", engine));
        SolverInvocation::new(exe, &self.run, RunId::new(1))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.root).ok();
    }
}

#[test]
fn both_phases_succeed() {
    let fx = Fixture::new("sob_stub_ok");
    let inv = fx.invocation(STARTER_OK, ENGINE_OK).with_resources(1, 3);
    let (outcome, trace) = SolverDriver::new().run_traced(&fx.decks, &inv);

    let files = outcome.outputs().expect("success");
    assert_eq!(files.time_histories, vec![fx.run.join("combineT01")]);
    assert_eq!(files.animation_frames, vec![fx.run.join("combineA001")]);
    assert_eq!(files.engine_listing, Some(fx.run.join("combine_0001.out")));
    assert_eq!(
        trace,
        [
            DriverState::Pending,
            DriverState::StarterRunning,
            DriverState::StarterOk,
            DriverState::EngineRunning,
            DriverState::EngineOk
        ]
    );
    assert_eq!(fs::read_to_string(fx.run.join("omp.txt")).unwrap().trim(), "3");
    assert!(fx.run.join("starter.log").is_file());
}

#[test]
fn failed_starter_never_launches_engine() {
    let fx = Fixture::new("sob_stub_starter_fail");
    let marker = fx.root.join("engine_ran");
    let inv = fx.invocation(
        "echo broken >&2; exit 3",
        &format!("touch {}", marker.display()),
    );
    let (outcome, trace) = SolverDriver::new().run_traced(&fx.decks, &inv);

    assert!(matches!(
        outcome,
        SolverOutcome::SolverFailure {
            phase: Phase::Starter,
            reason: FailureReason::Crash { code: Some(3) },
            ..
        }
    ));
    assert_eq!(trace.last(), Some(&DriverState::StarterFailed));
    assert!(!marker.exists());
    let log = fs::read_to_string(fx.run.join("starter.log")).unwrap();
    assert!(log.contains("broken"));
}

#[test]
fn zero_exit_without_normal_termination_is_failure() {
    let fx = Fixture::new("sob_stub_abnormal");
    let marker = fx.root.join("engine_ran");
    let inv = fx.invocation(
        "echo ' ERROR TERMINATION' > combine_0000.out",
        &format!("touch {}", marker.display()),
    );
    let outcome = SolverDriver::new().run(&fx.decks, &inv);
    assert!(matches!(
        outcome,
        SolverOutcome::SolverFailure {
            phase: Phase::Starter,
            reason: FailureReason::NonConvergence,
            ..
        }
    ));
    assert!(!marker.exists());
}

#[test]
fn engine_timeout_kills_the_process() {
    let fx = Fixture::new("sob_stub_timeout");
    let pid_file = fx.run.join("engine.pid");
    let inv = fx
        .invocation(STARTER_OK, "echo $$ > engine.pid\nexec sleep 30")
        .with_engine_timeout(Some(Duration::from_millis(300)));
    let pool = SlotPool::new(2);
    let started = Instant::now();
    let (outcome, trace) = SolverDriver::with_slots(pool.clone()).run_traced(&fx.decks, &inv);

    assert!(matches!(
        outcome,
        SolverOutcome::Timeout {
            phase: Phase::Engine,
            ..
        }
    ));
    assert_eq!(trace.last(), Some(&DriverState::EngineTimeout));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(pool.in_use(), 0);

    let pid = fs::read_to_string(&pid_file).unwrap();
    let proc_entry = Path::new("/proc").join(pid.trim());
    if Path::new("/proc/self").exists() {
        assert!(!proc_entry.exists(), "engine process {} still alive", pid.trim());
    }
}

#[test]
fn missing_time_history_is_missing_output() {
    let fx = Fixture::new("sob_stub_no_th");
    let inv = fx.invocation(STARTER_OK, "echo ' NORMAL TERMINATION' > combine_0001.out");
    let outcome = SolverDriver::new().run(&fx.decks, &inv);
    match outcome {
        SolverOutcome::MissingOutput { phase, expected } => {
            assert_eq!(phase, Phase::Engine);
            assert_eq!(expected, fx.run.join("combineT01"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn missing_executable_is_launch_failure() {
    let fx = Fixture::new("sob_stub_launch");
    let exe = SolverExecutables::from_install_root(fx.root.join("nowhere"));
    let inv = SolverInvocation::new(exe, &fx.run, RunId::new(1));
    let outcome = SolverDriver::new().run(&fx.decks, &inv);
    assert!(matches!(
        outcome,
        SolverOutcome::SolverFailure {
            reason: FailureReason::Launch { .. },
            ..
        }
    ));
    assert_eq!(outcome.status(), "launch_failed");
}

#[test]
fn starter_only_skips_engine() {
    let fx = Fixture::new("sob_stub_starter_only");
    let marker = fx.root.join("engine_ran");
    let inv = fx
        .invocation(STARTER_OK, &format!("touch {}", marker.display()))
        .with_phases(Phases::StarterOnly);
    let outcome = SolverDriver::new().run(&fx.decks, &inv);
    let files = outcome.outputs().expect("success");
    assert!(files.engine_listing.is_none());
    assert!(files.time_histories.is_empty());
    assert!(!marker.exists());
}

#[test]
fn cancellation_terminates_running_engine() {
    let fx = Fixture::new("sob_stub_cancel");
    let token = CancelToken::new();
    let inv = fx
        .invocation(STARTER_OK, "exec sleep 30")
        .with_cancel(token.clone());
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        token.cancel();
    });
    let started = Instant::now();
    let (outcome, trace) = SolverDriver::new().run_traced(&fx.decks, &inv);
    canceller.join().unwrap();

    assert!(matches!(outcome, SolverOutcome::Cancelled { .. }));
    assert_eq!(trace.last(), Some(&DriverState::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Live and not a zombie, allowing a moment for the reparented worker to be reaped.
fn process_alive(pid: &str) -> bool {
    let stat = Path::new("/proc").join(pid).join("stat");
    for _ in 0..50 {
        match fs::read_to_string(&stat) {
            Err(_) => return false,
            Ok(s) if s.rsplit(')').next().is_some_and(|r| r.trim_start().starts_with('Z')) => {
                return false;
            }
            Ok(_) => thread::sleep(Duration::from_millis(20)),
        }
    }
    true
}

#[test]
fn engine_timeout_kills_background_workers() {
    if !Path::new("/proc/self").exists() {
        return;
    }
    let fx = Fixture::new("sob_stub_workers");
    let inv = fx
        .invocation(STARTER_OK, "sleep 30 &\necho $! > worker.pid\nwait")
        .with_engine_timeout(Some(Duration::from_millis(300)));
    let (outcome, trace) = SolverDriver::new().run_traced(&fx.decks, &inv);

    assert!(matches!(
        outcome,
        SolverOutcome::Timeout {
            phase: Phase::Engine,
            ..
        }
    ));
    assert_eq!(trace.last(), Some(&DriverState::EngineTimeout));
    let pid = fs::read_to_string(fx.run.join("worker.pid")).unwrap();
    assert!(
        !process_alive(pid.trim()),
        "worker {} outlived the timed-out engine",
        pid.trim()
    );
}

#[test]
fn hung_starter_times_out() {
    let fx = Fixture::new("sob_stub_starter_hang");
    let marker = fx.root.join("engine_ran");
    let inv = fx
        .invocation("exec sleep 30", &format!("touch {}", marker.display()))
        .with_starter_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    let (outcome, trace) = SolverDriver::new().run_traced(&fx.decks, &inv);

    assert!(matches!(
        outcome,
        SolverOutcome::Timeout {
            phase: Phase::Starter,
            ..
        }
    ));
    assert_eq!(outcome.status(), "timeout");
    assert_eq!(trace.last(), Some(&DriverState::StarterFailed));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!marker.exists());
}
