//! End-to-end suite runs against shell-script artifacts and engines.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parity_core::{
    CaseFailure, Channel, HarnessConfig, JsonSink, MemorySink, Orchestrator, TestRun, Verdict,
};

/// Engine that behaves like native execution except for a few named
/// artifacts, and insists on receiving an existing companion file.
const DISPATCH_ENGINE: &str = r#"
companion="$1"
artifact="$2"
test -f "$companion" || { echo "engine: missing companion $companion" >&2; exit 2; }
case "$artifact" in
  *Bar.exe) echo goodbye ;;
  *Foo.exe) "$artifact"; exit 1 ;;
  *Noisy.exe) "$artifact"; echo "engine warning" >&2 ;;
  *) exec "$artifact" ;;
esac
"#;

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = std::fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod script");
}

/// Create `<root>/<stem>/<stem>.exe` with `body`, plus a companion file.
fn artifact(root: &Path, stem: &str, body: &str) -> PathBuf {
    let dir = root.join(stem);
    std::fs::create_dir_all(&dir).expect("create artifact dir");
    std::fs::write(dir.join("clrcore.dll"), b"").expect("write companion");
    let exe = dir.join(format!("{}.exe", stem));
    write_script(&exe, body);
    exe
}

fn engine(root: &Path, body: &str) -> PathBuf {
    let path = root.join("engine.sh");
    write_script(&path, body);
    path
}

fn config(timeout_ms: u64) -> HarnessConfig {
    HarnessConfig {
        timeout_ms,
        concurrency: 4,
        ..HarnessConfig::default()
    }
}

/// Artifact body that leaves a background grandchild and records its pid in
/// `<artifact-dir>/pids`.
const FORKING_BODY: &str = r#"sleep 30 & echo $! >> "$(dirname "$0")/pids"; wait"#;

fn recorded_pids(artifact: &Path) -> Vec<i32> {
    let pids = artifact.parent().expect("artifact dir").join("pids");
    std::fs::read_to_string(pids)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

/// Alive and not a zombie.
fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .map_or(false, |rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

async fn assert_all_dead(pids: &[i32]) {
    for _ in 0..50 {
        if pids.iter().all(|p| !process_alive(*p)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let alive: Vec<_> = pids.iter().filter(|p| process_alive(**p)).collect();
    panic!("descendant processes still running: {:?}", alive);
}

async fn run(artifacts: &[PathBuf], engine: &Path, cfg: HarnessConfig) -> TestRun {
    let orchestrator = Orchestrator::new(cfg).expect("valid config");
    let mut sink = MemorySink::new();
    orchestrator
        .run_suite(artifacts, engine, &mut sink)
        .await
        .expect("run_suite failed")
}

#[tokio::test]
async fn test_exit_code_only_divergence_passes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let foo = artifact(dir.path(), "Foo", "echo 42");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[foo], &engine, config(10_000)).await;

    assert!(run.success, "exit-code-only divergence must not fail");
    let finding = run.outcomes[0].finding().expect("finding");
    assert_eq!(finding.native.stdout, b"42\n");
    assert_eq!(finding.native.exit_code, 0);
    assert_eq!(finding.alternate.exit_code, 1);
    assert!(finding.mismatches().contains(&Channel::ExitCode));
}

#[tokio::test]
async fn test_exit_code_fatal_policy_fails_divergence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let foo = artifact(dir.path(), "Foo", "echo 42");
    let engine = engine(dir.path(), DISPATCH_ENGINE);
    let mut cfg = config(10_000);
    cfg.policy.exit_code_fatal = true;

    let run = run(&[foo], &engine, cfg).await;

    assert!(!run.success);
    assert!(matches!(
        run.outcomes[0].failure(),
        Some(CaseFailure::ComparisonMismatch { .. })
    ));
}

#[tokio::test]
async fn test_stdout_mismatch_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bar = artifact(dir.path(), "Bar", "echo hello");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[bar], &engine, config(10_000)).await;

    assert!(!run.success);
    match run.outcomes[0].failure() {
        Some(CaseFailure::ComparisonMismatch { finding }) => {
            let channels: Vec<_> = finding.mismatches().iter().copied().collect();
            assert_eq!(channels, vec![Channel::Stdout]);
            assert_eq!(finding.native.stdout, b"hello\n");
            assert_eq!(finding.alternate.stdout, b"goodbye\n");
        }
        other => panic!("expected ComparisonMismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stderr_mismatch_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let noisy = artifact(dir.path(), "Noisy", "echo same");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[noisy], &engine, config(10_000)).await;

    let finding = run.outcomes[0].finding().expect("finding");
    assert!(finding.is_failure());
    assert!(finding.mismatches().contains(&Channel::Stderr));
    assert!(!finding.mismatches().contains(&Channel::Stdout));
}

#[tokio::test]
async fn test_missing_companion_does_not_stop_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = artifact(dir.path(), "First", "echo one");
    let orphan = artifact(dir.path(), "Orphan", "echo two");
    std::fs::remove_file(dir.path().join("Orphan").join("clrcore.dll"))
        .expect("remove companion");
    let last = artifact(dir.path(), "Last", "echo three");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[first, orphan, last], &engine, config(10_000)).await;

    assert_eq!(run.outcomes.len(), 3);
    assert!(run.outcomes[0].passed());
    assert!(matches!(
        run.outcomes[1].failure(),
        Some(CaseFailure::MissingCompanionFile { .. })
    ));
    assert!(run.outcomes[2].passed());
    assert!(!run.success);
}

#[tokio::test]
async fn test_launch_failure_does_not_stop_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ghost_dir = dir.path().join("Ghost");
    std::fs::create_dir_all(&ghost_dir).expect("mkdir");
    std::fs::write(ghost_dir.join("clrcore.dll"), b"").expect("companion");
    let ghost = ghost_dir.join("Ghost.exe");
    let after = artifact(dir.path(), "After", "echo fine");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[ghost, after], &engine, config(10_000)).await;

    assert_eq!(run.outcomes.len(), 2);
    match run.outcomes[0].failure() {
        Some(CaseFailure::LaunchFailure { side, .. }) => {
            assert_eq!(*side, parity_core::ExecSide::Native)
        }
        other => panic!("expected LaunchFailure, got {:?}", other),
    }
    assert!(run.outcomes[1].passed());
    assert_eq!(run.failed_count(), 1);
}

#[tokio::test]
async fn test_missing_engine_is_alternate_launch_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ok = artifact(dir.path(), "Plain", "echo hi");

    let run = run(&[ok], Path::new("/nonexistent-engine-binary"), config(10_000)).await;

    match run.outcomes[0].failure() {
        Some(CaseFailure::LaunchFailure { side, .. }) => {
            assert_eq!(*side, parity_core::ExecSide::Alternate)
        }
        other => panic!("expected LaunchFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_outcomes_keep_input_order_under_concurrency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let slow = artifact(dir.path(), "Slow", "sleep 0.6; echo slow");
    let medium = artifact(dir.path(), "Medium", "sleep 0.3; echo medium");
    let fast = artifact(dir.path(), "Fast", "echo fast");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[slow, medium, fast], &engine, config(10_000)).await;

    let names: Vec<_> = run.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Slow_exe", "Medium_exe", "Fast_exe"]);
    assert!(run.outcomes.iter().enumerate().all(|(i, o)| o.index == i));
    assert!(run.success);
}

#[tokio::test]
async fn test_hanging_artifact_times_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let hang = artifact(dir.path(), "Hang", "sleep 30");
    let quick = artifact(dir.path(), "Quick", "echo quick");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let start = Instant::now();
    let run = run(&[hang, quick], &engine, config(300)).await;

    assert!(start.elapsed() < Duration::from_secs(15));
    match run.outcomes[0].failure() {
        Some(CaseFailure::ProcessTimeout { limit_ms, .. }) => assert_eq!(*limit_ms, 300),
        other => panic!("expected ProcessTimeout, got {:?}", other),
    }
    assert!(run.outcomes[1].passed());
}

#[tokio::test]
async fn test_timeout_kills_descendants_on_both_sides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let forker = artifact(dir.path(), "Forker", FORKING_BODY);
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let run = run(&[forker.clone()], &engine, config(500)).await;

    assert!(matches!(
        run.outcomes[0].failure(),
        Some(CaseFailure::ProcessTimeout { .. })
    ));
    let pids = recorded_pids(&forker);
    assert_eq!(pids.len(), 2, "one grandchild per side");
    assert_all_dead(&pids).await;
}

#[tokio::test]
async fn test_cancel_mid_flight_marks_cases_cancelled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifacts: Vec<_> = (0..3)
        .map(|i| artifact(dir.path(), &format!("Sleepy{}", i), FORKING_BODY))
        .collect();
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let mut cfg = config(60_000);
    cfg.concurrency = 1;
    let orchestrator = Orchestrator::new(cfg).expect("valid config");
    let cancel = orchestrator.cancel_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let mut sink = MemorySink::new();
    let run = orchestrator
        .run_suite(&artifacts, &engine, &mut sink)
        .await
        .expect("run_suite failed");

    assert!(start.elapsed() < Duration::from_secs(15));
    assert_eq!(run.outcomes.len(), 3);
    assert!(run.outcomes.iter().all(|o| matches!(o.verdict, Verdict::Cancelled)));
    assert!(!run.success);

    let pids: Vec<i32> = artifacts.iter().flat_map(|a| recorded_pids(a)).collect();
    assert!(!pids.is_empty(), "first case should have started");
    assert_all_dead(&pids).await;
}

#[tokio::test]
async fn test_dropping_run_future_stops_workers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let forker = artifact(dir.path(), "Abandoned", FORKING_BODY);
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let orchestrator = Orchestrator::new(config(60_000)).expect("valid config");
    let mut sink = MemorySink::new();
    let artifacts = vec![forker.clone()];
    let abandoned = tokio::time::timeout(
        Duration::from_millis(500),
        orchestrator.run_suite(&artifacts, &engine, &mut sink),
    )
    .await;
    assert!(abandoned.is_err(), "run should still be in flight");

    let pids = recorded_pids(&forker);
    assert!(!pids.is_empty(), "case should have started");
    assert_all_dead(&pids).await;
    assert!(sink.recorded().finished.is_none());
}

#[tokio::test]
async fn test_json_report_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let foo = artifact(dir.path(), "Foo", "echo 42");
    let bar = artifact(dir.path(), "Bar", "echo hello");
    let engine = engine(dir.path(), DISPATCH_ENGINE);
    let report_path = dir.path().join("report.json");

    let orchestrator = Orchestrator::new(config(10_000)).expect("valid config");
    let mut sink = JsonSink::new(&report_path);
    let run = orchestrator
        .run_suite(&[foo, bar], &engine, &mut sink)
        .await
        .expect("run_suite failed");

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("read report"))
            .expect("valid json");
    assert_eq!(raw["run_id"], serde_json::json!(run.run_id));
    assert_eq!(raw["summary"]["total"], serde_json::json!(2));
    assert_eq!(raw["summary"]["failed"], serde_json::json!(1));
    assert_eq!(raw["cases"][0]["name"], serde_json::json!("Foo_exe"));
    assert_eq!(raw["cases"][0]["status"], serde_json::json!("passed"));
    assert_eq!(raw["cases"][1]["failure_kind"], serde_json::json!("comparison_mismatch"));
    assert_eq!(raw["cases"][1]["alternate"]["stdout"], serde_json::json!("goodbye\n"));
}

#[tokio::test]
async fn test_same_artifact_twice_gives_same_finding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let foo = artifact(dir.path(), "Foo", "echo 42");
    let engine = engine(dir.path(), DISPATCH_ENGINE);

    let first = run(&[foo.clone()], &engine, config(10_000)).await;
    let second = run(&[foo], &engine, config(10_000)).await;

    let a = first.outcomes[0].finding().expect("finding");
    let b = second.outcomes[0].finding().expect("finding");
    assert_eq!(a.mismatches(), b.mismatches());
    assert_eq!(a.is_failure(), b.is_failure());
    assert_eq!(a.native.stdout, b.native.stdout);
    assert_eq!(a.alternate.exit_code, b.alternate.exit_code);
}
