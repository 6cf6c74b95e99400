//! Integration tests for the snapshot collector.
//!
//! These tests register the collector in a fresh registry, feed it canned
//! restic output through a fake invoker and check the text exposition.

use prometheus::core::Collector;
use prometheus::{Encoder, Registry, TextEncoder};
use restic_exporter::collector::SNAPSHOTS_ARGS;
use restic_exporter::{InvokeError, ScrapeOutcome, ScrapeStats, SnapshotCollector};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const EXIT_CODE_HELP: &str = "# HELP restic_snapshot_exit_code Exit code of the list snapshots command. See restic exit codes, except 1684 for json output parsing errors: https://restic.readthedocs.io/en/stable/075_scripting.html#exit-codes";

fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
}

/// Invoker that always returns the given output with exit code 0.
fn output_invoker(
    output: Vec<u8>,
) -> impl Fn(&str, &[&str]) -> Result<Vec<u8>, InvokeError> + Send + Sync {
    move |_: &str, _: &[&str]| Ok(output.clone())
}

/// Invoker that always fails with the given exit code.
fn failing_invoker(
    code: i32,
) -> impl Fn(&str, &[&str]) -> Result<Vec<u8>, InvokeError> + Send + Sync {
    move |program: &str, _: &[&str]| {
        Err(InvokeError::ExitCode {
            program: program.to_string(),
            code,
            stderr: "Fatal: unable to open repository".to_string(),
        })
    }
}

fn exposition(collector: SnapshotCollector) -> String {
    let registry = Registry::new();
    registry
        .register(Box::new(collector))
        .expect("collector registers");

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .expect("exposition encodes");
    String::from_utf8(buffer).expect("exposition is utf-8")
}

fn sample_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.starts_with('#')).collect()
}

#[test]
fn test_describe_yields_all_descriptors() {
    let collector = SnapshotCollector::new("restic", failing_invoker(1));
    let descs = collector.desc();
    assert_eq!(descs.len(), 18);
    assert_eq!(descs[0].fq_name, "restic_snapshot_count_total");
    assert_eq!(descs[17].fq_name, "restic_snapshot_exit_code");
}

#[test]
fn test_describe_does_not_invoke() {
    let collector = SnapshotCollector::new(
        "restic",
        |_: &str, _: &[&str]| -> Result<Vec<u8>, InvokeError> {
            panic!("describe must not run restic")
        },
    );
    assert_eq!(collector.desc().len(), 18);
}

#[test]
fn test_invocation_failure_exports_only_exit_code() {
    for code in [1, 10, 12] {
        let text = exposition(SnapshotCollector::new("restic", failing_invoker(code)));
        let expected = format!(
            "{}\n# TYPE restic_snapshot_exit_code gauge\nrestic_snapshot_exit_code {}\n",
            EXIT_CODE_HELP, code
        );
        assert_eq!(text, expected);
    }
}

#[test]
fn test_spawn_failure_exports_minus_one() {
    let collector = SnapshotCollector::new(
        "/nonexistent/restic",
        |program: &str, _: &[&str]| -> Result<Vec<u8>, InvokeError> {
            Err(InvokeError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        },
    );
    let text = exposition(collector);
    assert_eq!(sample_lines(&text), vec!["restic_snapshot_exit_code -1"]);
}

#[test]
fn test_invalid_output_exports_parse_sentinel() {
    for output in ["{{", "[{", ""] {
        let collector = SnapshotCollector::new("restic", output_invoker(output.as_bytes().to_vec()));
        let scrape = collector.scrape();
        assert_eq!(
            *scrape.outcome.as_ref().expect("no internal error"),
            ScrapeOutcome::DecodeFailed
        );
        assert_eq!(scrape.samples.len(), 1);
        assert_eq!(scrape.exit_code(), Some(1684.0));
    }

    let text = exposition(SnapshotCollector::new(
        "restic",
        output_invoker(fixture("invalid.json")),
    ));
    assert_eq!(sample_lines(&text), vec!["restic_snapshot_exit_code 1684"]);
}

#[test]
fn test_executable_path_is_passed_through() {
    for executable in ["restic", "/usr/bin/restic", "./resticv123"] {
        let expected = executable.to_string();
        let collector = SnapshotCollector::new(
            executable,
            move |program: &str, args: &[&str]| -> Result<Vec<u8>, InvokeError> {
                assert_eq!(program, expected);
                assert_eq!(args, SNAPSHOTS_ARGS);
                Ok(b"[]".to_vec())
            },
        );
        let text = exposition(collector);
        assert_eq!(
            sample_lines(&text),
            vec!["restic_snapshot_count_total 0", "restic_snapshot_exit_code 0"]
        );
    }
}

#[test]
fn test_empty_repository() {
    let collector = SnapshotCollector::new("restic", output_invoker(fixture("empty.json")));
    let scrape = collector.scrape();
    assert_eq!(scrape.samples.len(), 2);
    assert_eq!(
        scrape.outcome.expect("no internal error"),
        ScrapeOutcome::Completed {
            groups: 0,
            snapshots: 0
        }
    );
}

#[test]
fn test_multiple_groups() {
    let text = exposition(SnapshotCollector::new(
        "restic",
        output_invoker(fixture("multiple_groups.json")),
    ));
    let lines = sample_lines(&text);

    // 1 exit code + 1 total + 2 groups * (1 count + 15 last snapshot)
    assert_eq!(lines.len(), 34);

    for expected in [
        "restic_snapshot_exit_code 0",
        "restic_snapshot_count_total 4",
        r#"restic_snapshot_count{restic_hostname="DPC1",restic_tags="minebase"} 1"#,
        r#"restic_snapshot_count{restic_hostname="DPC1",restic_tags="papermc"} 3"#,
        r#"restic_last_snapshot_time_seconds{restic_hostname="DPC1",restic_tags="minebase"} 1761495627"#,
        r#"restic_last_snapshot_time_seconds{restic_hostname="DPC1",restic_tags="papermc"} 1761506820"#,
        r#"restic_last_snapshot_backup_start_seconds{restic_hostname="DPC1",restic_tags="minebase"} 1761495627"#,
        r#"restic_last_snapshot_backup_end_seconds{restic_hostname="DPC1",restic_tags="minebase"} 1761495631"#,
        r#"restic_last_snapshot_backup_end_seconds{restic_hostname="DPC1",restic_tags="papermc"} 1761506824"#,
        r#"restic_last_snapshot_files_new{restic_hostname="DPC1",restic_tags="minebase"} 129"#,
        r#"restic_last_snapshot_files_unmodified{restic_hostname="DPC1",restic_tags="papermc"} 288"#,
        r#"restic_last_snapshot_dirs_new{restic_hostname="DPC1",restic_tags="minebase"} 92"#,
        r#"restic_last_snapshot_dirs_unmodified{restic_hostname="DPC1",restic_tags="papermc"} 391"#,
        r#"restic_last_snapshot_data_blobs{restic_hostname="DPC1",restic_tags="minebase"} 126"#,
        r#"restic_last_snapshot_data_blobs{restic_hostname="DPC1",restic_tags="papermc"} 0"#,
        r#"restic_last_snapshot_tree_blobs{restic_hostname="DPC1",restic_tags="minebase"} 92"#,
        r#"restic_last_snapshot_data_added_bytes{restic_hostname="DPC1",restic_tags="minebase"} 276436"#,
        r#"restic_last_snapshot_data_added_bytes{restic_hostname="DPC1",restic_tags="papermc"} 0"#,
        r#"restic_last_snapshot_data_added_packed_bytes{restic_hostname="DPC1",restic_tags="minebase"} 157995"#,
        r#"restic_last_snapshot_total_files_processed{restic_hostname="DPC1",restic_tags="papermc"} 288"#,
        r#"restic_last_snapshot_total_bytes_processed{restic_hostname="DPC1",restic_tags="minebase"} 126189"#,
        r#"restic_last_snapshot_total_bytes_processed{restic_hostname="DPC1",restic_tags="papermc"} 202676503"#,
    ] {
        assert!(
            lines.contains(&expected),
            "missing line {:?} in exposition:\n{}",
            expected,
            text
        );
    }
}

#[test]
fn test_group_without_snapshots_exports_count_only() {
    let json = br#"[
        {"group_key": {"hostname": "h1", "tags": ["empty"]}, "snapshots": []},
        {"group_key": {"hostname": "h2", "tags": null},
         "snapshots": [{"time": "2025-10-08T05:23:10+02:00", "hostname": "h2"}]}
    ]"#;
    let collector = SnapshotCollector::new("restic", output_invoker(json.to_vec()));
    let scrape = collector.scrape();

    assert_eq!(
        scrape.outcome.expect("no internal error"),
        ScrapeOutcome::Completed {
            groups: 2,
            snapshots: 1
        }
    );
    // exit code, total, h1 count, h2 count + 15
    assert_eq!(scrape.samples.len(), 19);

    let h1: Vec<_> = scrape
        .samples
        .iter()
        .filter(|s| s.label("restic_hostname") == Some("h1"))
        .collect();
    assert_eq!(h1.len(), 1);
    assert_eq!(h1[0].value, 0.0);

    // Missing summary: backup timestamps export as 0, tags label is empty
    let text = exposition(SnapshotCollector::new("restic", output_invoker(json.to_vec())));
    assert!(text.contains(
        r#"restic_last_snapshot_backup_start_seconds{restic_hostname="h2",restic_tags=""} 0"#
    ));
    assert!(text.contains(
        r#"restic_last_snapshot_time_seconds{restic_hostname="h2",restic_tags=""} 1759893790"#
    ));
}

#[test]
fn test_exit_code_is_emitted_exactly_once() {
    let collector = SnapshotCollector::new("restic", output_invoker(fixture("input1.json")));
    let scrape = collector.scrape();
    let exit_codes = scrape
        .samples
        .iter()
        .filter(|s| s.metric == restic_exporter::SnapshotMetric::ExitCode)
        .count();
    assert_eq!(exit_codes, 1);
    assert_eq!(
        scrape.samples[0].metric,
        restic_exporter::SnapshotMetric::ExitCode
    );
}

#[test]
fn test_scrapes_are_independent() {
    let collector = SnapshotCollector::new("restic", output_invoker(fixture("input1.json")));
    let first = collector.scrape();
    let second = collector.scrape();
    assert_eq!(first.samples, second.samples);
}

#[test]
fn test_collect_records_scrape_stats() {
    let stats = Arc::new(ScrapeStats::new());

    let ok = SnapshotCollector::new("restic", output_invoker(fixture("empty.json")))
        .with_stats(Arc::clone(&stats));
    ok.collect();
    assert!(stats.is_healthy());

    let failing =
        SnapshotCollector::new("restic", failing_invoker(10)).with_stats(Arc::clone(&stats));
    failing.collect();
    assert!(!stats.is_healthy());
    assert_eq!(stats.scrapes_total.load(Ordering::Relaxed), 2);
    assert_eq!(stats.last_exit_code.load(Ordering::Relaxed), 10);

    let invalid = SnapshotCollector::new("restic", output_invoker(b"[{".to_vec()))
        .with_stats(Arc::clone(&stats));
    invalid.collect();
    assert_eq!(stats.decode_failures.load(Ordering::Relaxed), 1);
    assert_eq!(stats.last_exit_code.load(Ordering::Relaxed), 1684);
}
