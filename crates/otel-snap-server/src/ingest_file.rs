//! Optional file-tailing ingest source.
//!
//! Reads JSONL files produced by an external collector's file exporter: one
//! base directory, with `traces/`, `logs/`, `metrics/` subdirectories, each
//! holding protobuf-JSON-encoded `{Traces,Logs,Metrics}Data` lines. On
//! startup the active file in each subdirectory (e.g. `traces.jsonl`) is
//! loaded oldest-first; rotated archives (any other file in the directory)
//! are skipped. After the initial load, a filesystem watch picks up
//! newly-appended lines.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::logs::v1::LogsData;
use opentelemetry_proto::tonic::metrics::v1::MetricsData;
use opentelemetry_proto::tonic::trace::v1::TracesData;
use otel_snap_store::UnifiedStore;

const ACTIVE_FILE_NAMES: [(&str, &str); 3] =
    [("traces", "traces.jsonl"), ("logs", "logs.jsonl"), ("metrics", "metrics.jsonl")];

/// Per-file byte offset already consumed; reset to zero whenever the
/// watched file is replaced by rotation (detected via a shrinking size).
struct TailState {
    path: PathBuf,
    offset: u64,
}

/// Starts background threads tailing `base_dir`'s `traces/`, `logs/`,
/// `metrics/` subdirectories into `store`. Returns immediately; the
/// watcher threads run for the process lifetime.
pub fn start(base_dir: &Path, store: &'static UnifiedStore) {
    for (signal, file_name) in ACTIVE_FILE_NAMES {
        let dir = base_dir.join(signal);
        let path = dir.join(file_name);
        std::thread::spawn(move || tail_signal(signal, &path, store));
    }
}

fn tail_signal(signal: &'static str, path: &Path, store: &'static UnifiedStore) {
    let mut state = TailState { path: path.to_path_buf(), offset: 0 };
    if let Err(e) = load_existing(&mut state, signal, store) {
        tracing::warn!(signal, path = %state.path.display(), error = %e, "initial file-tail load failed");
    }

    let (tx, rx) = channel::<notify::Result<Event>>();
    let Ok(mut watcher) = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    }) else {
        tracing::warn!(signal, "could not start file watcher");
        return;
    };
    let Some(parent) = state.path.parent() else { return };
    if watcher.watch(parent, RecursiveMode::NonRecursive).is_err() {
        tracing::warn!(signal, dir = %parent.display(), "could not watch directory");
        return;
    }

    watch_loop(&rx, &mut state, signal, store);
}

fn watch_loop(rx: &Receiver<notify::Result<Event>>, state: &mut TailState, signal: &'static str, store: &'static UnifiedStore) {
    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(Ok(event)) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) && event.paths.iter().any(|p| p == &state.path)
                    && let Err(e) = tail_new_lines(state, signal, store)
                {
                    tracing::warn!(signal, error = %e, "file-tail read failed");
                }
            }
            Ok(Err(e)) => tracing::warn!(signal, error = %e, "file watch error"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                let _ = tail_new_lines(state, signal, store);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn load_existing(state: &mut TailState, signal: &str, store: &'static UnifiedStore) -> std::io::Result<()> {
    if !state.path.is_file() {
        return Ok(());
    }
    tail_new_lines(state, signal, store)
}

fn tail_new_lines(state: &mut TailState, signal: &str, store: &'static UnifiedStore) -> std::io::Result<()> {
    let mut file = match File::open(&state.path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let len = file.metadata()?.len();
    if len < state.offset {
        // Rotation: the active file was truncated or replaced. Start over.
        state.offset = 0;
    }
    file.seek(SeekFrom::Start(state.offset))?;
    let mut reader = BufReader::new(&mut file);
    let mut consumed = state.offset;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        if !line.ends_with('\n') {
            // Partial line at EOF; wait for the rest on the next pass.
            break;
        }
        consumed += read as u64;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            ingest_line(signal, trimmed, store);
        }
    }
    state.offset = consumed;
    Ok(())
}

fn ingest_line(signal: &str, line: &str, store: &UnifiedStore) {
    let result = match signal {
        "traces" => serde_json::from_str::<TracesData>(line).map(|data| {
            store.receive_spans(&ExportTraceServiceRequest { resource_spans: data.resource_spans });
        }),
        "logs" => serde_json::from_str::<LogsData>(line).map(|data| {
            store.receive_logs(&ExportLogsServiceRequest { resource_logs: data.resource_logs });
        }),
        "metrics" => serde_json::from_str::<MetricsData>(line).map(|data| {
            store.receive_metrics(&ExportMetricsServiceRequest { resource_metrics: data.resource_metrics });
        }),
        _ => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!(signal, error = %e, "skipping malformed file-tail line");
    }
}

/// Lists the subdirectory contents not matching the active file name, for
/// diagnostics (`get_stats`-style tools may want to report how many
/// rotated archives were skipped).
#[must_use]
pub fn skipped_archives(base_dir: &Path) -> HashMap<&'static str, usize> {
    let mut out = HashMap::new();
    for (signal, file_name) in ACTIVE_FILE_NAMES {
        let dir = base_dir.join(signal);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            out.insert(signal, 0);
            continue;
        };
        let count = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != std::ffi::OsStr::new(file_name))
            .count();
        out.insert(signal, count);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

    use super::*;

    fn leak_store() -> &'static UnifiedStore {
        Box::leak(Box::new(UnifiedStore::new(8, 8, 8).unwrap()))
    }

    fn write_traces_line(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let span = otel_snap_test_helpers::otlp_span(vec![1], vec![2], Vec::new(), "op", 0, 1, StatusCode::Ok);
        let request = otel_snap_test_helpers::trace_export_request("svc", span);
        let data = TracesData { resource_spans: request.resource_spans };
        let mut f = File::create(dir.join("traces.jsonl")).unwrap();
        writeln!(f, "{}", serde_json::to_string(&data).unwrap()).unwrap();
    }

    #[test]
    fn loads_existing_active_file_on_startup() {
        let tmp = tempfile::tempdir().unwrap();
        let traces_dir = tmp.path().join("traces");
        write_traces_line(&traces_dir);

        let store = leak_store();
        let mut state = TailState { path: traces_dir.join("traces.jsonl"), offset: 0 };
        load_existing(&mut state, "traces", store).unwrap();

        assert_eq!(store.stats().traces.ring.size, 1);
        assert!(state.offset > 0);
    }

    #[test]
    fn rotated_archives_are_not_the_active_file() {
        let tmp = tempfile::tempdir().unwrap();
        let traces_dir = tmp.path().join("traces");
        write_traces_line(&traces_dir);
        std::fs::write(traces_dir.join("traces-2024-01-01.jsonl"), "{}\n").unwrap();

        let skipped = skipped_archives(tmp.path());
        assert_eq!(skipped["traces"], 1);
    }

    #[test]
    fn tail_picks_up_appended_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let traces_dir = tmp.path().join("traces");
        write_traces_line(&traces_dir);

        let store = leak_store();
        let mut state = TailState { path: traces_dir.join("traces.jsonl"), offset: 0 };
        load_existing(&mut state, "traces", store).unwrap();
        assert_eq!(store.stats().traces.ring.size, 1);

        let span2 = otel_snap_test_helpers::otlp_span(vec![3], vec![4], Vec::new(), "op2", 0, 1, StatusCode::Ok);
        let request2 = otel_snap_test_helpers::trace_export_request("svc", span2);
        let data = TracesData { resource_spans: request2.resource_spans };
        let mut f = std::fs::OpenOptions::new().append(true).open(traces_dir.join("traces.jsonl")).unwrap();
        writeln!(f, "{}", serde_json::to_string(&data).unwrap()).unwrap();
        drop(f);

        tail_new_lines(&mut state, "traces", store).unwrap();
        assert_eq!(store.stats().traces.ring.size, 2);
    }
}
