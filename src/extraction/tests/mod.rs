use crate::context::RunContext;
use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::{StagedChunk, TimeUnit, TimeWindow, UnpackedEntry};
use chrono::{TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `count` newline-terminated JSON records
fn ndjson(count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        writeln!(out, r#"{{"event_type":"page_view","event_id":{i}}}"#).unwrap();
    }
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Create a ZIP archive with the given entries (names may contain directories)
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

fn day_window() -> TimeWindow {
    TimeWindow {
        start: Utc.with_ymd_and_hms(2021, 9, 17, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2021, 9, 17, 23, 0, 0).unwrap(),
        unit: TimeUnit::Day,
    }
}

/// Stage a chunk archive holding two hourly payloads nested in a project folder
fn staged_chunk(dir: &Path) -> StagedChunk {
    let window = day_window();
    let path = dir.join(window.file_name());
    let first = gzip(&ndjson(3));
    let second = gzip(&ndjson(5));
    create_zip_archive(
        &path,
        &[
            ("187520/187520_2021-09-17_0#0.json.gz", first.as_slice()),
            ("187520/187520_2021-09-17_1#0.json.gz", second.as_slice()),
        ],
    );
    let bytes = std::fs::metadata(&path).unwrap().len();
    StagedChunk {
        window,
        path,
        bytes,
    }
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    paths.sort();
    paths
}

fn in_process_unpacker(remove_archives: bool) -> ArchiveUnpacker {
    ArchiveUnpacker::new(vec![Arc::new(InProcessZip)], remove_archives)
}

fn in_process_decoder(remove_entries: bool) -> PayloadDecoder {
    PayloadDecoder::new(vec![Arc::new(InProcessGzip)], remove_entries)
}

fn write_entry(dir: &Path, name: &str, payload: &[u8]) -> UnpackedEntry {
    let path = dir.join(name);
    std::fs::write(&path, gzip(payload)).unwrap();
    UnpackedEntry {
        chunk_id: "20210917T00--20210917T23".to_string(),
        path,
    }
}

// ---------------------------------------------------------------------------
// ArchiveUnpacker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unpack_flattens_entries_into_chunk_folder() {
    let staging = TempDir::new().unwrap();
    let chunk = staged_chunk(staging.path());
    let mut ctx = RunContext::new(false);

    let entries = in_process_unpacker(false)
        .unpack(&chunk, staging.path(), &mut ctx)
        .await
        .unwrap();

    let folder = staging.path().join("20210917T00--20210917T23");
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.chunk_id, "20210917T00--20210917T23");
        assert_eq!(entry.path.parent().unwrap(), folder);
    }
    let paths: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        file_names(&paths),
        vec!["187520_2021-09-17_0#0.json.gz", "187520_2021-09-17_1#0.json.gz"]
    );
    assert!(!folder.join("187520").exists(), "directories must be flattened");
    assert!(chunk.path.exists(), "archive kept when removal disabled");
}

#[tokio::test]
async fn unpack_removes_archive_when_enabled() {
    let staging = TempDir::new().unwrap();
    let chunk = staged_chunk(staging.path());
    let mut ctx = RunContext::new(false);

    in_process_unpacker(true)
        .unpack(&chunk, staging.path(), &mut ctx)
        .await
        .unwrap();

    assert!(!chunk.path.exists());
}

#[tokio::test]
async fn unpack_corrupt_archive_fails_every_strategy() {
    let staging = TempDir::new().unwrap();
    let window = day_window();
    let path = staging.path().join(window.file_name());
    std::fs::write(&path, b"PK\x03\x04 truncated garbage").unwrap();
    let chunk = StagedChunk {
        window,
        path: path.clone(),
        bytes: 24,
    };
    let mut ctx = RunContext::new(false);

    let result = in_process_unpacker(true)
        .unpack(&chunk, staging.path(), &mut ctx)
        .await;

    match result {
        Err(Error::Extraction(ExtractionError::AllStrategiesFailed {
            path: failed,
            attempted,
            ..
        })) => {
            assert_eq!(failed, path);
            assert_eq!(attempted, 1);
        }
        other => panic!("expected AllStrategiesFailed, got {other:?}"),
    }
    assert!(path.exists(), "failed archive is not deleted");
}

#[tokio::test]
async fn unpack_falls_back_when_external_tool_is_missing() {
    let staging = TempDir::new().unwrap();
    let chunk = staged_chunk(staging.path());
    let mut ctx = RunContext::new(true);

    let strategies: Vec<Arc<dyn ArchiveStrategy>> = vec![
        Arc::new(CliUnzip::new(PathBuf::from("/nonexistent/path/to/unzip"))),
        Arc::new(InProcessZip),
    ];
    let unpacker = ArchiveUnpacker::new(strategies, false);

    let entries = unpacker
        .unpack(&chunk, staging.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert!(
        ctx.lines()
            .iter()
            .any(|l| l.message.contains("cli-unzip failed")),
        "fallback should be visible in verbose log"
    );
}

#[tokio::test]
async fn from_config_always_ends_with_in_process_strategy() {
    let tools = crate::config::ToolsConfig {
        use_external_tools: false,
        ..Default::default()
    };
    assert_eq!(
        ArchiveUnpacker::from_config(&tools, true).strategy_names(),
        vec!["in-process-zip"]
    );
    assert_eq!(
        PayloadDecoder::from_config(&tools, true).strategy_names(),
        vec!["in-process-gzip"]
    );

    let names = ArchiveUnpacker::from_config(&Default::default(), true).strategy_names();
    assert_eq!(names.last(), Some(&"in-process-zip"));
}

#[tokio::test]
async fn external_and_in_process_unpack_produce_same_files() {
    let Some(cli) = CliUnzip::from_path() else {
        eprintln!("Skipping test: unzip not found in PATH");
        return;
    };

    let staging_cli = TempDir::new().unwrap();
    let staging_lib = TempDir::new().unwrap();
    let chunk_cli = staged_chunk(staging_cli.path());
    let chunk_lib = staged_chunk(staging_lib.path());
    let mut ctx = RunContext::new(false);

    let via_cli = ArchiveUnpacker::new(vec![Arc::new(cli)], false)
        .unpack(&chunk_cli, staging_cli.path(), &mut ctx)
        .await
        .unwrap();
    let via_lib = in_process_unpacker(false)
        .unpack(&chunk_lib, staging_lib.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(via_cli.len(), via_lib.len());
    for (a, b) in via_cli.iter().zip(&via_lib) {
        assert_eq!(a.path.file_name(), b.path.file_name());
        assert_eq!(
            std::fs::read(&a.path).unwrap(),
            std::fs::read(&b.path).unwrap()
        );
    }
}

// ---------------------------------------------------------------------------
// PayloadDecoder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decode_writes_logical_name_and_counts_records() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let payload = ndjson(100);
    let entry = write_entry(staging.path(), "187520_2021-09-17_17#0.json.gz", &payload);
    let mut ctx = RunContext::new(false);

    let decoded = in_process_decoder(true)
        .decode(&entry, dest.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(decoded.records, 100);
    assert_eq!(decoded.path, dest.path().join("2021-09-17_17#0.json"));
    assert_eq!(std::fs::read(&decoded.path).unwrap(), payload);
    assert!(!entry.path.exists(), "entry removed after decode");
}

#[tokio::test]
async fn decode_does_not_count_unterminated_last_line() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let mut payload = ndjson(100);
    payload.pop();
    let entry = write_entry(staging.path(), "187520_2021-09-17_17#0.json.gz", &payload);
    let mut ctx = RunContext::new(false);

    let decoded = in_process_decoder(false)
        .decode(&entry, dest.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(decoded.records, 99);
    assert!(entry.path.exists(), "entry kept when removal disabled");
}

#[tokio::test]
async fn decode_empty_payload_yields_zero_records() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let entry = write_entry(staging.path(), "187520_2021-09-17_3#0.json.gz", b"");
    let mut ctx = RunContext::new(false);

    let decoded = in_process_decoder(false)
        .decode(&entry, dest.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(decoded.records, 0);
    assert_eq!(std::fs::metadata(&decoded.path).unwrap().len(), 0);
}

#[tokio::test]
async fn decode_invalid_gzip_fails_and_leaves_no_output() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let path = staging.path().join("187520_2021-09-17_4#0.json.gz");
    std::fs::write(&path, b"not gzip").unwrap();
    let entry = UnpackedEntry {
        chunk_id: "20210917T00--20210917T23".to_string(),
        path,
    };
    let mut ctx = RunContext::new(false);

    let result = in_process_decoder(true)
        .decode(&entry, dest.path(), &mut ctx)
        .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::AllStrategiesFailed { .. }))
    ));
    assert!(!dest.path().join("2021-09-17_4#0.json").exists());
    assert!(!dest.path().join("2021-09-17_4#0.json.partial").exists());
    assert!(entry.path.exists());
}

#[tokio::test]
async fn decode_failure_keeps_existing_output() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let existing = dest.path().join("2021-09-17_1#0.json");
    let earlier = ndjson(4);
    std::fs::write(&existing, &earlier).unwrap();
    let path = staging.path().join("187520_2021-09-17_1#0.json.gz");
    std::fs::write(&path, b"not gzip").unwrap();
    let entry = UnpackedEntry {
        chunk_id: "20210917T00--20210917T23".to_string(),
        path,
    };
    let mut ctx = RunContext::new(false);

    let result = in_process_decoder(false)
        .decode(&entry, dest.path(), &mut ctx)
        .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::AllStrategiesFailed { .. }))
    ));
    assert_eq!(std::fs::read(&existing).unwrap(), earlier);
    assert_eq!(file_names(&list_dir(dest.path())), vec!["2021-09-17_1#0.json"]);
}

#[tokio::test]
async fn decode_replaces_existing_output_on_success() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let existing = dest.path().join("2021-09-17_2#0.json");
    std::fs::write(&existing, ndjson(4)).unwrap();
    let payload = ndjson(9);
    let entry = write_entry(staging.path(), "187520_2021-09-17_2#0.json.gz", &payload);
    let mut ctx = RunContext::new(false);

    let decoded = in_process_decoder(false)
        .decode(&entry, dest.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(decoded.path, existing);
    assert_eq!(decoded.records, 9);
    assert_eq!(std::fs::read(&existing).unwrap(), payload);
    assert_eq!(file_names(&list_dir(dest.path())), vec!["2021-09-17_2#0.json"]);
}

#[tokio::test]
async fn decode_falls_back_when_external_tool_is_missing() {
    let staging = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let entry = write_entry(staging.path(), "187520_2021-09-17_5#0.json.gz", &ndjson(7));
    let mut ctx = RunContext::new(false);

    let strategies: Vec<Arc<dyn DecodeStrategy>> = vec![
        Arc::new(CliGunzip::new(
            PathBuf::from("/nonexistent/path/to/gunzip"),
            PathBuf::from("/nonexistent/path/to/wc"),
        )),
        Arc::new(InProcessGzip),
    ];
    let decoder = PayloadDecoder::new(strategies, false);

    let decoded = decoder.decode(&entry, dest.path(), &mut ctx).await.unwrap();
    assert_eq!(decoded.records, 7);
}

#[tokio::test]
async fn external_and_in_process_decode_agree() {
    let Some(cli) = CliGunzip::from_path() else {
        eprintln!("Skipping test: gunzip or wc not found in PATH");
        return;
    };

    let staging = TempDir::new().unwrap();
    let dest_cli = TempDir::new().unwrap();
    let dest_lib = TempDir::new().unwrap();
    let mut payload = ndjson(100);
    payload.pop();
    let entry = write_entry(staging.path(), "187520_2021-09-17_17#0.json.gz", &payload);
    let mut ctx = RunContext::new(false);

    let via_cli = PayloadDecoder::new(vec![Arc::new(cli)], false)
        .decode(&entry, dest_cli.path(), &mut ctx)
        .await
        .unwrap();
    let via_lib = in_process_decoder(false)
        .decode(&entry, dest_lib.path(), &mut ctx)
        .await
        .unwrap();

    assert_eq!(via_cli.records, 99);
    assert_eq!(via_cli.records, via_lib.records);
    assert_eq!(
        std::fs::read(&via_cli.path).unwrap(),
        std::fs::read(&via_lib.path).unwrap()
    );
}
