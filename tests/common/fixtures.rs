//! Fixture builders: export archives and stub endpoints

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Project id used in fixture entry names
pub const PROJECT_ID: &str = "187520";

/// Export path served by the stub endpoint
pub const EXPORT_PATH: &str = "/api/2/export";

/// `count` newline-terminated event records for `day`
pub fn ndjson_events(day: &str, count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        writeln!(
            out,
            r#"{{"event_type":"button_click","event_time":"{day} 12:00:00.000","event_id":{i}}}"#
        )
        .unwrap();
    }
    out
}

/// Gzip-compress `data`
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Export archive for one day, laid out like the real endpoint's:
/// `<project>/<project>_<day>_<hour>#0.json.gz` for each `(hour, records)` pair
pub fn day_archive(day: &str, hours: &[(u32, usize)]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (hour, records) in hours {
            let name = format!("{PROJECT_ID}/{PROJECT_ID}_{day}_{hour}#0.json.gz");
            writer.start_file(name, options).unwrap();
            writer
                .write_all(&gzip(&ndjson_events(day, *records)))
                .unwrap();
        }
        writer.finish().unwrap();
    }
    buf.into_inner()
}

/// `2021-09-17` -> `20210917`
pub fn compact(day: &str) -> String {
    day.replace('-', "")
}

/// Serve `body` for the day window starting at `day` (`YYYY-MM-DD`)
pub async fn mount_day(server: &MockServer, day: &str, body: Vec<u8>) {
    let start = format!("{}T00", compact(day));
    let end = format!("{}T23", compact(day));
    Mock::given(method("GET"))
        .and(path(EXPORT_PATH))
        .and(query_param("start", start.as_str()))
        .and(query_param("end", end.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

/// Answer every request not matched by a more specific mock with 404
pub async fn mount_not_found_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No data"))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}
