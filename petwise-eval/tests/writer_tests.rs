//! Writing, reading back, and reporting on evaluation logs.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use petwise_eval::{EvalLogWriter, EvaluationLog, EvaluationLogBuilder, ProductSummary, ToolCallRecord};
use petwise_telemetry::PhaseTiming;
use serde_json::json;

fn log(query: &str, second: u32, tool: Option<&str>, products: usize, partial: bool) -> EvaluationLog {
    let ts = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, second).unwrap();
    let mut builder = EvaluationLogBuilder::new("u1", query).with_timestamp(ts);
    if let Some(tool) = tool {
        builder.tool_call(ToolCallRecord {
            name: tool.into(),
            arguments: json!({"query": query}),
            result_count: products,
            timed_out: false,
            error: None,
        });
    }
    builder.products(
        (0..products)
            .map(|i| ProductSummary {
                rank: i + 1,
                product_id: format!("{}", 100 + i),
                name: format!("Product {i}"),
                brand: None,
                score: 0.5,
                matched_fields: Vec::new(),
            })
            .collect(),
    );
    builder.timings([PhaseTiming::new("route_llm", Duration::from_millis(10 * u64::from(second + 1)))]);
    builder.finish("reply".into(), Vec::new(), partial)
}

#[tokio::test]
async fn logs_land_in_dated_directories_without_temp_files() {
    let root = tempfile::tempdir().unwrap();
    let writer = EvalLogWriter::new(root.path());

    let first = log("puppy food", 1, Some("search_products"), 3, false);
    let path = writer.write(&first).await.unwrap();
    assert_eq!(path.parent().unwrap(), root.path().join("2026-03-14"));
    assert!(path.file_name().unwrap().to_str().unwrap().starts_with("100001000_"));

    // Same millisecond and query: a second file, not an overwrite.
    let again = log("puppy food", 1, None, 0, false);
    let second_path = writer.write(&again).await.unwrap();
    assert_ne!(path, second_path);

    let names: Vec<String> = std::fs::read_dir(root.path().join("2026-03-14"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.ends_with(".json") && !n.starts_with('.')));

    let date = first.timestamp.date_naive();
    let read = writer.read_day(date).await.unwrap();
    assert_eq!(read.len(), 2);
}

#[tokio::test]
async fn report_aggregates_a_day() {
    let root = tempfile::tempdir().unwrap();
    let writer = EvalLogWriter::new(root.path());
    for entry in [
        log("puppy food", 1, Some("search_products"), 4, false),
        log("dog bed", 2, Some("search_products"), 2, true),
        log("new puppy tips", 3, Some("search_articles"), 0, false),
    ] {
        writer.write(&entry).await.unwrap();
    }
    std::fs::write(root.path().join("2026-03-14").join("broken.json"), "{").unwrap();

    let date = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap().date_naive();
    let (path, report) = writer.write_report(date).await.unwrap();

    assert_eq!(path, root.path().join("report_2026-03-14.json"));
    assert_eq!(report.turns, 3);
    assert_eq!(report.tool_usage["search_products"], 2);
    assert_eq!(report.tool_usage["search_articles"], 1);
    assert_eq!(report.partial_turns, 1);
    assert_eq!(report.mean_products_per_turn, 2.0);
    assert_eq!(report.phases.len(), 1);
    assert_eq!(report.phases[0].count, 3);

    let on_disk: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(on_disk["turns"], 3);
}

#[tokio::test]
async fn missing_day_reads_empty() {
    let root = tempfile::tempdir().unwrap();
    let writer = EvalLogWriter::new(root.path().join("never-created"));
    let date = Utc::now().date_naive();
    assert!(writer.read_day(date).await.unwrap().is_empty());
}
