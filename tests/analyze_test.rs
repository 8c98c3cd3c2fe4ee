mod common;

use chunk_series::report::{render_human, render_json};
use chunk_series::{Analyzer, Error, Notifier};
use common::{inspect, MockBackend};
use serde_json::Value;

/// `:0` has layers A, B, C and `:1` has A, B, D, with originals that share nothing.
fn series_backend(with_originals: bool) -> MockBackend {
    let mut mock = MockBackend::default();
    mock.add_image(
        "localhost/fcos-chunked:0",
        inspect(
            &[
                ("sha256:a", 100, Some("glibc")),
                ("sha256:b", 200, Some("kernel")),
                ("sha256:c", 300, Some("podman")),
            ],
            Some("41.1"),
        ),
    );
    mock.add_image(
        "localhost/fcos-chunked:1",
        inspect(
            &[
                ("sha256:a", 100, Some("glibc")),
                ("sha256:b", 200, Some("kernel")),
                ("sha256:d", 400, Some("podman")),
            ],
            Some("41.2"),
        ),
    );
    if with_originals {
        mock.add_image(
            "localhost/fcos-chunked-orig:0",
            inspect(&[("sha256:x", 1000, None)], None),
        );
        mock.add_image(
            "localhost/fcos-chunked-orig:1",
            inspect(&[("sha256:y", 1100, None)], None),
        );
    }
    mock
}

#[test]
fn test_analyze_series_diff() {
    let mock = series_backend(false);
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let report = analyzer.analyze("localhost/fcos-chunked", false).unwrap();

    assert!(report.original.is_none());
    assert_eq!(report.chunked.images.len(), 2);
    assert_eq!(report.chunked.images[0].total_size, 600);
    assert_eq!(report.chunked.images[1].original_tag.as_deref(), Some("41.2"));

    let update = &report.chunked.updates[0];
    assert_eq!(update.from_tag, "0");
    assert_eq!(update.to_tag, "1");
    assert_eq!(update.from_original.as_deref(), Some("41.1"));
    assert_eq!(update.shared_layers.len(), 2);
    assert_eq!(update.added_layers.len(), 1);
    assert_eq!(update.removed_layers[0].digest, "sha256:c");
    assert_eq!(update.shared_bytes, 300);
    assert_eq!(update.download_bytes, 400);
    assert!((update.reuse_ratio() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(update.changed_components(), vec!["podman"]);

    let summary = report.chunked.summary();
    assert_eq!(summary.update_count, 1);
    assert_eq!(summary.avg_download_bytes, 400);
    assert_eq!(summary.total_download_bytes, 400);
}

#[test]
fn test_analyze_orders_by_index_and_skips_other_tags() {
    let mut mock = MockBackend::default();
    for reference in ["localhost/s:10", "localhost/s:2", "localhost/s:latest", "localhost/s:0"] {
        mock.add_image(reference, inspect(&[("sha256:a", 1, None)], None));
    }
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let report = analyzer.analyze("localhost/s", false).unwrap();

    let tags: Vec<_> = report.chunked.images.iter().map(|i| i.tag.as_str()).collect();
    assert_eq!(tags, vec!["0", "2", "10"]);
    assert_eq!(report.chunked.updates.len(), 2);
    assert!(mock.calls_starting_with("inspect localhost/s:latest").is_empty());
}

#[test]
fn test_analyze_single_image_has_no_updates() {
    let mut mock = MockBackend::default();
    mock.add_image("localhost/s:0", inspect(&[("sha256:a", 1, None)], None));
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let report = analyzer.analyze("localhost/s", false).unwrap();

    assert_eq!(report.chunked.images.len(), 1);
    assert!(report.chunked.updates.is_empty());
    assert!(report.chunked.summary().is_empty());
}

#[test]
fn test_analyze_empty_prefix() {
    let mock = MockBackend::default();
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let err = analyzer.analyze("localhost/nothing", false).unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.to_string(), "No images found with prefix 'localhost/nothing'");
}

#[test]
fn test_compare_originals() {
    let mock = series_backend(true);
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let report = analyzer.analyze("localhost/fcos-chunked", true).unwrap();

    let original = report.original.as_ref().unwrap();
    assert_eq!(original.updates[0].download_bytes, 1100);
    assert_eq!(original.updates[0].reuse_ratio(), 0.0);

    let comparison = chunk_series::report::comparison(&report).unwrap();
    assert_eq!(comparison.download_savings_bytes, 700);
    assert!((comparison.download_savings_ratio - 700.0 / 1100.0).abs() < 1e-9);
    assert!((comparison.reuse_improvement - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_compare_originals_missing() {
    let mock = series_backend(false);
    let analyzer = Analyzer::new(&mock, Notifier::silent());

    let report = analyzer.analyze("localhost/fcos-chunked", true).unwrap();

    assert!(report.original.is_none());
    assert!(chunk_series::report::comparison(&report).is_none());
    assert_eq!(
        mock.calls_starting_with("list_images"),
        vec![
            "list_images localhost/fcos-chunked",
            "list_images localhost/fcos-chunked-orig",
        ]
    );
}

#[test]
fn test_json_report_layout() {
    let mock = series_backend(true);
    let report = Analyzer::new(&mock, Notifier::silent())
        .analyze("localhost/fcos-chunked", true)
        .unwrap();

    let json: Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();

    let chunked = &json["chunked"];
    assert_eq!(chunked["images"][0]["ref"], "localhost/fcos-chunked:0");
    assert_eq!(chunked["images"][0]["original_tag"], "41.1");
    assert_eq!(chunked["images"][0]["layers"][1]["component"], "kernel");
    assert_eq!(chunked["updates"][0]["from"], "0");
    assert_eq!(chunked["updates"][0]["added_layer_count"], 1);
    assert_eq!(chunked["updates"][0]["download_bytes"], 400);
    assert_eq!(chunked["summary"]["update_count"], 1);
    assert_eq!(chunked["summary"]["max_download_bytes"], 400);
    assert!(json["original"]["images"][1]["original_tag"].is_null());
    assert_eq!(json["comparison"]["download_savings_bytes"], 700);
}

#[test]
fn test_json_report_without_originals() {
    let mock = series_backend(false);
    let report = Analyzer::new(&mock, Notifier::silent())
        .analyze("localhost/fcos-chunked", false)
        .unwrap();

    let json: Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();
    let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();

    assert_eq!(keys, vec!["chunked"]);
}

#[test]
fn test_human_report() {
    let mock = series_backend(true);
    let report = Analyzer::new(&mock, Notifier::silent())
        .analyze("localhost/fcos-chunked", true)
        .unwrap();

    let text = render_human(&report, true);

    assert!(text.contains("==> Found 2 chunked images: localhost/fcos-chunked:0 through :1"));
    assert!(text.contains("    :0 (41.1)  3 layers, 600 B"));
    assert!(text.contains("    :0 (41.1) -> :1 (41.2)"));
    assert!(text.contains("    Shared:     2 layers (300 B)"));
    assert!(text.contains("    Added:      1 layers (400 B download)"));
    assert!(text.contains("    Reuse:    66.7%"));
    assert!(text.contains("    Changed components: podman"));
    assert!(text.contains("==> Original (un-chunked) Update Analysis:"));
    assert!(text.contains("    Download savings:       700 B (63.6% smaller)"));
    assert!(text.contains("    Layer reuse improvement: +66.7%"));

    assert!(!render_human(&report, false).contains("Changed components"));
}
