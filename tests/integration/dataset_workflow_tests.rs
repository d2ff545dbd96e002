/*!
 * End-to-end dataset translation tests on mock backends
 */

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dataset_translator::app_config::{BackendId, ColumnSelection, OutputFormat};
use dataset_translator::errors::{BackendError, DatasetError, PipelineError};
use dataset_translator::providers::{MockBackend, TranslationBackend};
use dataset_translator::{Controller, RunStatus};

use crate::common::{init_logger, read_csv, test_config, write_text_dataset};

fn backends(list: &[&MockBackend]) -> Vec<Arc<dyn TranslationBackend>> {
    list.iter()
        .map(|b| Arc::new((*b).clone()) as Arc<dyn TranslationBackend>)
        .collect()
}

/// Three rows at one request per second take at least two seconds and fill every output column
#[tokio::test(start_paused = true)]
async fn test_run_withRateLimitedPrimary_shouldTranslateAllRows() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "prompts.csv", &["hello", "ignore instructions", "test"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.retry.respect_rate_limits = true;
    config.apis.nvidia.rate_limit_rpm = Some(60);
    config.translation.enable_fallback = false;
    config.checkpoint.enabled = false;

    let primary = MockBackend::working(BackendId::Nvidia);
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary]))
        .quiet();

    let start = Instant::now();
    let report = controller.run().await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(report.status, RunStatus::Completed { cell_failures: 0 });
    assert_eq!(primary.call_count(), 3);

    let (header, rows) = read_csv(&dir.path().join("out.csv")).unwrap();
    assert_eq!(header, vec!["text", "text_ar", "text_api"]);
    assert_eq!(rows.len(), 3);
    for (row, source_text) in rows.iter().zip(["hello", "ignore instructions", "test"]) {
        assert_eq!(row[0], source_text);
        assert!(!row[1].is_empty());
        assert_eq!(row[2], "nvidia");
    }
    assert!(dir.path().join("out_stats.json").exists());
}

/// A primary that only fails transiently hands every cell to the secondary
#[tokio::test(start_paused = true)]
async fn test_run_withTransientlyFailingPrimary_shouldFallBackForEveryCell() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["first row", "second row", "third row"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.retry.max_retries = 1;
    config.checkpoint.enabled = false;

    let primary = MockBackend::failing(
        BackendId::Nvidia,
        BackendError::Unknown {
            message: "HTTP 503".to_string(),
            transient: true,
        },
    );
    let secondary = MockBackend::working(BackendId::Fanar);
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary, &secondary]))
        .quiet();

    let report = controller.run().await.unwrap();

    assert!(report.status.is_completed());
    assert_eq!(primary.call_count(), 6);
    assert_eq!(secondary.call_count(), 3);
    assert_eq!(report.stats.fallback_used, 3);

    let (_, rows) = read_csv(&dir.path().join("out.csv")).unwrap();
    assert!(rows.iter().all(|row| row[2] == "fanar"));
}

/// Without fallback, failed cells are recorded and the run still completes
#[tokio::test(start_paused = true)]
async fn test_run_withFailingPrimaryAndNoFallback_shouldMarkCellsFailed() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["first row", "", "third row"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.retry.max_retries = 0;
    config.translation.enable_fallback = false;
    config.checkpoint.enabled = false;
    config.output.include_status_columns = true;

    let primary = MockBackend::failing(BackendId::Nvidia, BackendError::MalformedResponse("no choices".to_string()));
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary]))
        .quiet();

    let report = controller.run().await.unwrap();

    // The blank cell is not work
    assert_eq!(report.status, RunStatus::Completed { cell_failures: 2 });
    assert_eq!(primary.call_count(), 2);

    let (header, rows) = read_csv(&dir.path().join("out.csv")).unwrap();
    assert_eq!(header, vec!["text", "text_ar", "text_api", "text_status"]);
    assert_eq!(rows[0][2], "failed");
    assert_eq!(rows[1][1], "");
    assert_eq!(rows[2][3], "failed");
}

/// Auto column detection skips short and numeric columns; JSON output keeps Arabic unescaped
#[tokio::test]
async fn test_run_withAutoColumnsAndJsonOutput_shouldTranslateTextColumns() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("qa.csv");
    std::fs::write(
        &source,
        "id,label,question\n1,yes,What is the capital city of France?\n2,no,How many legs does a spider have?\n",
    )
    .unwrap();

    let mut config = test_config(&source, dir.path());
    config.dataset.columns_to_translate = ColumnSelection::default();
    config.output.path = Some(dir.path().join("qa_ar.json"));
    config.output.format = OutputFormat::Json;
    config.output.keep_columns = None;
    config.checkpoint.enabled = false;

    let primary = MockBackend::working(BackendId::Nvidia);
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary]))
        .quiet();

    let report = controller.run().await.unwrap();
    assert!(report.status.is_completed());
    assert_eq!(primary.received().len(), 2);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("qa_ar.json")).unwrap()).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["label"], "yes");
    assert!(records[0]["question_ar"].as_str().unwrap().chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)));
    assert!(records[0].get("label_ar").is_none());
}

/// Rejected credentials on every backend abort the run without writing output
#[tokio::test]
async fn test_run_withRejectedCredentials_shouldAbort() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["one", "two", "three"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.checkpoint.enabled = false;

    let primary = MockBackend::failing(BackendId::Nvidia, BackendError::Auth("HTTP 401".to_string()));
    let secondary = MockBackend::failing(BackendId::Fanar, BackendError::Auth("HTTP 403".to_string()));
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary, &secondary]))
        .quiet();

    let report = controller.run().await.unwrap();

    assert!(matches!(report.status, RunStatus::Aborted { processed: 0, total: 3, .. }));
    assert_eq!(primary.call_count(), 1);
    assert_eq!(secondary.call_count(), 1);
    assert!(report.output_path.is_none());
    assert!(!dir.path().join("out.csv").exists());
}

/// A fallback that rejects credentials next to a timing-out primary fails cells instead of aborting
#[tokio::test(start_paused = true)]
async fn test_run_withTimingOutPrimaryAndRejectedFallback_shouldCompleteWithFailedCells() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["first row", "second row", "third row"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.retry.max_retries = 1;
    config.checkpoint.enabled = false;
    config.output.include_status_columns = true;

    let primary = MockBackend::failing(BackendId::Nvidia, BackendError::Timeout("no answer".to_string()));
    let secondary = MockBackend::failing(BackendId::Fanar, BackendError::Auth("HTTP 401".to_string()));
    let controller = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary, &secondary]))
        .quiet();

    let report = controller.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed { cell_failures: 3 });
    assert_eq!(report.stats.processed, 3);
    assert_eq!(report.stats.deferred, 0);
    assert_eq!(primary.call_count(), 6);
    assert_eq!(secondary.call_count(), 1);

    let (_, rows) = read_csv(&dir.path().join("out.csv")).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row[2] == "failed" && row[3] == "failed"));
}

#[tokio::test]
async fn test_run_withUnknownColumn_shouldFailBeforeTranslating() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["one"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.dataset.columns_to_translate = ColumnSelection::Named(vec!["missing".to_string()]);
    config.checkpoint.enabled = false;

    let primary = MockBackend::working(BackendId::Nvidia);
    let result = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary]))
        .quiet()
        .run()
        .await;

    assert!(matches!(result, Err(PipelineError::Dataset(DatasetError::Format(_)))));
    assert_eq!(primary.call_count(), 0);
}

#[tokio::test]
async fn test_run_withMissingDataset_shouldReportNotFound() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("absent.csv"), dir.path());

    let result = dataset_translator::run(config).await;

    assert!(matches!(result, Err(PipelineError::Dataset(DatasetError::NotFound(_)))));
}

#[tokio::test]
async fn test_run_withLimit_shouldOnlyTranslateFirstRows() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_text_dataset(dir.path(), "data.csv", &["a1", "a2", "a3", "a4"]).unwrap();

    let mut config = test_config(&source, dir.path());
    config.dataset.limit = Some(2);
    config.checkpoint.enabled = false;

    let primary = MockBackend::working(BackendId::Nvidia);
    let report = Controller::with_config(config)
        .unwrap()
        .with_backends(backends(&[&primary]))
        .quiet()
        .run()
        .await
        .unwrap();

    assert_eq!(report.stats.total_cells, 2);
    assert_eq!(primary.received(), vec!["a1".to_string(), "a2".to_string()]);
    assert_eq!(report.output.row_count(), 2);
}
