/*!
 * Interrupt and resume through the SQLite checkpoint
 */

use std::path::Path;
use std::sync::Arc;

use dataset_translator::app_config::BackendId;
use dataset_translator::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use dataset_translator::errors::{BackendError, CheckpointError, PipelineError};
use dataset_translator::providers::{MockBackend, TranslationBackend};
use dataset_translator::{Config, Controller, RunReport, RunStatus};

use crate::common::{init_logger, read_csv, test_config, write_text_dataset};

const ROWS: [&str; 5] = ["row one", "row two", "row three", "row four", "row five"];

fn setup(dir: &Path) -> Config {
    let source = write_text_dataset(dir, "data.csv", &ROWS).unwrap();
    let mut config = test_config(&source, dir);
    config.checkpoint.interval = 2;
    config.translation.enable_fallback = false;
    config
}

/// Run until the primary has answered `stop_after` calls, then stop
async fn interrupted_run(config: &Config, stop_after: usize) -> (RunReport, MockBackend) {
    let controller = Controller::with_config(config.clone()).unwrap().quiet();
    let stop = controller.stop_signal();
    let backend = MockBackend::working(BackendId::Nvidia).with_hook(move |call| {
        if call == stop_after {
            stop.stop();
        }
    });
    let report = controller
        .with_backends(vec![Arc::new(backend.clone()) as Arc<dyn TranslationBackend>])
        .run()
        .await
        .unwrap();
    (report, backend)
}

async fn resume_with(config: &Config, backend: &MockBackend) -> Result<RunReport, PipelineError> {
    Controller::with_config(config.clone())
        .unwrap()
        .with_backends(vec![Arc::new(backend.clone()) as Arc<dyn TranslationBackend>])
        .quiet()
        .resume(&config.checkpoint.directory)
        .await
}

#[tokio::test]
async fn test_resume_afterInterrupt_shouldOnlyTranslateRemainingCells() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let (first, first_backend) = interrupted_run(&config, 2).await;
    assert_eq!(first.status, RunStatus::Interrupted { processed: 2, total: 5 });
    assert_eq!(first_backend.call_count(), 2);
    assert!(first.output_path.is_none());
    assert!(!dir.path().join("out.csv").exists());

    let second_backend = MockBackend::working(BackendId::Nvidia);
    let second = resume_with(&config, &second_backend).await.unwrap();

    assert_eq!(second.status, RunStatus::Completed { cell_failures: 0 });
    assert_eq!(second_backend.received(), vec!["row three", "row four", "row five"]);
    assert_eq!(second.stats.resumed_cells, 2);
    assert_eq!(second.stats.processed, 3);

    let (_, rows) = read_csv(&dir.path().join("out.csv")).unwrap();
    assert_eq!(rows.len(), 5);
    for (row, source) in rows.iter().zip(ROWS) {
        assert_eq!(row[0], source);
        assert_eq!(row[1], MockBackend::fake_translation(source));
        assert_eq!(row[2], "nvidia");
    }
}

/// The checkpoint can be inspected without the dataset
#[tokio::test]
async fn test_checkpoint_afterInterrupt_shouldBeLoadableOnItsOwn() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    interrupted_run(&config, 3).await;

    let store = SqliteCheckpointStore::open(&config.checkpoint.directory).await.unwrap();
    let meta = store.metadata().unwrap();
    assert_eq!(meta.total_required_cells, 5);
    assert_eq!(meta.last_completed_index, 3);
    assert_eq!(store.completed_count(), 3);
    assert_eq!(store.pending_writes(), 0);
}

#[tokio::test]
async fn test_resume_withChangedDataset_shouldRejectCheckpoint() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    interrupted_run(&config, 2).await;

    let mut changed = config.clone();
    changed.dataset.limit = Some(4);
    let backend = MockBackend::working(BackendId::Nvidia);
    let result = resume_with(&changed, &backend).await;

    assert!(matches!(
        result,
        Err(PipelineError::Checkpoint(CheckpointError::Mismatch { .. }))
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_resume_afterCompletedRun_shouldNotCallBackends() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let first_backend = MockBackend::working(BackendId::Nvidia);
    let first = Controller::with_config(config.clone())
        .unwrap()
        .with_backends(vec![Arc::new(first_backend.clone()) as Arc<dyn TranslationBackend>])
        .quiet()
        .run()
        .await
        .unwrap();
    assert!(first.status.is_completed());

    let second_backend = MockBackend::working(BackendId::Nvidia);
    let second = resume_with(&config, &second_backend).await.unwrap();

    assert!(second.status.is_completed());
    assert_eq!(second_backend.call_count(), 0);
    assert_eq!(second.output, first.output);
}

/// A fresh run over an existing checkpoint starts from scratch
#[tokio::test]
async fn test_run_withoutResume_shouldResetCheckpoint() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    interrupted_run(&config, 2).await;

    let backend = MockBackend::working(BackendId::Nvidia);
    let report = Controller::with_config(config.clone())
        .unwrap()
        .with_backends(vec![Arc::new(backend.clone()) as Arc<dyn TranslationBackend>])
        .quiet()
        .run()
        .await
        .unwrap();

    assert!(report.status.is_completed());
    assert_eq!(backend.call_count(), 5);
    assert_eq!(report.stats.resumed_cells, 0);
}

/// Cells that failed on credentials are not checkpointed, so a resume retries them
#[tokio::test]
async fn test_resume_afterAuthAbort_shouldRetryEveryCell() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let rejected = MockBackend::failing(BackendId::Nvidia, BackendError::Auth("HTTP 401".to_string()));
    let aborted = Controller::with_config(config.clone())
        .unwrap()
        .with_backends(vec![Arc::new(rejected) as Arc<dyn TranslationBackend>])
        .quiet()
        .run()
        .await
        .unwrap();
    assert!(matches!(aborted.status, RunStatus::Aborted { processed: 0, .. }));

    let backend = MockBackend::working(BackendId::Nvidia);
    let resumed = resume_with(&config, &backend).await.unwrap();

    assert!(resumed.status.is_completed());
    assert_eq!(backend.call_count(), 5);
}
