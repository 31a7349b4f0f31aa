//! Integration tests for the stepwise serpentine scan, driven end to end
//! through the engine with mock hardware.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use voxscan::error::ConcurrencyError;
use voxscan::mock::{MemoryImageWriter, MockCamera, MockPulseClock, MockStage, MockWaveformDevice};
use voxscan::scan::{AxisSpan, CancelToken, ScanBounds, ScanStatus, StepwiseScanRequest};
use voxscan::traits::RegionOfInterest;
use voxscan::{ScanEngine, ScanError};

fn engine_with(
    stage: Arc<MockStage>,
    camera: Arc<MockCamera>,
    sink: Arc<MemoryImageWriter>,
) -> ScanEngine {
    ScanEngine::new(
        stage,
        camera,
        Arc::new(MockWaveformDevice::new()),
        Arc::new(MockPulseClock::new()),
        sink,
    )
}

/// X:[4,5] step 1, Y:[0,2] step 1, Z:[8,8] step 1 -> grid counts (2, 3, 1).
fn small_bounds() -> ScanBounds {
    ScanBounds {
        x: AxisSpan::new(4.0, 5.0, 1.0),
        y: AxisSpan::new(0.0, 2.0, 1.0),
        z: AxisSpan::new(8.0, 8.0, 1.0),
    }
}

#[tokio::test]
async fn test_serpentine_scan_completes_and_persists() {
    let _ = env_logger::builder().is_test(true).try_init();
    let stage = Arc::new(MockStage::new());
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage.clone(), camera.clone(), sink.clone());
    let dir = tempfile::tempdir().expect("tempdir");

    let request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    let handle = engine.start_stepwise(request).expect("scan accepted");
    let outcome = handle.wait().await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.persisted, 6);
    assert_eq!(camera.snap_count().await, 6);

    // Inner axis: initial positioning to y=0, then forward at x=4 and
    // reversed at x=5.
    assert_eq!(
        stage.moves_for(4).await,
        vec![0.0, 0.0, 1.0, 2.0, 2.0, 1.0, 0.0]
    );

    // File names encode the direction-adjusted micrometer coordinates in
    // capture order.
    assert_eq!(
        sink.file_names().await,
        vec![
            "Z8000_X4000_Y0.ome.tif",
            "Z8000_X4000_Y1000.ome.tif",
            "Z8000_X4000_Y2000.ome.tif",
            "Z8000_X5000_Y2000.ome.tif",
            "Z8000_X5000_Y1000.ome.tif",
            "Z8000_X5000_Y0.ome.tif",
        ]
    );
}

#[tokio::test]
async fn test_camera_configured_before_motion() {
    let stage = Arc::new(MockStage::new());
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage.clone(), camera.clone(), sink);
    let dir = tempfile::tempdir().expect("tempdir");

    let mut request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    request.exposure_ms = Some(20.0);
    request.camera_device = Some("ORCA".to_string());
    let outcome = engine.start_stepwise(request).expect("scan accepted").wait().await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(camera.roi().await, Some(RegionOfInterest::at_origin(1000, 1000)));
    assert_eq!(camera.exposure_ms().await, Some(20.0));
    assert_eq!(camera.active_device().await.as_deref(), Some("ORCA"));

    // Velocity is fixed on the outer and middle axes only; the inner axis
    // keeps the driver default.
    assert_eq!(stage.velocity_of(1).await, Some(1.5));
    assert_eq!(stage.velocity_of(3).await, Some(1.5));
    assert_eq!(stage.velocity_of(4).await, None);
}

#[tokio::test]
async fn test_cancellation_persists_exactly_captured_voxels() {
    let stage = Arc::new(MockStage::new());
    let sink = Arc::new(MemoryImageWriter::new());

    // The hook cancels the scan during the second capture; the controller
    // notices at the next voxel boundary.
    let token_cell: Arc<OnceLock<CancelToken>> = Arc::new(OnceLock::new());
    let hook_cell = Arc::clone(&token_cell);
    let camera = Arc::new(MockCamera::new().with_snap_hook(move |count| {
        if count == 2 {
            if let Some(token) = hook_cell.get() {
                token.cancel();
            }
        }
    }));

    let engine = engine_with(stage, camera, sink.clone());
    let dir = tempfile::tempdir().expect("tempdir");
    let request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    let handle = engine.start_stepwise(request).expect("scan accepted");
    token_cell.set(handle.cancel_token()).ok();

    let outcome = handle.wait().await;
    assert_eq!(outcome.status, ScanStatus::Cancelled);
    assert_eq!(outcome.persisted, 2);
    assert_eq!(sink.file_names().await.len(), 2);
}

#[tokio::test]
async fn test_second_scan_rejected_while_first_runs() {
    let stage = Arc::new(MockStage::new().with_settle_polls(1));
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage, camera, sink);
    let dir = tempfile::tempdir().expect("tempdir");
    let request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));

    let first = engine.start_stepwise(request.clone()).expect("first scan accepted");
    let err = engine
        .start_stepwise(request.clone())
        .expect_err("second scan must be rejected");
    assert!(matches!(
        err,
        ScanError::Concurrency(ConcurrencyError::ScanAlreadyRunning)
    ));

    // The first scan is untouched by the rejection.
    let outcome = first.wait().await;
    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.persisted, 6);

    // The slot frees once the task finishes.
    assert!(!engine.is_scanning());
    let again = engine.start_stepwise(request).expect("slot free again");
    assert_eq!(again.wait().await.status, ScanStatus::Completed);
}

#[tokio::test]
async fn test_driver_fault_aborts_and_salvages_buffer() {
    // Move 8 is the inner-axis move of the third voxel: two voxels are
    // already captured when the fault hits.
    let stage = Arc::new(MockStage::new().with_fault_on_move(8));
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage, camera, sink.clone());
    let dir = tempfile::tempdir().expect("tempdir");

    let request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    let outcome = engine.start_stepwise(request).expect("scan accepted").wait().await;

    match &outcome.status {
        ScanStatus::Aborted(reason) => assert!(reason.contains("driver fault")),
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(outcome.persisted, 2);
    assert_eq!(sink.file_names().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_settle_timeout_aborts_before_any_capture() {
    let stage = Arc::new(MockStage::new().with_stuck_axis(4));
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage, camera.clone(), sink);
    let dir = tempfile::tempdir().expect("tempdir");

    let mut request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    request.settle_timeout = Some(Duration::from_millis(50));
    let outcome = engine.start_stepwise(request).expect("scan accepted").wait().await;

    match &outcome.status {
        ScanStatus::Aborted(reason) => assert!(reason.contains("did not settle")),
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(outcome.persisted, 0);
    assert_eq!(camera.snap_count().await, 0);
}

#[tokio::test]
async fn test_invalid_bounds_rejected_before_motion() {
    let stage = Arc::new(MockStage::new());
    let camera = Arc::new(MockCamera::new());
    let sink = Arc::new(MemoryImageWriter::new());
    let engine = engine_with(stage.clone(), camera, sink);
    let dir = tempfile::tempdir().expect("tempdir");

    let mut request = StepwiseScanRequest::new(small_bounds(), dir.path().join("volume"));
    request.bounds.x.step = 0.0;
    let err = engine
        .start_stepwise(request)
        .expect_err("zero step must be rejected");
    assert!(matches!(err, ScanError::Config(_)));

    // Fail fast: nothing reached the hardware and the slot is free.
    assert!(stage.moves().await.is_empty());
    assert!(!engine.is_scanning());
}
