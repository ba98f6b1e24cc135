//! Embassy task wrappers around the recorder loops.
//!
//! Embassy tasks cannot be generic, so each wrapper pins the recorder's
//! generic loops to the concrete drivers wired in `main`.

use recorder::channel::{FreeBufferReceiver, FreeBufferSender, RequestReceiver, RequestSender, TimestampReceiver};
use recorder::{CaptureLoop, Diagnostics, RecorderConfig, StorageOwner};

use crate::audio::sai::{build_capture, build_monitor};
use crate::audio::{SaiCapture, SaiMonitor};
use crate::storage::{FlashCounter, SdStorage};

/// Capture loop on the SAI drivers.
pub type Capture = CaptureLoop<'static, SaiCapture, SaiMonitor>;

/// Storage owner on the SD card and flash counter.
pub type Owner = StorageOwner<'static, SdStorage, FlashCounter>;

/// Audio task: SAI blocks in, full buffers out.
///
/// Runs on the interrupt executor, so it preempts SD card writes. The SAI
/// drivers are built inside the task: they are not `Send`, and the
/// interrupt executor's spawner only accepts `Send` arguments.
#[embassy_executor::task]
pub async fn capture_task(
    config: RecorderConfig,
    requests: RequestSender<'static>,
    free: FreeBufferReceiver<'static>,
    diag: &'static Diagnostics,
) {
    let source = SaiCapture::new(build_capture);
    let monitor = SaiMonitor::new(build_monitor);
    let capture: Capture = CaptureLoop::new(source, monitor, &config, requests, free, diag);
    capture.run().await
}

/// Sole owner of the SD card.
#[embassy_executor::task]
pub async fn storage_task(
    owner: Owner,
    requests: RequestReceiver<'static>,
    timestamps: TimestampReceiver<'static>,
    free: FreeBufferSender<'static>,
) {
    owner.run(requests, timestamps, free).await
}
