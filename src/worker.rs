//! Thread-per-device scan worker
//!
//! Each device is owned exclusively by one dedicated OS thread for the
//! lifetime of a run; the pipeline state never crosses threads, so no locks
//! are involved. Cancellation is cooperative and takes effect at iteration
//! boundaries of the scan loop.

use crate::mix::{MixDevice, ReferenceMix};
use crate::nfactor::ScheduleParams;
use crate::pipeline::{ScanOutcome, SearchPipeline};
use crate::types::{Target, Work};
use crate::{Error, Result};
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a scan running on its own thread
pub struct DeviceWorker {
    handle: JoinHandle<Result<(Work, ScanOutcome)>>,
    cancel: CancellationToken,
}

impl DeviceWorker {
    /// Spawn a worker owning `device` and run one scan over
    /// `[work.nonce(), max_nonce]`
    ///
    /// The worker gets its own copy of the header; on success the winning
    /// nonce is written into that copy, returned by [`join`](Self::join).
    pub fn spawn<D, R>(
        mut device: D,
        reference: R,
        params: ScheduleParams,
        work: Work,
        target: Target,
        max_nonce: u32,
    ) -> Result<Self>
    where
        D: MixDevice + Send + 'static,
        R: ReferenceMix + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = std::thread::Builder::new()
            .name("scan-worker".into())
            .spawn(move || {
                let mut work = work;
                let mut pipeline = SearchPipeline::new(&mut device, &reference, params);
                let outcome = pipeline.scan(&mut work, &target, max_nonce, &token)?;
                debug!(?outcome, "scan worker finished");
                Ok((work, outcome))
            })?;

        Ok(Self { handle, cancel })
    }

    /// Request cooperative cancellation; the in-flight device operation
    /// still completes to its synchronization point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the scan to finish
    pub fn join(self) -> Result<(Work, ScanOutcome)> {
        self.handle
            .join()
            .map_err(|_| Error::invalid_state("scan worker panicked"))?
    }
}
