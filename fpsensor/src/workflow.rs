//! Multi-step workflows
//!
//! Enrollment and verification are built from single commands. Capture steps
//! retry while the module reports "no finger", every other failure ends the
//! workflow. The continuous loops run until their [`StopToken`] fires.

use tracing::{debug, info, warn};

use fpsensor_core::{
    constants::{
        search::{PAGE_COUNT, START_PAGE},
        slots::{SLOT_1, SLOT_2},
    },
    Opcode, Status,
};

use crate::{
    checkpoint::{Checkpoints, SearchMatch},
    error::{Error, Result},
    sensor::Sensor,
    stop::StopToken,
};

/// Result of one verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The finger matched a stored template
    Found(SearchMatch),

    /// The module reported a failure status
    Failed { status: Status },
}

impl MatchOutcome {
    /// Check if a match was found
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Checkpoint invoked before each capture attempt
#[derive(Debug, Clone, Copy)]
enum Prompt {
    WaitingForFinger,
    PlaceSameFinger,
}

impl Prompt {
    fn announce(self, checkpoints: &mut dyn Checkpoints) {
        match self {
            Self::WaitingForFinger => checkpoints.waiting_for_finger(),
            Self::PlaceSameFinger => checkpoints.place_same_finger(),
        }
    }
}

impl Sensor {
    /// Verify one finger against the library
    ///
    /// Device failures end in [`MatchOutcome::Failed`]. Link and framing
    /// failures are returned as errors. Either way the failure is reported
    /// once through the error checkpoint.
    pub async fn verify(&self, checkpoints: &mut dyn Checkpoints) -> Result<MatchOutcome> {
        match self.scan_and_search(checkpoints).await {
            Ok(found) => {
                checkpoints.matched(found);
                Ok(MatchOutcome::Found(found))
            }
            Err(Error::Device { status, .. }) => {
                checkpoints.error(status.description());
                Ok(MatchOutcome::Failed { status })
            }
            Err(e) => {
                checkpoints.error(&e.message());
                Err(e)
            }
        }
    }

    /// Verify fingers until `stop` fires
    ///
    /// The loop carries on after recoverable errors.
    pub async fn verify_continuous(
        &self,
        checkpoints: &mut dyn Checkpoints,
        mut stop: StopToken,
    ) -> Result<()> {
        info!("Continuous verification started");

        while !stop.is_stopped() {
            let result = tokio::select! {
                _ = stop.stopped() => break,
                result = self.verify(checkpoints) => result,
            };

            match result {
                Ok(outcome) => debug!(?outcome, "Verification pass finished"),
                Err(e) if e.is_recoverable() => debug!("Verification attempt failed: {}", e),
                Err(e) => {
                    warn!("Continuous verification aborted: {}", e);
                    return Err(e);
                }
            }
        }

        info!("Continuous verification stopped");
        Ok(())
    }

    /// Enroll one finger at library page `id`
    ///
    /// Runs the two-scan sequence. A failure is reported once through the
    /// error checkpoint and returned.
    pub async fn enroll(&self, id: u16, checkpoints: &mut dyn Checkpoints) -> Result<()> {
        info!(id, "Enrolling fingerprint");

        match self.enroll_steps(id, checkpoints).await {
            Ok(()) => {
                checkpoints.enrolled(id);
                Ok(())
            }
            Err(e) => {
                checkpoints.error(&e.message());
                Err(e)
            }
        }
    }

    /// Enroll fingers at increasing ids starting from `first_id`
    ///
    /// The id advances only after a successful store. The loop ends when
    /// `stop` fires or the last searchable page has been filled. A
    /// `first_id` outside the searchable pages is rejected with
    /// [`Status::BadLocation`].
    pub async fn enroll_continuous(
        &self,
        first_id: u16,
        checkpoints: &mut dyn Checkpoints,
        mut stop: StopToken,
    ) -> Result<()> {
        let end = START_PAGE + PAGE_COUNT;
        if !(START_PAGE..end).contains(&first_id) {
            let status = Status::BadLocation;
            warn!(first_id, "Enrollment id outside the searchable pages");
            checkpoints.error(status.description());
            return Err(Error::Device {
                opcode: Opcode::Store,
                status,
            });
        }
        let mut id = first_id;

        info!(first_id, "Continuous enrollment started");

        loop {
            if stop.is_stopped() {
                break;
            }
            if id >= end {
                info!(id, "Library full");
                break;
            }

            let result = tokio::select! {
                _ = stop.stopped() => break,
                result = self.enroll(id, checkpoints) => result,
            };

            match result {
                Ok(()) => id += 1,
                Err(e) if e.is_recoverable() => debug!(id, "Enrollment attempt failed"),
                Err(e) => {
                    warn!("Continuous enrollment aborted: {}", e);
                    return Err(e);
                }
            }

            if id >= end {
                continue;
            }
            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(self.config().enroll_interval) => {}
            }
        }

        info!(next_id = id, "Continuous enrollment stopped");
        Ok(())
    }

    // Helper methods

    async fn scan_and_search(&self, checkpoints: &mut dyn Checkpoints) -> Result<SearchMatch> {
        self.scan(SLOT_1, checkpoints, Prompt::WaitingForFinger).await?;
        self.fast_search().await
    }

    async fn enroll_steps(&self, id: u16, checkpoints: &mut dyn Checkpoints) -> Result<()> {
        self.scan(SLOT_1, checkpoints, Prompt::WaitingForFinger).await?;

        checkpoints.remove_finger();
        self.wait_for_removal().await?;

        self.scan(SLOT_2, checkpoints, Prompt::PlaceSameFinger).await?;

        self.register_model().await?;
        self.store_model(id).await
    }

    /// Capture until a finger is present, then extract features into `slot`
    async fn scan(&self, slot: u8, checkpoints: &mut dyn Checkpoints, prompt: Prompt) -> Result<()> {
        let mut attempts = 0;

        loop {
            prompt.announce(checkpoints);
            attempts += 1;

            match self.capture_image().await {
                Ok(()) => break,
                Err(e) if e.is_no_finger() => {
                    self.pause_capture("finger", attempts).await?;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(slot, attempts, "Image captured");
        self.extract_features(slot).await
    }

    /// Capture until the module reports that no finger is present
    async fn wait_for_removal(&self) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.capture_image().await {
                Err(e) if e.is_no_finger() => return Ok(()),
                Ok(()) | Err(Error::Device { .. }) => {
                    self.pause_capture("finger removal", attempts).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn pause_capture(&self, step: &'static str, attempts: u32) -> Result<()> {
        if let Some(max) = self.config().max_capture_attempts {
            if attempts >= max {
                warn!(step, attempts, "Giving up on capture");
                return Err(Error::AttemptsExhausted { step, attempts });
            }
        }
        debug!(step, attempts, "Retrying capture");

        let interval = self.config().poll_interval;
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        Ok(())
    }
}
