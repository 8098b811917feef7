//! The Pipeline Engine (§4.3): executes a Request's six steps in canonical
//! order, threading each step's result into the next, stopping on first
//! failure, and broadcasting a snapshot after every transition.

mod steps;
#[cfg(test)]
mod tests;

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::adapters::Adapters;
use crate::error::Error;
use crate::models::{Request, RequestStatus, StepStatus, StepType};

/// Called after every observable state transition so a Coordinator can
/// replace its stored snapshot and fan it out to subscribers. Must not
/// block or fail the pipeline (§5); implementations should make this a
/// cheap, infallible send into a channel.
pub trait SnapshotSink {
    fn on_update(&mut self, request: &Request);
}

impl<F: FnMut(&Request)> SnapshotSink for F {
    fn on_update(&mut self, request: &Request) {
        self(request)
    }
}

pub struct Engine {
    adapters: Adapters,
    step_timeout: Duration,
}

impl Engine {
    pub fn new(adapters: Adapters, step_timeout: Duration) -> Self {
        Engine { adapters, step_timeout }
    }

    /// Runs every step from the first non-completed one through to a
    /// terminal Request status, honoring "skip if completed" and "halt on
    /// first failure" (§4.3). Safe to call repeatedly on a Request that
    /// already has some steps completed; that's exactly what retry relies on.
    pub async fn run(&self, request: &mut Request, sink: &mut dyn SnapshotSink) {
        if !request.is_complete() && !request.has_failed() {
            request.status = RequestStatus::Running;
            request.touch();
            sink.on_update(request);
        }

        for step_type in StepType::ORDER {
            if request.step(step_type).status == StepStatus::Completed {
                continue;
            }

            let earlier_failed = request.steps[..step_type.index()]
                .iter()
                .any(|s| s.status == StepStatus::Failed);
            if earlier_failed {
                break;
            }

            self.run_step(request, step_type, sink).await;

            if request.step(step_type).status == StepStatus::Failed {
                break;
            }
        }

        request.status = if request.has_failed() {
            RequestStatus::Failed
        } else if request.is_complete() {
            RequestStatus::Completed
        } else {
            RequestStatus::Pending
        };
        request.touch();
        info!(request_id = %request.id, status = ?request.status, "request run finished");
        sink.on_update(request);
    }

    /// `retry_step` (§4.3): reset `step_type` and every later step, then run.
    /// Earlier completed steps are untouched, so their stored results keep
    /// feeding the re-run without redoing external work.
    pub async fn retry_step(&self, request: &mut Request, step_type: StepType, sink: &mut dyn SnapshotSink) {
        request.reset_from(step_type);
        sink.on_update(request);
        self.run(request, sink).await;
    }

    /// `retry_all` (§4.3): reset every step and run from scratch.
    pub async fn retry_all(&self, request: &mut Request, sink: &mut dyn SnapshotSink) {
        request.reset_all();
        sink.on_update(request);
        self.run(request, sink).await;
    }

    async fn run_step(&self, request: &mut Request, step_type: StepType, sink: &mut dyn SnapshotSink) {
        request.step_mut(step_type).start(Utc::now());
        request.touch();
        info!(request_id = %request.id, step = step_type.as_str(), "step started");
        sink.on_update(request);

        let outcome = match tokio::time::timeout(self.step_timeout, self.dispatch(step_type, request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout {
                service: step_type.as_str(),
            }),
        };

        let now = Utc::now();
        match outcome {
            Ok(result) => {
                request.step_mut(step_type).complete(now, result);
                info!(request_id = %request.id, step = step_type.as_str(), "step completed");
            }
            Err(e) => {
                warn!(request_id = %request.id, step = step_type.as_str(), error = %e, "step failed");
                request.step_mut(step_type).fail(now, e.to_string());
                error!(request_id = %request.id, step = step_type.as_str(), "halting request after step failure");
            }
        }
        request.touch();
        sink.on_update(request);
    }

    async fn dispatch(&self, step_type: StepType, request: &Request) -> Result<crate::models::StepResult, Error> {
        match step_type {
            StepType::CheckExistingTickets => steps::check_existing_tickets(&self.adapters).await,
            StepType::AiAnalysis => steps::ai_analysis(&self.adapters, request).await,
            StepType::CreateOrUpdateTracker => steps::create_or_update_tracker(&self.adapters, request).await,
            StepType::MaybeCreateChatChannel => steps::maybe_create_chat_channel(&self.adapters, request).await,
            StepType::MaybeUpdateTrackerWithChat => {
                steps::maybe_update_tracker_with_chat(&self.adapters, request).await
            }
            StepType::AddOperatorsToChat => steps::add_operators_to_chat(&self.adapters, request).await,
        }
    }
}
