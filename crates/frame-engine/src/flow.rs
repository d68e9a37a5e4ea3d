use std::fmt;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use frame_contracts::events::{EventKind, EventLog, EventPayload};
use frame_contracts::milestones::Milestone;
use frame_contracts::payload::ImagePayload;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::gateway::{EnhancementGateway, EnhancementResult, GatewayContext, GatewayOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    AwaitingInput,
    ReadyToGenerate,
    InFlight,
    Succeeded,
    Failed,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingInput => "awaiting_input",
            Self::ReadyToGenerate => "ready_to_generate",
            Self::InFlight => "in_flight",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation screen for a flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Main,
    Loading,
    Preview,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// Back to selection: drops the result and the milestone, keeps the photo.
    Main,
    /// Start over: drops everything.
    NewPhoto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedImage {
    pub image_url: String,
    pub record_id: Option<String>,
}

struct AttemptReport {
    attempt_id: u64,
    outcome: GatewayOutcome,
}

struct PendingAttempt {
    attempt_id: u64,
    receiver: Receiver<AttemptReport>,
    handle: thread::JoinHandle<()>,
}

/// Drives one user's photo -> milestone -> generate flow.
///
/// Generation runs on a worker thread so the caller keeps handling input;
/// results are picked up with [`FlowController::poll`] or
/// [`FlowController::wait`]. At most one attempt is in flight.
pub struct FlowController {
    gateway: Arc<EnhancementGateway>,
    events: Option<EventLog>,
    state: AttemptState,
    image: Option<ImagePayload>,
    milestone: Option<Milestone>,
    result: Option<EnhancedImage>,
    error: Option<String>,
    last_outcome: Option<GatewayOutcome>,
    pending: Option<PendingAttempt>,
    next_attempt_id: u64,
}

impl FlowController {
    pub fn new(gateway: Arc<EnhancementGateway>) -> Self {
        Self {
            gateway,
            events: None,
            state: AttemptState::Idle,
            image: None,
            milestone: None,
            result: None,
            error: None,
            last_outcome: None,
            pending: None,
            next_attempt_id: 1,
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self.emit(
            EventKind::SessionStarted,
            json!({ "milestones": self.gateway.catalog().ids() }),
        );
        self
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn screen(&self) -> Screen {
        match self.state {
            AttemptState::Idle | AttemptState::AwaitingInput | AttemptState::ReadyToGenerate => {
                Screen::Main
            }
            AttemptState::InFlight => Screen::Loading,
            AttemptState::Succeeded => Screen::Preview,
            AttemptState::Failed => Screen::Error,
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn milestone(&self) -> Option<&Milestone> {
        self.milestone.as_ref()
    }

    pub fn result(&self) -> Option<&EnhancedImage> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_outcome(&self) -> Option<&GatewayOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn can_generate(&self) -> bool {
        self.state == AttemptState::ReadyToGenerate
    }

    pub fn select_image(&mut self, image: ImagePayload) -> Result<AttemptState, FlowError> {
        self.ensure_idle_worker()?;
        debug!(image = %image.describe(), "photo selected");
        self.image = Some(image);
        self.clear_attempt();
        self.settle_selection();
        self.emit_selection();
        Ok(self.state)
    }

    pub fn clear_image(&mut self) -> Result<AttemptState, FlowError> {
        self.ensure_idle_worker()?;
        self.image = None;
        self.clear_attempt();
        self.settle_selection();
        self.emit_selection();
        Ok(self.state)
    }

    pub fn select_milestone(&mut self, milestone_id: &str) -> Result<AttemptState, FlowError> {
        self.ensure_idle_worker()?;
        let milestone = self.gateway.catalog().lookup(milestone_id)?.clone();
        self.milestone = Some(milestone);
        self.clear_attempt();
        self.settle_selection();
        self.emit_selection();
        Ok(self.state)
    }

    /// Starts an attempt with the current selection. Only valid from
    /// `ReadyToGenerate`; any other state is rejected without a transition.
    pub fn generate(&mut self, context: GatewayContext) -> Result<(), FlowError> {
        if self.state == AttemptState::InFlight || self.pending.is_some() {
            return Err(FlowError::Busy);
        }
        if self.state != AttemptState::ReadyToGenerate {
            return Err(FlowError::NotReady(self.state));
        }
        let (Some(image), Some(milestone)) = (self.image.clone(), self.milestone.clone()) else {
            return Err(FlowError::NotReady(self.state));
        };

        let attempt_id = self.next_attempt_id;
        let (sender, receiver) = mpsc::channel();
        let gateway = Arc::clone(&self.gateway);
        let milestone_id = milestone.id.clone();
        let handle = thread::Builder::new()
            .name(format!("foreverframe-attempt-{attempt_id}"))
            .spawn(move || {
                let outcome = gateway.run(&image, &milestone_id, &context);
                // The controller may have abandoned this attempt.
                let _ = sender.send(AttemptReport {
                    attempt_id,
                    outcome,
                });
            })
            .map_err(|err| FlowError::WorkerSpawn(err.to_string()))?;

        self.next_attempt_id += 1;
        self.pending = Some(PendingAttempt {
            attempt_id,
            receiver,
            handle,
        });
        self.state = AttemptState::InFlight;
        self.emit(
            EventKind::AttemptStarted,
            json!({
                "attempt_id": attempt_id,
                "milestone_id": milestone.id,
            }),
        );
        Ok(())
    }

    /// Re-runs the failed attempt with the same photo and milestone.
    pub fn retry(&mut self, context: GatewayContext) -> Result<(), FlowError> {
        if self.state != AttemptState::Failed {
            return Err(FlowError::NotFailed(self.state));
        }
        let previous_error = self.error.take();
        self.state = AttemptState::ReadyToGenerate;
        let started = self.generate(context);
        if started.is_err() {
            self.error = previous_error;
            self.state = AttemptState::Failed;
        }
        started
    }

    /// Applies a finished attempt if one is waiting. Never blocks.
    pub fn poll(&mut self) -> AttemptState {
        let Some(pending) = self.pending.as_ref() else {
            return self.state;
        };
        match pending.receiver.try_recv() {
            Ok(report) => self.finish(Some(report)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.finish(None),
        }
        self.state
    }

    /// Blocks until the in-flight attempt settles.
    pub fn wait(&mut self) -> AttemptState {
        let Some(pending) = self.pending.as_ref() else {
            return self.state;
        };
        let report = pending.receiver.recv().ok();
        self.finish(report);
        self.state
    }

    pub fn reset(&mut self, target: ResetTarget) -> AttemptState {
        if let Some(pending) = self.pending.take() {
            // Dropping the handle detaches the worker; its result is ignored.
            self.emit(
                EventKind::AttemptAbandoned,
                json!({ "attempt_id": pending.attempt_id }),
            );
        }
        self.clear_attempt();
        self.milestone = None;
        if target == ResetTarget::NewPhoto {
            self.image = None;
        }
        self.settle_selection();
        self.emit(
            EventKind::FlowReset,
            json!({
                "target": match target {
                    ResetTarget::Main => "main",
                    ResetTarget::NewPhoto => "new_photo",
                },
                "state": self.state.as_str(),
            }),
        );
        self.state
    }

    fn finish(&mut self, report: Option<AttemptReport>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.handle.join().is_err() {
            warn!(attempt_id = pending.attempt_id, "enhancement worker panicked");
        }

        let Some(report) = report.filter(|report| report.attempt_id == pending.attempt_id) else {
            let message = "The enhancement worker stopped unexpectedly.".to_string();
            self.error = Some(message.clone());
            self.state = AttemptState::Failed;
            self.emit(
                EventKind::AttemptFailed,
                json!({ "attempt_id": pending.attempt_id, "message": message }),
            );
            return;
        };

        let outcome = report.outcome;
        if let Some(upload_error) = outcome.upload_error.as_deref() {
            self.emit(
                EventKind::UploadSkipped,
                json!({ "attempt_id": report.attempt_id, "error": upload_error }),
            );
        }
        match &outcome.result {
            EnhancementResult::Success {
                image_url,
                record_id,
            } => {
                self.result = Some(EnhancedImage {
                    image_url: image_url.clone(),
                    record_id: record_id.clone(),
                });
                self.error = None;
                self.state = AttemptState::Succeeded;
                self.emit(
                    EventKind::AttemptSucceeded,
                    json!({
                        "attempt_id": report.attempt_id,
                        "path": outcome.path.as_str(),
                        "record_id": record_id,
                        "elapsed_ms": outcome.elapsed.as_millis() as u64,
                    }),
                );
            }
            EnhancementResult::Failure { message } => {
                self.result = None;
                self.error = Some(message.clone());
                self.state = AttemptState::Failed;
                self.emit(
                    EventKind::AttemptFailed,
                    json!({
                        "attempt_id": report.attempt_id,
                        "path": outcome.path.as_str(),
                        "message": message,
                        "elapsed_ms": outcome.elapsed.as_millis() as u64,
                    }),
                );
            }
        }
        self.last_outcome = Some(outcome);
    }

    fn ensure_idle_worker(&self) -> Result<(), FlowError> {
        if self.state == AttemptState::InFlight {
            return Err(FlowError::Busy);
        }
        Ok(())
    }

    fn clear_attempt(&mut self) {
        self.result = None;
        self.error = None;
        self.last_outcome = None;
    }

    fn settle_selection(&mut self) {
        self.state = match (self.image.is_some(), self.milestone.is_some()) {
            (true, true) => AttemptState::ReadyToGenerate,
            (false, false) => AttemptState::Idle,
            _ => AttemptState::AwaitingInput,
        };
    }

    fn emit_selection(&self) {
        self.emit(
            EventKind::SelectionChanged,
            json!({
                "image": self.image.as_ref().map(ImagePayload::describe),
                "milestone_id": self.milestone.as_ref().map(|milestone| milestone.id.clone()),
                "state": self.state.as_str(),
            }),
        );
    }

    fn emit(&self, kind: EventKind, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let payload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = events.record(kind, payload) {
            warn!(event = kind.as_str(), error = %err, "failed to record flow event");
        }
    }
}
