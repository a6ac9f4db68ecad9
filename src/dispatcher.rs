// dispatcher.rs — Drives capture → request → reply → speech.
//
// All session state lives in one task that consumes an event queue. Captures
// and completion requests run on their own tasks and report back as events,
// so the flow and the in-flight flag are only ever touched here.

use crate::ai::translate::flow_to_messages;
use crate::ai::{extract_reply_text, AiError, ChatProvider, RequestMessage, ResponseMessage};
use crate::capture::{Camera, ImagePayload};
use crate::flow::{Flow, Turn};
use crate::speech::{Speaker, VoiceCatalog};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchState {
    Idle,
    RequestInFlight,
}

/// Result of feeding a completion back into the session.
#[derive(Debug)]
pub enum Completion {
    /// The reply text, already appended to the flow.
    Reply(String),
    /// The request failed; the flow is unchanged.
    Failed(AiError),
    /// No request was outstanding.
    Ignored,
}

/// The conversation plus the single in-flight guard.
#[derive(Debug)]
pub struct Session {
    flow: Flow,
    state: DispatchState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            flow: Flow::new(),
            state: DispatchState::Idle,
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Append a turn and evaluate the dispatch guard once. Returns the
    /// messages to send when a request should start now.
    pub fn append(&mut self, turn: Turn) -> Option<Vec<RequestMessage>> {
        self.flow.push(turn);
        self.on_turn_appended()
    }

    fn on_turn_appended(&mut self) -> Option<Vec<RequestMessage>> {
        let unanswered_image = self.flow.last().is_some_and(Turn::is_image);
        if !unanswered_image {
            return None;
        }
        if self.state == DispatchState::RequestInFlight {
            log::debug!("Request already in flight, holding turn {}", self.flow.len());
            return None;
        }
        self.state = DispatchState::RequestInFlight;
        Some(flow_to_messages(self.flow.turns()))
    }

    /// Close out the outstanding request. Either way the session goes back to
    /// `Idle`; a failure leaves the flow untouched and does not re-dispatch.
    pub fn complete(&mut self, result: Result<ResponseMessage, AiError>) -> Completion {
        if self.state != DispatchState::RequestInFlight {
            log::warn!("Completion received with no request in flight, ignoring");
            return Completion::Ignored;
        }
        self.state = DispatchState::Idle;

        match result.and_then(|resp| extract_reply_text(&resp)) {
            Ok(text) => {
                // A text turn never satisfies the guard.
                let _ = self.append(Turn::reply(text.clone()));
                Completion::Reply(text)
            }
            Err(e) => Completion::Failed(e),
        }
    }
}

/// Events consumed by the dispatcher task.
#[derive(Debug)]
pub enum SessionEvent {
    /// Take a picture with the configured camera.
    Capture,
    /// A picture is ready to be appended.
    ImageCaptured(ImagePayload),
    ResponseReceived(Result<ResponseMessage, AiError>),
    Shutdown,
}

/// Updates published to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionUpdate {
    ImageAdded { turns: usize },
    CaptureSkipped { reason: String },
    RequestSent { turns: usize, messages: usize },
    Reply { text: String },
    RequestFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub model: String,
    pub max_tokens: u32,
}

/// Cheap handle for feeding the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl DispatcherHandle {
    pub async fn capture(&self) -> bool {
        self.tx.send(SessionEvent::Capture).await.is_ok()
    }

    pub async fn submit_image(&self, payload: ImagePayload) -> bool {
        self.tx.send(SessionEvent::ImageCaptured(payload)).await.is_ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionEvent::Shutdown).await;
    }
}

struct SpeechOutput {
    speaker: Arc<dyn Speaker>,
    catalog: Arc<VoiceCatalog>,
}

pub struct Dispatcher {
    session: Session,
    config: DispatchConfig,
    provider: Arc<dyn ChatProvider>,
    camera: Option<Arc<dyn Camera>>,
    speech: Option<SpeechOutput>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        provider: Arc<dyn ChatProvider>,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> (Self, DispatcherHandle) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let handle = DispatcherHandle {
            tx: events_tx.clone(),
        };
        let dispatcher = Self {
            session: Session::new(),
            config,
            provider,
            camera: None,
            speech: None,
            events_tx,
            events_rx,
            updates,
        };
        (dispatcher, handle)
    }

    pub fn with_camera(mut self, camera: Arc<dyn Camera>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Speak every reply with a voice from `catalog`.
    pub fn with_speech(mut self, speaker: Arc<dyn Speaker>, catalog: Arc<VoiceCatalog>) -> Self {
        self.speech = Some(SpeechOutput { speaker, catalog });
        self
    }

    /// Process events until shutdown. Returns the final session.
    pub async fn run(mut self) -> Session {
        log::info!(
            "Dispatcher started (provider={}, model={}, max_tokens={})",
            self.provider.name(),
            self.config.model,
            self.config.max_tokens
        );
        while let Some(event) = self.events_rx.recv().await {
            match event {
                SessionEvent::Capture => self.start_capture(),
                SessionEvent::ImageCaptured(payload) => self.on_image(payload),
                SessionEvent::ResponseReceived(result) => self.on_response(result),
                SessionEvent::Shutdown => break,
            }
        }
        log::info!("Dispatcher stopped after {} turns", self.session.flow().len());
        self.session
    }

    fn publish(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }

    fn start_capture(&self) {
        let Some(camera) = self.camera.as_ref().map(Arc::clone) else {
            log::warn!("Capture requested but no camera is configured");
            self.publish(SessionUpdate::CaptureSkipped {
                reason: "no camera configured".into(),
            });
            return;
        };
        let events = self.events_tx.clone();
        let updates = self.updates.clone();

        tokio::spawn(async move {
            match camera.capture().await {
                Ok(payload) => {
                    log::debug!("Captured {}x{} from {}", payload.width, payload.height, camera.name());
                    let _ = events.send(SessionEvent::ImageCaptured(payload)).await;
                }
                Err(e) => {
                    log::warn!("Capture skipped: {}", e);
                    let _ = updates.send(SessionUpdate::CaptureSkipped {
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    fn on_image(&mut self, payload: ImagePayload) {
        let pending = self.session.append(Turn::image(payload.base64));
        let turns = self.session.flow().len();
        self.publish(SessionUpdate::ImageAdded { turns });

        if let Some(messages) = pending {
            self.send_request(turns, messages);
        }
    }

    fn send_request(&self, turns: usize, messages: Vec<RequestMessage>) {
        log::info!("Sending request to Claude ({} turns, {} messages)", turns, messages.len());
        self.publish(SessionUpdate::RequestSent {
            turns,
            messages: messages.len(),
        });

        let provider = Arc::clone(&self.provider);
        let events = self.events_tx.clone();
        let model = self.config.model.clone();
        let max_tokens = self.config.max_tokens;

        tokio::spawn(async move {
            let result = provider.complete(&model, max_tokens, &messages).await;
            let _ = events.send(SessionEvent::ResponseReceived(result)).await;
        });
    }

    fn on_response(&mut self, result: Result<ResponseMessage, AiError>) {
        match self.session.complete(result) {
            Completion::Reply(text) => {
                log::info!("Reply: {}", text);
                self.speak(&text);
                self.publish(SessionUpdate::Reply { text });
            }
            Completion::Failed(e) => {
                log::error!("Request failed: {}", e);
                self.publish(SessionUpdate::RequestFailed {
                    error: e.to_string(),
                });
            }
            Completion::Ignored => {}
        }
    }

    fn speak(&self, text: &str) {
        let Some(speech) = &self.speech else {
            return;
        };
        let speaker = Arc::clone(&speech.speaker);
        let catalog = Arc::clone(&speech.catalog);
        let text = text.to_string();

        tokio::spawn(async move {
            let voice = match catalog.pick(speaker.as_ref()).await {
                Ok(voice) => voice,
                Err(e) => {
                    log::error!("No voice for {}: {}", catalog.locale(), e);
                    return;
                }
            };
            if let Err(e) = speaker.speak(&text, Some(&voice)) {
                log::error!("Speech failed: {}", e);
            }
        });
    }
}
