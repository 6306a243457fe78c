use crate::api::logging::{debug_events_enabled, emit_event_trace};
use crate::types::{ClientFrame, ServerEvent};
use anyhow::{anyhow, bail, Result};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent>> + Send>>;

/// Seam to the actual wire (WebSocket or otherwise). Opening a target yields
/// the ordered inbound event stream and a sender for outbound frames.
pub trait SessionTransport: Send + Sync {
    fn open(&self, target: &str) -> Result<(EventStream, mpsc::UnboundedSender<ClientFrame>)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// One logical stream per conversation target.
///
/// Binding is idempotent for the currently-bound target; switching targets
/// requires the caller to unbind first. On close or error the session
/// unbinds and reports disconnected; reconnecting is the caller's policy.
pub struct ConnectionSession {
    transport: Arc<dyn SessionTransport>,
    bound_target: Option<String>,
    outbound: Option<mpsc::UnboundedSender<ClientFrame>>,
    events: Option<EventStream>,
    state: ConnectionState,
    cancel: CancellationToken,
}

impl ConnectionSession {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            bound_target: None,
            outbound: None,
            events: None,
            state: ConnectionState::Disconnected,
            cancel: CancellationToken::new(),
        }
    }

    pub fn bind(&mut self, target: &str) -> Result<()> {
        match &self.bound_target {
            Some(bound) if bound == target => return Ok(()),
            Some(bound) => {
                bail!("session is still bound to '{bound}'; unbind before binding '{target}'")
            }
            None => {}
        }

        let (events, outbound) = self.transport.open(target)?;
        self.bound_target = Some(target.to_string());
        self.events = Some(events);
        self.outbound = Some(outbound);
        self.state = ConnectionState::Connected;
        self.cancel = CancellationToken::new();
        Ok(())
    }

    pub fn unbind(&mut self) {
        self.cancel.cancel();
        self.bound_target = None;
        self.outbound = None;
        self.events = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Returns false when no live connection can carry the frame; the caller
    /// falls back to the one-shot request path for that submission.
    pub fn send(&mut self, frame: &ClientFrame) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        let Some(outbound) = &self.outbound else {
            return false;
        };
        if debug_events_enabled() {
            if let Ok(payload) = serde_json::to_value(frame) {
                emit_event_trace("outbound", &payload);
            }
        }
        if outbound.send(frame.clone()).is_err() {
            self.mark_disconnected();
            return false;
        }
        true
    }

    /// Hand the inbound stream to the event loop. The stream is consumed
    /// once; rebinding produces a fresh one.
    pub fn take_events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    pub fn mark_disconnected(&mut self) {
        self.unbind();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn bound_target(&self) -> Option<&str> {
        self.bound_target.as_deref()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// In-memory transport backed by channels. Used by tests and by embedders
/// that feed events from their own wire handling.
pub struct ChannelTransport {
    events: Mutex<Option<EventStream>>,
    frame_tx: mpsc::UnboundedSender<ClientFrame>,
    opens: AtomicUsize,
}

pub struct ChannelTransportHandle {
    pub event_tx: mpsc::UnboundedSender<ServerEvent>,
    pub frame_rx: mpsc::UnboundedReceiver<ClientFrame>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, ChannelTransportHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let stream: EventStream = Box::pin(futures::stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|event| (Ok(event), rx))
        }));
        (
            Self {
                events: Mutex::new(Some(stream)),
                frame_tx,
                opens: AtomicUsize::new(0),
            },
            ChannelTransportHandle { event_tx, frame_rx },
        )
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SessionTransport for ChannelTransport {
    fn open(&self, _target: &str) -> Result<(EventStream, mpsc::UnboundedSender<ClientFrame>)> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let events = self
            .events
            .lock()
            .expect("channel transport lock poisoned")
            .take()
            .ok_or_else(|| anyhow!("channel transport already opened"))?;
        Ok((events, self.frame_tx.clone()))
    }
}
