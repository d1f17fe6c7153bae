//! # State Observer
//!
//! Subscribes to every engine property and forwards each signal, tagged with
//! the engine session it came from, into the session's signal channel. The
//! observer interprets nothing.

use bridge_traits::playback::{
    EngineProperty, EngineSessionId, EngineSignal, MediaEngine, SignalSink, SubscriptionId,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// A signal as it arrives on the session's serial context.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSignal {
    pub session: EngineSessionId,
    pub signal: EngineSignal,
}

/// Sink handed to the engine for one session. Delivery never blocks.
struct ChannelSink {
    session: EngineSessionId,
    sender: UnboundedSender<ObservedSignal>,
}

impl SignalSink for ChannelSink {
    fn deliver(&self, signal: EngineSignal) {
        let observed = ObservedSignal {
            session: self.session,
            signal,
        };
        if self.sender.send(observed).is_err() {
            trace!(session = %self.session, "Signal receiver dropped");
        }
    }
}

struct Attachment {
    engine: Arc<dyn MediaEngine>,
    session: EngineSessionId,
    subscriptions: Vec<SubscriptionId>,
}

pub struct StateObserver {
    sender: UnboundedSender<ObservedSignal>,
    attachment: Option<Attachment>,
}

impl StateObserver {
    pub fn new(sender: UnboundedSender<ObservedSignal>) -> Self {
        Self {
            sender,
            attachment: None,
        }
    }

    /// Subscribe to every property of `engine`. Any previous attachment is
    /// detached first, so no signal is ever delivered twice. A missing engine
    /// leaves the observer detached.
    pub fn start_observing(&mut self, engine: Option<Arc<dyn MediaEngine>>, session: EngineSessionId) {
        self.stop_observing();

        let Some(engine) = engine else {
            debug!(%session, "No engine to observe");
            return;
        };

        let sink: Arc<dyn SignalSink> = Arc::new(ChannelSink {
            session,
            sender: self.sender.clone(),
        });
        let subscriptions = EngineProperty::ALL
            .iter()
            .map(|property| engine.subscribe(*property, Arc::clone(&sink)))
            .collect();

        debug!(%session, "Observing engine");
        self.attachment = Some(Attachment {
            engine,
            session,
            subscriptions,
        });
    }

    /// Detach every subscription. No-op when not observing.
    pub fn stop_observing(&mut self) {
        let Some(attachment) = self.attachment.take() else {
            return;
        };
        for subscription in attachment.subscriptions {
            attachment.engine.unsubscribe(subscription);
        }
        debug!(session = %attachment.session, "Stopped observing engine");
    }

    pub fn is_observing(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn session(&self) -> Option<EngineSessionId> {
        self.attachment.as_ref().map(|attachment| attachment.session)
    }

    /// Whether `signal` belongs to the session currently observed.
    pub fn accepts(&self, signal: &ObservedSignal) -> bool {
        self.session() == Some(signal.session)
    }
}

impl Drop for StateObserver {
    fn drop(&mut self) {
        self.stop_observing();
    }
}
