//! In-process listener registry for transaction lifecycle events.
//!
//! # Invariants
//! - All channels in `EventChannel::ALL` exist from construction.
//! - Listeners are append-only and fire in registration order.
//! - A failing listener stops dispatch; its error is handed back unchanged.

use crate::events::channel::EventChannel;
use crate::model::delta::Delta;
use crate::model::record::Record;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Error surfaced by a listener.
pub type ListenerError = Box<dyn Error + Send + Sync>;

pub type ListenerResult = Result<(), ListenerError>;

/// Callback invoked with the target baseline and the delta snapshot.
pub type Listener = Arc<dyn Fn(&Record, &Delta) -> ListenerResult + Send + Sync>;

/// Listener failure with its position in the dispatch order.
#[derive(Debug)]
pub struct DispatchFailure {
    pub index: usize,
    pub source: ListenerError,
}

pub struct EventBus {
    channels: BTreeMap<EventChannel, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        let channels = EventChannel::ALL
            .into_iter()
            .map(|channel| (channel, Vec::new()))
            .collect();
        Self { channels }
    }

    /// Appends `listener` to `channel`.
    pub fn subscribe(&mut self, channel: EventChannel, listener: Listener) {
        self.channels.entry(channel).or_default().push(listener);
    }

    /// Appends `listener` to the channel called `name`.
    ///
    /// Unknown names are ignored; returns whether a channel matched.
    pub fn subscribe_named(&mut self, name: &str, listener: Listener) -> bool {
        match EventChannel::parse(name) {
            Some(channel) => {
                self.subscribe(channel, listener);
                true
            }
            None => false,
        }
    }

    /// Copies the current listener list so dispatch can run without holding
    /// the bus.
    pub fn listeners(&self, channel: EventChannel) -> Vec<Listener> {
        self.channels.get(&channel).cloned().unwrap_or_default()
    }

    pub fn listener_count(&self, channel: EventChannel) -> usize {
        self.channels.get(&channel).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&'static str, usize> = self
            .channels
            .iter()
            .map(|(channel, listeners)| (channel.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

/// Invokes `listeners` in order with `(target, delta)`.
pub fn dispatch(
    listeners: &[Listener],
    target: &Record,
    delta: &Delta,
) -> Result<(), DispatchFailure> {
    for (index, listener) in listeners.iter().enumerate() {
        listener(target, delta).map_err(|source| DispatchFailure { index, source })?;
    }
    Ok(())
}
