//! Sensor cards and their transient alarm state.
//!
//! Raising a channel marks it alarmed and schedules a revert to the idle
//! label. Raising the same channel again aborts the pending revert and starts
//! a fresh one, so reverts never stack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use guardian_bus::BusPublisher;
use guardian_schema::{BusMessage, SensorChannel, ThreatEvent};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_REVERT_MS: u64 = 6_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub label: String,
    /// Width of the confidence bar, 0-100
    pub confidence: u8,
    pub alarm: bool,
}

impl ChannelState {
    pub fn idle(channel: SensorChannel) -> Self {
        Self {
            label: channel.idle_label().to_string(),
            confidence: 0,
            alarm: false,
        }
    }
}

struct Card {
    state: ChannelState,
    /// Bumped on every raise; a revert only applies to the raise that scheduled it.
    generation: u64,
}

type Cards = Arc<RwLock<HashMap<SensorChannel, Card>>>;

pub struct DisplayBoard {
    cards: Cards,
    pending: Mutex<HashMap<SensorChannel, JoinHandle<()>>>,
    bus: BusPublisher,
    revert_after: Duration,
}

impl DisplayBoard {
    pub fn new(bus: BusPublisher, revert_after: Duration) -> Self {
        let cards = SensorChannel::ALL
            .into_iter()
            .map(|channel| {
                let card = Card {
                    state: ChannelState::idle(channel),
                    generation: 0,
                };
                (channel, card)
            })
            .collect();
        Self {
            cards: Arc::new(RwLock::new(cards)),
            pending: Mutex::new(HashMap::new()),
            bus,
            revert_after,
        }
    }

    pub async fn raise(&self, trace_id: Uuid, event: &ThreatEvent) {
        let channel = event.kind.channel();
        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.remove(&channel) {
            previous.abort();
        }

        let generation = {
            let mut cards = self.cards.write().await;
            let card = cards.entry(channel).or_insert_with(|| Card {
                state: ChannelState::idle(channel),
                generation: 0,
            });
            card.generation += 1;
            card.state = ChannelState {
                label: event.severity_label.clone(),
                confidence: event.confidence,
                alarm: true,
            };
            card.generation
        };

        let _ = self
            .bus
            .publish(BusMessage::SensorAlarm {
                trace_id,
                channel,
                label: event.severity_label.clone(),
                confidence: event.confidence,
            })
            .await;

        pending.insert(channel, self.spawn_revert(channel, generation));
    }

    fn spawn_revert(&self, channel: SensorChannel, generation: u64) -> JoinHandle<()> {
        let cards = Arc::clone(&self.cards);
        let bus = self.bus.clone();
        let delay = self.revert_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(label) = revert_if_current(&cards, channel, generation).await {
                tracing::debug!(%channel, "alarm display reverted");
                let _ = bus.publish(BusMessage::SensorIdle { channel, label }).await;
            }
        })
    }

    /// Stop-alarm control: drop every alarm flag now. Labels keep showing
    /// until their scheduled revert.
    pub async fn silence(&self) {
        for card in self.cards.write().await.values_mut() {
            card.state.alarm = false;
        }
        let _ = self.bus.publish(BusMessage::AlarmsSilenced).await;
    }

    pub async fn get(&self, channel: SensorChannel) -> ChannelState {
        self.cards
            .read()
            .await
            .get(&channel)
            .map(|card| card.state.clone())
            .unwrap_or_else(|| ChannelState::idle(channel))
    }

    pub async fn label(&self, channel: SensorChannel) -> String {
        self.get(channel).await.label
    }

    pub async fn snapshot(&self) -> Vec<(SensorChannel, ChannelState)> {
        let cards = self.cards.read().await;
        SensorChannel::ALL
            .into_iter()
            .filter_map(|channel| cards.get(&channel).map(|card| (channel, card.state.clone())))
            .collect()
    }
}

/// Resets `channel` to idle unless it was raised again after `generation`.
/// Returns the idle label when the reset happened.
async fn revert_if_current(
    cards: &Cards,
    channel: SensorChannel,
    generation: u64,
) -> Option<String> {
    let mut cards = cards.write().await;
    let card = cards.get_mut(&channel)?;
    if card.generation != generation {
        return None;
    }
    card.state = ChannelState::idle(channel);
    Some(card.state.label.clone())
}

impl Drop for DisplayBoard {
    fn drop(&mut self) {
        for (_, handle) in self.pending.get_mut().drain() {
            handle.abort();
        }
    }
}
