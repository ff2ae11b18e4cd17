use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

pub const RSVP_EVENT_NAME: &str = "updateRSVP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpUpdate {
    pub event_id: Uuid,
    pub interested_count: i64,
}

/// Fan-out of RSVP count changes to every connected subscriber.
#[derive(Clone)]
pub struct RsvpBroadcaster {
    tx: broadcast::Sender<RsvpUpdate>,
}

impl RsvpBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Never blocks; slow subscribers lag instead of applying backpressure.
    pub fn publish(&self, update: RsvpUpdate) {
        match self.tx.send(update) {
            Ok(receivers) => debug!(receivers, "rsvp update published"),
            Err(_) => debug!("rsvp update dropped: no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RsvpUpdate> {
        self.tx.subscribe()
    }
}

pub async fn rsvp_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.rsvp.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(update) => {
                let data = serde_json::to_string(&update).unwrap_or_default();
                Some((Ok(SseEvent::default().event(RSVP_EVENT_NAME).data(data)), rx))
            }
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!("rsvp subscriber lagged by {} messages", count);
                Some((
                    Ok(SseEvent::default().event("warning").data("Missed some events")),
                    rx,
                ))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_updates() {
        let bus = RsvpBroadcaster::new(8);
        let mut rx = bus.subscribe();
        let update = RsvpUpdate {
            event_id: Uuid::new_v4(),
            interested_count: 3,
        };
        bus.publish(update.clone());
        assert_eq!(rx.recv().await.unwrap(), update);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = RsvpBroadcaster::new(1);
        for n in 0..5 {
            bus.publish(RsvpUpdate {
                event_id: Uuid::new_v4(),
                interested_count: n,
            });
        }
    }

    #[test]
    fn payload_uses_client_field_names() {
        let id = Uuid::nil();
        let json = serde_json::to_value(RsvpUpdate {
            event_id: id,
            interested_count: 2,
        })
        .unwrap();
        assert_eq!(json["eventId"], id.to_string());
        assert_eq!(json["interestedCount"], 2);
    }
}
