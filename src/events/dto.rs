use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::events::repo_types::{Category, Event, RsvpAction};

#[derive(Debug, Default, Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>, // RFC 3339
    pub location: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub location: String,
    pub category: Category,
    pub image: String,
    pub created_by: Uuid,
    pub interested_users: Vec<Uuid>,
    pub interested_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Event> for EventResponse {
    fn from(e: Event) -> Self {
        Self {
            interested_count: e.interested_users.len(),
            id: e.id,
            title: e.title,
            description: e.description,
            date: e.date,
            location: e.location,
            category: e.category,
            image: e.image,
            created_by: e.created_by,
            interested_users: e.interested_users,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    pub upcoming_events: Vec<EventResponse>,
    pub past_events: Vec<EventResponse>,
}

#[derive(Debug, Serialize)]
pub struct EventEnvelope {
    pub message: String,
    pub event: EventResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpResponse {
    pub message: String,
    pub action: RsvpAction,
    pub interested_count: i64,
}
