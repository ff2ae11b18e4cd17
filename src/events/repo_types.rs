use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Concert,
    Sports,
    Conference,
    Meetup,
    Workshop,
    Festival,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Concert,
        Category::Sports,
        Category::Conference,
        Category::Meetup,
        Category::Workshop,
        Category::Festival,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Concert => "Concert",
            Category::Sports => "Sports",
            Category::Conference => "Conference",
            Category::Meetup => "Meetup",
            Category::Workshop => "Workshop",
            Category::Festival => "Festival",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| format!("unknown category `{s}`"))
    }
}

/// Row shape as stored; `category` is plain text in the table.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub location: String,
    pub category: String,
    pub image: String,
    pub created_by: Uuid,
    pub interested_users: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub location: String,
    pub category: Category,
    pub image: String,
    /// Canonical creator identity: the creator's user id.
    pub created_by: Uuid,
    /// Insertion-ordered, never contains duplicates.
    pub interested_users: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<EventRow> for Event {
    type Error = anyhow::Error;

    fn try_from(r: EventRow) -> Result<Self, Self::Error> {
        let category = r
            .category
            .parse::<Category>()
            .map_err(|e| anyhow::anyhow!("event {}: {e}", r.id))?;
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            date: r.date,
            location: r.location,
            category,
            image: r.image,
            created_by: r.created_by,
            interested_users: r.interested_users,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub location: String,
    pub category: Category,
    pub image: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub category: Option<Category>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpOutcome {
    pub action: RsvpAction,
    pub interested_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_only_closed_set() {
        assert_eq!("Meetup".parse::<Category>(), Ok(Category::Meetup));
        assert_eq!(" Other ".parse::<Category>(), Ok(Category::Other));
        assert!("meetup".parse::<Category>().is_err());
        assert!("Party".parse::<Category>().is_err());
    }

    #[test]
    fn unknown_stored_category_fails_conversion() {
        let now = OffsetDateTime::now_utc();
        let row = EventRow {
            id: Uuid::new_v4(),
            title: "Launch".into(),
            description: "A product launch party".into(),
            date: now,
            location: "HQ".into(),
            category: "Rave".into(),
            image: "https://x/y.png".into(),
            created_by: Uuid::new_v4(),
            interested_users: vec![],
            created_at: now,
            updated_at: now,
        };
        assert!(Event::try_from(row).is_err());
    }
}
