use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::StoreError,
    events::repo_types::{Event, EventChanges, EventRow, NewEvent, RsvpAction, RsvpOutcome},
};

#[async_trait]
pub trait EventRepo: Send + Sync {
    /// Events dated at or after `now`, soonest first.
    async fn list_upcoming(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError>;
    /// Events dated before `now`, most recent first.
    async fn list_past(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError>;
    async fn create(&self, new: NewEvent) -> Result<Event, StoreError>;
    /// Applies `changes` only when the event exists and `creator` created it.
    async fn update(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: EventChanges,
    ) -> Result<Option<Event>, StoreError>;
    async fn delete(&self, id: Uuid, creator: Uuid) -> Result<bool, StoreError>;
    /// Atomically flips `user_id`'s membership in the interested set.
    async fn toggle_interest(&self, id: Uuid, user_id: Uuid) -> Result<Option<RsvpOutcome>, StoreError>;
}

const EVENT_COLUMNS: &str = "id, title, description, date, location, category, image, created_by, \
     interested_users, created_at, updated_at";

#[derive(Clone)]
pub struct PgEventRepo {
    db: PgPool,
}

impl PgEventRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<Event>, StoreError> {
    rows.into_iter()
        .map(|r| Event::try_from(r).map_err(StoreError::from))
        .collect()
}

fn into_event(row: Option<EventRow>) -> Result<Option<Event>, StoreError> {
    row.map(Event::try_from).transpose().map_err(StoreError::from)
}

#[async_trait]
impl EventRepo for PgEventRepo {
    async fn list_upcoming(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE date >= $1 ORDER BY date ASC");
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(now)
            .fetch_all(&self.db)
            .await?;
        into_events(rows)
    }

    async fn list_past(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE date < $1 ORDER BY date DESC");
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(now)
            .fetch_all(&self.db)
            .await?;
        into_events(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        into_event(row)
    }

    async fn create(&self, new: NewEvent) -> Result<Event, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO events (id, title, description, date, location, category, image, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {EVENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.date)
            .bind(&new.location)
            .bind(new.category.as_str())
            .bind(&new.image)
            .bind(new.created_by)
            .fetch_one(&self.db)
            .await?;
        Ok(Event::try_from(row)?)
    }

    async fn update(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: EventChanges,
    ) -> Result<Option<Event>, StoreError> {
        let sql = format!(
            r#"
            UPDATE events
               SET title = COALESCE($3, title),
                   description = COALESCE($4, description),
                   date = COALESCE($5, date),
                   location = COALESCE($6, location),
                   category = COALESCE($7, category),
                   image = COALESCE($8, image),
                   updated_at = now()
             WHERE id = $1 AND created_by = $2
            RETURNING {EVENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .bind(creator)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.date)
            .bind(changes.location)
            .bind(changes.category.map(|c| c.as_str()))
            .bind(changes.image)
            .fetch_optional(&self.db)
            .await?;
        into_event(row)
    }

    async fn delete(&self, id: Uuid, creator: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(creator)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_interest(&self, id: Uuid, user_id: Uuid) -> Result<Option<RsvpOutcome>, StoreError> {
        // One statement: the row lock serializes concurrent toggles on the same event.
        let row = sqlx::query_as::<_, (bool, i64)>(
            r#"
            UPDATE events
               SET interested_users = CASE
                       WHEN $2 = ANY(interested_users) THEN array_remove(interested_users, $2)
                       ELSE array_append(interested_users, $2)
                   END,
                   updated_at = now()
             WHERE id = $1
            RETURNING $2 = ANY(interested_users), cardinality(interested_users)::BIGINT
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(now_interested, interested_count)| RsvpOutcome {
            action: if now_interested {
                RsvpAction::Added
            } else {
                RsvpAction::Removed
            },
            interested_count,
        }))
    }
}

#[cfg(test)]
mod pg_tests {
    use futures::future::join_all;
    use time::Duration;

    use super::*;
    use crate::{db::test_pool, events::repo_types::Category};

    async fn seed(repo: &PgEventRepo) -> Event {
        repo.create(NewEvent {
            title: "Launch".into(),
            description: "Product launch party.".into(),
            date: OffsetDateTime::now_utc() + Duration::days(1),
            location: "HQ".into(),
            category: Category::Meetup,
            image: "https://x/y.png".into(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn toggle_adds_then_removes_in_one_statement() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgEventRepo::new(pool);
        let event = seed(&repo).await;
        let user = Uuid::new_v4();

        let first = repo.toggle_interest(event.id, user).await.unwrap().unwrap();
        assert_eq!(first.action, RsvpAction::Added);
        assert_eq!(first.interested_count, 1);

        let second = repo.toggle_interest(event.id, user).await.unwrap().unwrap();
        assert_eq!(second.action, RsvpAction::Removed);
        assert_eq!(second.interested_count, 0);

        assert!(repo.toggle_interest(Uuid::new_v4(), user).await.unwrap().is_none());
        repo.delete(event.id, event.created_by).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_toggles_never_duplicate_members() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgEventRepo::new(pool);
        let event = seed(&repo).await;
        let (id, user) = (event.id, Uuid::new_v4());

        let toggles = (0..10).map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.toggle_interest(id, user).await })
        });
        for outcome in join_all(toggles).await {
            outcome.unwrap().unwrap().unwrap();
        }

        let stored = repo.find_by_id(event.id).await.unwrap().unwrap();
        assert!(stored.interested_users.is_empty());
        repo.delete(event.id, event.created_by).await.unwrap();
    }

    #[tokio::test]
    async fn update_and_delete_require_the_creator() {
        let Some(pool) = test_pool().await else { return };
        let repo = PgEventRepo::new(pool);
        let event = seed(&repo).await;
        let changes = EventChanges {
            title: Some("Hijacked".into()),
            ..Default::default()
        };

        assert!(repo.update(event.id, Uuid::new_v4(), changes).await.unwrap().is_none());
        assert!(!repo.delete(event.id, Uuid::new_v4()).await.unwrap());
        assert_eq!(repo.find_by_id(event.id).await.unwrap().unwrap(), event);

        assert!(repo.delete(event.id, event.created_by).await.unwrap());
    }
}
