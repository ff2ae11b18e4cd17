use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, repo_types::User},
    error::AppError,
    events::{
        dto::{
            CreateEventRequest, EventEnvelope, EventListResponse, EventResponse, RsvpResponse,
            UpdateEventRequest,
        },
        realtime::RsvpUpdate,
        repo_types::{Category, EventChanges, NewEvent, RsvpAction},
    },
    state::AppState,
};

lazy_static! {
    static ref IMAGE_URL_RE: Regex =
        Regex::new(r"(?i)^https?://.+\.(jpg|jpeg|png|webp|gif)$").unwrap();
}

pub(crate) fn is_valid_image_url(url: &str) -> bool {
    IMAGE_URL_RE.is_match(url)
}

fn present(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn not_found() -> AppError {
    AppError::NotFound("Event not found".into())
}

/// Unparsable ids cannot name an event, so they are reported the same way.
fn parse_event_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found())
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.chars().count();
    if !(3..=100).contains(&len) {
        return Err(AppError::Validation(
            "Title must be between 3 and 100 characters long".into(),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), AppError> {
    if description.chars().count() < 10 {
        return Err(AppError::Validation(
            "Description must be at least 10 characters long".into(),
        ));
    }
    Ok(())
}

fn parse_future_date(raw: &str, now: OffsetDateTime) -> Result<OffsetDateTime, AppError> {
    let date = OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| {
        AppError::Validation("Event date must be an RFC 3339 timestamp".into())
    })?;
    if date <= now {
        return Err(AppError::Validation("Event date must be in the future".into()));
    }
    Ok(date)
}

fn parse_category(raw: &str) -> Result<Category, AppError> {
    raw.parse::<Category>().map_err(|_| {
        let allowed: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        AppError::Validation(format!("Category must be one of {}", allowed.join(", ")))
    })
}

fn validate_image(url: &str) -> Result<(), AppError> {
    if !is_valid_image_url(url) {
        return Err(AppError::Validation("Invalid image URL format".into()));
    }
    Ok(())
}

pub async fn list_events(st: &AppState) -> Result<EventListResponse, AppError> {
    let now = OffsetDateTime::now_utc();
    let upcoming = st.events.list_upcoming(now).await?;
    let past = st.events.list_past(now).await?;

    if upcoming.is_empty() && past.is_empty() {
        return Err(AppError::NotFound("No events available at the moment.".into()));
    }
    Ok(EventListResponse {
        upcoming_events: upcoming.into_iter().map(EventResponse::from).collect(),
        past_events: past.into_iter().map(EventResponse::from).collect(),
    })
}

pub async fn get_event(st: &AppState, raw_id: &str) -> Result<EventResponse, AppError> {
    let id = parse_event_id(raw_id)?;
    let event = st.events.find_by_id(id).await?.ok_or_else(not_found)?;
    Ok(event.into())
}

pub async fn create_event(
    st: &AppState,
    creator: &User,
    req: CreateEventRequest,
) -> Result<EventEnvelope, AppError> {
    let (Some(title), Some(description), Some(date), Some(location), Some(category), Some(image)) = (
        present(req.title),
        present(req.description),
        present(req.date),
        present(req.location),
        present(req.category),
        present(req.image),
    ) else {
        return Err(AppError::Validation(
            "Title, description, date, location, category and image are required.".into(),
        ));
    };

    validate_title(&title)?;
    validate_description(&description)?;
    let date = parse_future_date(&date, OffsetDateTime::now_utc())?;
    let category = parse_category(&category)?;
    validate_image(&image)?;

    let event = st
        .events
        .create(NewEvent {
            title,
            description,
            date,
            location,
            category,
            image,
            created_by: creator.id,
        })
        .await?;

    info!(event_id = %event.id, user_id = %creator.id, "event created");
    Ok(EventEnvelope {
        message: "Event created successfully!".into(),
        event: event.into(),
    })
}

pub async fn update_event(
    st: &AppState,
    caller: &User,
    raw_id: &str,
    req: UpdateEventRequest,
) -> Result<EventEnvelope, AppError> {
    let id = parse_event_id(raw_id)?;
    let existing = st.events.find_by_id(id).await?.ok_or_else(not_found)?;
    if existing.created_by != caller.id {
        warn!(event_id = %id, user_id = %caller.id, "update by non-creator rejected");
        return Err(AppError::Forbidden(
            "Unauthorized. You can only update your own events.".into(),
        ));
    }

    let changes = EventChanges {
        title: present(req.title),
        description: present(req.description),
        date: present(req.date)
            .map(|d| parse_future_date(&d, OffsetDateTime::now_utc()))
            .transpose()?,
        location: present(req.location),
        category: present(req.category).map(|c| parse_category(&c)).transpose()?,
        image: present(req.image),
    };
    if let Some(title) = &changes.title {
        validate_title(title)?;
    }
    if let Some(description) = &changes.description {
        validate_description(description)?;
    }
    if let Some(image) = &changes.image {
        validate_image(image)?;
    }

    let event = st
        .events
        .update(id, caller.id, changes)
        .await?
        .ok_or_else(not_found)?;

    info!(event_id = %id, user_id = %caller.id, "event updated");
    Ok(EventEnvelope {
        message: "Event updated successfully".into(),
        event: event.into(),
    })
}

pub async fn delete_event(st: &AppState, caller: &User, raw_id: &str) -> Result<MessageResponse, AppError> {
    let id = parse_event_id(raw_id)?;
    let existing = st.events.find_by_id(id).await?.ok_or_else(not_found)?;
    if existing.created_by != caller.id {
        warn!(event_id = %id, user_id = %caller.id, "delete by non-creator rejected");
        return Err(AppError::Forbidden(
            "Unauthorized. You can only delete your own events.".into(),
        ));
    }
    if !st.events.delete(id, caller.id).await? {
        return Err(not_found());
    }

    info!(event_id = %id, user_id = %caller.id, "event deleted");
    Ok(MessageResponse {
        message: "Event deleted successfully".into(),
    })
}

pub async fn toggle_rsvp(st: &AppState, caller: &User, raw_id: &str) -> Result<RsvpResponse, AppError> {
    let id = parse_event_id(raw_id)?;
    let outcome = st
        .events
        .toggle_interest(id, caller.id)
        .await?
        .ok_or_else(not_found)?;

    st.rsvp.publish(RsvpUpdate {
        event_id: id,
        interested_count: outcome.interested_count,
    });

    info!(event_id = %id, user_id = %caller.id, action = ?outcome.action, count = outcome.interested_count, "rsvp toggled");
    Ok(RsvpResponse {
        message: match outcome.action {
            RsvpAction::Added => "RSVP added".into(),
            RsvpAction::Removed => "RSVP removed".into(),
        },
        action: outcome.action,
        interested_count: outcome.interested_count,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use time::Duration;

    use super::*;
    use crate::auth::repo_types::NewUser;

    async fn member(st: &AppState, name: &str, phone: &str) -> User {
        let user = st
            .users
            .create(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                phone_number: phone.into(),
                password_hash: "hash".into(),
                avatar: "avatar1.png".into(),
            })
            .await
            .unwrap();
        st.users.mark_verified(user.id).await.unwrap().unwrap()
    }

    fn tomorrow() -> String {
        (OffsetDateTime::now_utc() + Duration::days(1))
            .format(&Rfc3339)
            .unwrap()
    }

    fn launch() -> CreateEventRequest {
        CreateEventRequest {
            title: Some("Launch".into()),
            description: Some("Product launch with demos".into()),
            date: Some(tomorrow()),
            location: Some("HQ".into()),
            category: Some("Meetup".into()),
            image: Some("https://x/y.png".into()),
        }
    }

    #[tokio::test]
    async fn create_sets_creator_and_empty_interest() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let created = create_event(&st, &u, launch()).await.unwrap();
        assert_eq!(created.event.created_by, u.id);
        assert!(created.event.interested_users.is_empty());
        assert_eq!(created.event.category, Category::Meetup);
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;

        let past = CreateEventRequest {
            date: Some("2001-01-01T00:00:00Z".into()),
            ..launch()
        };
        assert!(matches!(create_event(&st, &u, past).await, Err(AppError::Validation(_))));

        let bad_category = CreateEventRequest {
            category: Some("Party".into()),
            ..launch()
        };
        assert!(matches!(
            create_event(&st, &u, bad_category).await,
            Err(AppError::Validation(_))
        ));

        let bad_image = CreateEventRequest {
            image: Some("ftp://x/y.bmp".into()),
            ..launch()
        };
        assert!(matches!(create_event(&st, &u, bad_image).await, Err(AppError::Validation(_))));

        let missing = CreateEventRequest {
            location: None,
            ..launch()
        };
        assert!(matches!(create_event(&st, &u, missing).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn rsvp_toggles_and_pairs_restore_state() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let v = member(&st, "victor", "+15550000002").await;
        let w = member(&st, "wanda", "+15550000003").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;
        let id = event.id.to_string();

        let first = toggle_rsvp(&st, &w, &id).await.unwrap();
        assert_eq!((first.action, first.interested_count), (RsvpAction::Added, 1));
        let before = st.events.find_by_id(event.id).await.unwrap().unwrap().interested_users;

        let added = toggle_rsvp(&st, &v, &id).await.unwrap();
        assert_eq!(added.action, RsvpAction::Added);
        assert_eq!(added.interested_count, 2);

        let removed = toggle_rsvp(&st, &v, &id).await.unwrap();
        assert_eq!(removed.action, RsvpAction::Removed);
        assert_eq!(removed.interested_count, 1);

        let after = st.events.find_by_id(event.id).await.unwrap().unwrap().interested_users;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn single_toggle_is_not_idempotent() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;
        let id = event.id.to_string();

        let one = toggle_rsvp(&st, &u, &id).await.unwrap();
        let two = toggle_rsvp(&st, &u, &id).await.unwrap();
        let three = toggle_rsvp(&st, &u, &id).await.unwrap();
        assert_eq!(one.action, RsvpAction::Added);
        assert_eq!(two.action, RsvpAction::Removed);
        assert_eq!(three.action, RsvpAction::Added);

        let stored = st.events.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(stored.interested_users, vec![u.id]);
    }

    #[tokio::test]
    async fn rsvp_publishes_new_count() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;
        let mut rx = st.rsvp.subscribe();

        toggle_rsvp(&st, &u, &event.id.to_string()).await.unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.event_id, event.id);
        assert_eq!(update.interested_count, 1);
    }

    #[tokio::test]
    async fn rsvp_unknown_event_is_not_found() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let missing = toggle_rsvp(&st, &u, &Uuid::new_v4().to_string()).await.unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let garbage = toggle_rsvp(&st, &u, "not-an-id").await.unwrap_err();
        assert_eq!(garbage.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_creator_update_is_forbidden_and_leaves_event_untouched() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let v = member(&st, "victor", "+15550000002").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;
        let before = st.events.find_by_id(event.id).await.unwrap().unwrap();

        let err = update_event(
            &st,
            &v,
            &event.id.to_string(),
            UpdateEventRequest {
                title: Some("Hijacked".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let after = st.events.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn creator_update_is_partial() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;

        let updated = update_event(
            &st,
            &u,
            &event.id.to_string(),
            UpdateEventRequest {
                location: Some("Rooftop".into()),
                category: Some("Festival".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .event;
        assert_eq!(updated.location, "Rooftop");
        assert_eq!(updated.category, Category::Festival);
        assert_eq!(updated.title, "Launch");
        assert_eq!(updated.date, event.date);
    }

    #[tokio::test]
    async fn non_creator_delete_is_forbidden() {
        let st = AppState::fake();
        let u = member(&st, "ursula", "+15550000001").await;
        let v = member(&st, "victor", "+15550000002").await;
        let event = create_event(&st, &u, launch()).await.unwrap().event;
        let id = event.id.to_string();

        let err = delete_event(&st, &v, &id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(st.events.find_by_id(event.id).await.unwrap().is_some());

        delete_event(&st, &u, &id).await.unwrap();
        assert!(st.events.find_by_id(event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_splits_upcoming_and_past() {
        let st = AppState::fake();
        assert_eq!(list_events(&st).await.unwrap_err().status(), StatusCode::NOT_FOUND);

        let u = member(&st, "ursula", "+15550000001").await;
        create_event(&st, &u, launch()).await.unwrap();
        st.events
            .create(NewEvent {
                title: "Retro".into(),
                description: "Looking back at last year".into(),
                date: OffsetDateTime::now_utc() - Duration::days(3),
                location: "HQ".into(),
                category: Category::Other,
                image: "https://x/old.jpg".into(),
                created_by: u.id,
            })
            .await
            .unwrap();

        let listing = list_events(&st).await.unwrap();
        assert_eq!(listing.upcoming_events.len(), 1);
        assert_eq!(listing.upcoming_events[0].title, "Launch");
        assert_eq!(listing.past_events.len(), 1);
        assert_eq!(listing.past_events[0].title, "Retro");
    }

    #[test]
    fn image_url_shapes() {
        assert!(is_valid_image_url("https://cdn.example.com/a/b.PNG"));
        assert!(is_valid_image_url("http://x/y.webp"));
        assert!(!is_valid_image_url("https://x/y.svg"));
        assert!(!is_valid_image_url("x/y.png"));
    }
}
