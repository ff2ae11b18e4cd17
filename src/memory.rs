//! Process-local stores used when no `DATABASE_URL` is configured.
//!
//! Each operation holds the write lock for its whole read-modify-write, which
//! gives the same per-document atomicity the Postgres statements provide.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{NewUser, User, UserChanges},
    },
    error::StoreError,
    events::{
        repo::EventRepo,
        repo_types::{Event, EventChanges, NewEvent, RsvpAction, RsvpOutcome},
    },
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(
    users: &HashMap<Uuid, User>,
    except: Option<Uuid>,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<(), StoreError> {
    for u in users.values().filter(|u| Some(u.id) != except) {
        if email.is_some_and(|e| u.email == e) {
            return Err(StoreError::Duplicate("Email"));
        }
        if phone_number.is_some_and(|p| u.phone_number == p) {
            return Err(StoreError::Duplicate("Phone number"));
        }
    }
    Ok(())
}

impl MemoryUserRepo {
    async fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) -> Option<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        f(user);
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone())
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.phone_number == phone_number).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        check_unique(&users, None, Some(&new.email), Some(&new.phone_number))?;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            phone_number: new.phone_number,
            password_hash: new.password_hash,
            avatar: new.avatar,
            is_verified: false,
            login_count: 0,
            verification_token: None,
            verification_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.modify(id, |u| u.login_count += 1).await)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.modify(id, |u| u.is_verified = true).await)
    }

    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .modify(id, |u| {
                u.verification_token = Some(token.to_string());
                u.verification_token_expires_at = Some(expires_at);
            })
            .await)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.verification_token.as_deref() == Some(token)
                && u.verification_token_expires_at.is_some_and(|exp| exp > now)
        }) else {
            return Ok(None);
        };
        user.is_verified = true;
        user.verification_token = None;
        user.verification_token_expires_at = None;
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        check_unique(
            &users,
            Some(id),
            changes.email.as_deref(),
            changes.phone_number.as_deref(),
        )?;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(phone_number) = changes.phone_number {
            user.phone_number = phone_number;
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = avatar;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryEventRepo {
    events: RwLock<HashMap<Uuid, Event>>,
}

impl MemoryEventRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepo for MemoryEventRepo {
    async fn list_upcoming(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        let mut out: Vec<Event> = events.values().filter(|e| e.date >= now).cloned().collect();
        out.sort_by_key(|e| e.date);
        Ok(out)
    }

    async fn list_past(&self, now: OffsetDateTime) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        let mut out: Vec<Event> = events.values().filter(|e| e.date < now).cloned().collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(out)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewEvent) -> Result<Event, StoreError> {
        let now = OffsetDateTime::now_utc();
        let event = Event {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            date: new.date,
            location: new.location,
            category: new.category,
            image: new.image,
            created_by: new.created_by,
            interested_users: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.events.write().await.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: EventChanges,
    ) -> Result<Option<Event>, StoreError> {
        let mut events = self.events.write().await;
        let Some(event) = events.get_mut(&id).filter(|e| e.created_by == creator) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(description) = changes.description {
            event.description = description;
        }
        if let Some(date) = changes.date {
            event.date = date;
        }
        if let Some(location) = changes.location {
            event.location = location;
        }
        if let Some(category) = changes.category {
            event.category = category;
        }
        if let Some(image) = changes.image {
            event.image = image;
        }
        event.updated_at = OffsetDateTime::now_utc();
        Ok(Some(event.clone()))
    }

    async fn delete(&self, id: Uuid, creator: Uuid) -> Result<bool, StoreError> {
        let mut events = self.events.write().await;
        match events.get(&id) {
            Some(e) if e.created_by == creator => Ok(events.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn toggle_interest(&self, id: Uuid, user_id: Uuid) -> Result<Option<RsvpOutcome>, StoreError> {
        let mut events = self.events.write().await;
        let Some(event) = events.get_mut(&id) else {
            return Ok(None);
        };
        let action = match event.interested_users.iter().position(|u| *u == user_id) {
            Some(idx) => {
                event.interested_users.remove(idx);
                RsvpAction::Removed
            }
            None => {
                event.interested_users.push(user_id);
                RsvpAction::Added
            }
        };
        event.updated_at = OffsetDateTime::now_utc();
        Ok(Some(RsvpOutcome {
            action,
            interested_count: event.interested_users.len() as i64,
        }))
    }
}
