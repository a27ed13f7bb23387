use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};
use uuid::Uuid;

use super::{Repository, StoreResult};
use crate::{
    error::StoreError,
    models::{
        AccountCredentials, AdminDashboardStats, Comment, DonationIntent, Event, EventInput,
        InviteCode, LiveStream, LiveStreamInput, NewDonation, NewInvite, NewUser,
        PrayerRequest, PrayerRequestInput, PrayerWallEntry, Role, Sermon, SermonInput, User,
        UserActivity,
    },
};

const EMAIL_TAKEN: &str = "A user with this email already exists";
const CODE_TAKEN: &str = "Invite code already exists";

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    invites: Vec<InviteCode>,
    prayer_requests: Vec<PrayerRequest>,
    comments: Vec<Comment>,
    // (user_id, prayer_request_id)
    prayed_for: HashSet<(Uuid, Uuid)>,
    sermons: Vec<Sermon>,
    events: Vec<Event>,
    livestream: Option<LiveStream>,
    donations: Vec<DonationIntent>,
}

impl Tables {
    fn user_name(&self, id: Uuid) -> Option<String> {
        self.users
            .iter()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.name.clone())
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users
            .iter_mut()
            .map(|stored| &mut stored.user)
            .find(|user| user.id == id)
    }

    fn with_author(&self, comment: &Comment) -> Comment {
        Comment {
            author_name: self.user_name(comment.user_id),
            ..comment.clone()
        }
    }

    fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        let email = new.email.trim().to_lowercase();
        if self.users.iter().any(|stored| stored.user.email == email) {
            return Err(StoreError::UniqueViolation(EMAIL_TAKEN.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email,
            role: Role::User,
            is_active: true,
            created_at: Utc::now(),
        };
        self.users.push(StoredUser {
            user: user.clone(),
            password_hash: new.password_hash,
        });
        Ok(user)
    }
}

/// Newest first; ties keep the most recently inserted record first.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted: Vec<T> = rows.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    sorted
}

fn take<T>(rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    match limit {
        Some(limit) => rows.into_iter().take(limit.max(0) as usize).collect(),
        None => rows,
    }
}

/// MemoryRepository
///
/// A `Repository` kept entirely in process memory, used by the integration tests and for
/// running the portal without a database. Every call is one critical section over all
/// tables, which gives `redeem_invite` and `toggle_prayed` the same atomicity the
/// Postgres implementation gets from conditional statements.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    failing: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with `StoreError::Unavailable`.
    pub fn failing() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            failing: true,
        }
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        if self.failing {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Seeds an account directly, bypassing the signup flow (role and status included).
    pub fn insert_user(&self, user: User, password_hash: &str) -> StoreResult<User> {
        let mut tables = self.tables()?;
        tables.users.push(StoredUser {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    /// Seeds an invite code in any state (used, expired, bound).
    pub fn insert_invite(&self, invite: InviteCode) -> StoreResult<InviteCode> {
        let mut tables = self.tables()?;
        tables.invites.push(invite.clone());
        Ok(invite)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables()?;
        Ok(tables
            .users
            .iter()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.clone()))
    }

    async fn get_credentials_by_email(&self, email: &str) -> StoreResult<Option<AccountCredentials>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables()?;
        Ok(tables
            .users
            .iter()
            .find(|stored| stored.user.email == email)
            .map(|stored| AccountCredentials {
                id: stored.user.id,
                password_hash: stored.password_hash.clone(),
                is_active: stored.user.is_active,
            }))
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.tables()?.insert_user(user)
    }

    async fn list_users(&self, limit: Option<i64>) -> StoreResult<Vec<User>> {
        let tables = self.tables()?;
        let users: Vec<User> = tables.users.iter().map(|stored| stored.user.clone()).collect();
        Ok(take(newest_first(&users, |user| user.created_at), limit))
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let mut tables = self.tables()?;
        Ok(tables.user_mut(id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn toggle_user_active(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut tables = self.tables()?;
        Ok(tables.user_mut(id).map(|user| {
            user.is_active = !user.is_active;
            user.clone()
        }))
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> StoreResult<Option<User>> {
        let mut tables = self.tables()?;
        Ok(tables.user_mut(id).map(|user| {
            user.name = name.to_string();
            user.clone()
        }))
    }

    async fn get_user_activity(&self, id: Uuid) -> StoreResult<UserActivity> {
        let tables = self.tables()?;
        Ok(UserActivity {
            prayer_requests: tables
                .prayer_requests
                .iter()
                .filter(|request| request.user_id == id)
                .count() as i64,
            comments: tables
                .comments
                .iter()
                .filter(|comment| comment.user_id == id)
                .count() as i64,
            prayed_for: tables
                .prayed_for
                .iter()
                .filter(|(user_id, _)| *user_id == id)
                .count() as i64,
        })
    }

    async fn create_invite(&self, invite: NewInvite) -> StoreResult<InviteCode> {
        let mut tables = self.tables()?;
        if tables.invites.iter().any(|existing| existing.code == invite.code) {
            return Err(StoreError::UniqueViolation(CODE_TAKEN.to_string()));
        }
        let created = InviteCode {
            id: Uuid::new_v4(),
            code: invite.code,
            email: invite.email,
            created_by: invite.created_by,
            expires_at: invite.expires_at,
            used_at: None,
            used_by: None,
            created_at: Utc::now(),
        };
        tables.invites.push(created.clone());
        Ok(created)
    }

    async fn get_invite(&self, code: &str) -> StoreResult<Option<InviteCode>> {
        let tables = self.tables()?;
        Ok(tables.invites.iter().find(|invite| invite.code == code).cloned())
    }

    async fn list_invites(&self, limit: i64) -> StoreResult<Vec<InviteCode>> {
        let tables = self.tables()?;
        Ok(take(
            newest_first(&tables.invites, |invite| invite.created_at),
            Some(limit),
        ))
    }

    async fn redeem_invite(
        &self,
        code: &str,
        user: NewUser,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables()?;

        let Some(index) = tables
            .invites
            .iter()
            .position(|invite| invite.code == code && invite.used_at.is_none())
        else {
            return Ok(None);
        };

        // Account creation may fail on a duplicate email; the code is only touched after it succeeds.
        let created = tables.insert_user(user)?;
        let invite = &mut tables.invites[index];
        invite.used_at = Some(now);
        invite.used_by = Some(created.id);
        Ok(Some(created))
    }

    async fn list_prayer_wall(&self, viewer: Uuid) -> StoreResult<Vec<PrayerWallEntry>> {
        let tables = self.tables()?;
        let visible: Vec<PrayerRequest> = tables
            .prayer_requests
            .iter()
            .filter(|request| request.is_public || request.user_id == viewer)
            .cloned()
            .collect();

        Ok(newest_first(&visible, |request| request.created_at)
            .into_iter()
            .map(|request| PrayerWallEntry {
                id: request.id,
                author_name: if request.is_anonymous {
                    None
                } else {
                    tables.user_name(request.user_id)
                },
                prayed_count: tables
                    .prayed_for
                    .iter()
                    .filter(|(_, request_id)| *request_id == request.id)
                    .count() as i64,
                prayed_by_me: tables.prayed_for.contains(&(viewer, request.id)),
                is_mine: request.user_id == viewer,
                title: request.title,
                content: request.content,
                is_anonymous: request.is_anonymous,
                is_public: request.is_public,
                created_at: request.created_at,
                comments: Vec::new(),
            })
            .collect())
    }

    async fn list_recent_prayer_requests(&self, limit: i64) -> StoreResult<Vec<PrayerRequest>> {
        let tables = self.tables()?;
        Ok(take(
            newest_first(&tables.prayer_requests, |request| request.created_at),
            Some(limit),
        ))
    }

    async fn get_prayer_request(&self, id: Uuid) -> StoreResult<Option<PrayerRequest>> {
        let tables = self.tables()?;
        Ok(tables
            .prayer_requests
            .iter()
            .find(|request| request.id == id)
            .cloned())
    }

    async fn create_prayer_request(
        &self,
        owner: Uuid,
        input: PrayerRequestInput,
    ) -> StoreResult<PrayerRequest> {
        let mut tables = self.tables()?;
        let request = PrayerRequest {
            id: Uuid::new_v4(),
            user_id: owner,
            title: input.title,
            content: input.content,
            is_anonymous: input.is_anonymous,
            is_public: input.is_public,
            created_at: Utc::now(),
        };
        tables.prayer_requests.push(request.clone());
        Ok(request)
    }

    async fn delete_prayer_request(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.prayer_requests.len();
        tables.prayer_requests.retain(|request| request.id != id);
        let removed = tables.prayer_requests.len() < before;
        if removed {
            // Mirrors ON DELETE CASCADE.
            tables.comments.retain(|comment| comment.prayer_request_id != id);
            tables.prayed_for.retain(|(_, request_id)| *request_id != id);
        }
        Ok(removed)
    }

    async fn list_comments(&self, prayer_request_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let tables = self.tables()?;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|comment| prayer_request_ids.contains(&comment.prayer_request_id))
            .map(|comment| tables.with_author(comment))
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let tables = self.tables()?;
        Ok(tables
            .comments
            .iter()
            .find(|comment| comment.id == id)
            .map(|comment| tables.with_author(comment)))
    }

    async fn add_comment(
        &self,
        prayer_request_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment> {
        let mut tables = self.tables()?;
        let comment = Comment {
            id: Uuid::new_v4(),
            prayer_request_id,
            user_id,
            content,
            created_at: Utc::now(),
            author_name: None,
        };
        tables.comments.push(comment.clone());
        Ok(tables.with_author(&comment))
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.comments.len();
        tables.comments.retain(|comment| comment.id != id);
        Ok(tables.comments.len() < before)
    }

    async fn toggle_prayed(&self, user_id: Uuid, prayer_request_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let key = (user_id, prayer_request_id);
        if tables.prayed_for.remove(&key) {
            return Ok(false);
        }
        tables.prayed_for.insert(key);
        Ok(true)
    }

    async fn list_sermons(&self, published_only: bool, limit: Option<i64>) -> StoreResult<Vec<Sermon>> {
        let tables = self.tables()?;
        let sermons: Vec<Sermon> = tables
            .sermons
            .iter()
            .filter(|sermon| !published_only || sermon.is_published)
            .cloned()
            .collect();
        Ok(take(newest_first(&sermons, |sermon| sermon.date), limit))
    }

    async fn create_sermon(&self, input: SermonInput) -> StoreResult<Sermon> {
        let mut tables = self.tables()?;
        let sermon = Sermon {
            id: Uuid::new_v4(),
            tags: input.normalized_tags(),
            title: input.title,
            description: input.description,
            speaker: input.speaker,
            video_url: input.video_url,
            audio_url: input.audio_url,
            thumbnail_url: input.thumbnail_url,
            date: input.date,
            duration: input.duration,
            is_published: input.is_published,
            created_at: Utc::now(),
        };
        tables.sermons.push(sermon.clone());
        Ok(sermon)
    }

    async fn update_sermon(&self, id: Uuid, input: SermonInput) -> StoreResult<Option<Sermon>> {
        let mut tables = self.tables()?;
        Ok(tables.sermons.iter_mut().find(|sermon| sermon.id == id).map(|sermon| {
            sermon.tags = input.normalized_tags();
            sermon.title = input.title;
            sermon.description = input.description;
            sermon.speaker = input.speaker;
            sermon.video_url = input.video_url;
            sermon.audio_url = input.audio_url;
            sermon.thumbnail_url = input.thumbnail_url;
            sermon.date = input.date;
            sermon.duration = input.duration;
            sermon.is_published = input.is_published;
            sermon.clone()
        }))
    }

    async fn delete_sermon(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.sermons.len();
        tables.sermons.retain(|sermon| sermon.id != id);
        Ok(tables.sermons.len() < before)
    }

    async fn list_events(
        &self,
        published_only: bool,
        starting_after: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Event>> {
        let tables = self.tables()?;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|event| !published_only || event.is_published)
            .filter(|event| starting_after.is_none_or(|from| event.start_date >= from))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start_date);
        Ok(take(events, limit))
    }

    async fn create_event(&self, input: EventInput) -> StoreResult<Event> {
        let mut tables = self.tables()?;
        let event = Event {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            location: input.location,
            start_date: input.start_date,
            end_date: input.end_date,
            image_url: input.image_url,
            is_published: input.is_published,
            created_at: Utc::now(),
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, input: EventInput) -> StoreResult<Option<Event>> {
        let mut tables = self.tables()?;
        Ok(tables.events.iter_mut().find(|event| event.id == id).map(|event| {
            event.title = input.title;
            event.description = input.description;
            event.location = input.location;
            event.start_date = input.start_date;
            event.end_date = input.end_date;
            event.image_url = input.image_url;
            event.is_published = input.is_published;
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.events.len();
        tables.events.retain(|event| event.id != id);
        Ok(tables.events.len() < before)
    }

    async fn get_livestream(&self) -> StoreResult<Option<LiveStream>> {
        Ok(self.tables()?.livestream.clone())
    }

    async fn upsert_livestream(&self, input: LiveStreamInput) -> StoreResult<LiveStream> {
        let mut tables = self.tables()?;
        let stream = LiveStream {
            embed_url: input.embed_url,
            title: input.title,
            description: input.description,
            schedule: input.schedule,
            is_active: input.is_active,
            updated_at: Utc::now(),
        };
        tables.livestream = Some(stream.clone());
        Ok(stream)
    }

    async fn create_donation(&self, donation: NewDonation) -> StoreResult<DonationIntent> {
        let mut tables = self.tables()?;
        let intent = DonationIntent {
            id: Uuid::new_v4(),
            amount: donation.amount,
            email: donation.email,
            name: donation.name,
            message: donation.message,
            user_id: donation.user_id,
            status: donation.status.as_str().to_string(),
            created_at: Utc::now(),
        };
        tables.donations.push(intent.clone());
        Ok(intent)
    }

    async fn list_donations(&self) -> StoreResult<Vec<DonationIntent>> {
        let tables = self.tables()?;
        Ok(newest_first(&tables.donations, |donation| donation.created_at))
    }

    async fn get_stats(&self) -> StoreResult<AdminDashboardStats> {
        let tables = self.tables()?;
        Ok(AdminDashboardStats {
            users: tables.users.len() as i64,
            sermons: tables.sermons.len() as i64,
            events: tables.events.len() as i64,
            prayer_requests: tables.prayer_requests.len() as i64,
            donations: tables.donations.len() as i64,
            total_donations: tables.donations.iter().map(|donation| donation.amount).sum(),
        })
    }
}
