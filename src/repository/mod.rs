use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{
        AccountCredentials, AdminDashboardStats, Comment, DonationIntent, Event, EventInput,
        InviteCode, LiveStream, LiveStreamInput, NewDonation, NewInvite, NewUser,
        PrayerRequest, PrayerRequestInput, PrayerWallEntry, Role, Sermon, SermonInput, User,
        UserActivity,
    },
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the handlers to
/// interact with the record store without knowing the specific implementation
/// (Postgres, in-memory).
///
/// Apart from plain reads and writes the contract has exactly two atomic conditional
/// operations, `redeem_invite` and `toggle_prayed`. Implementations must make each of
/// them a single critical section at the store level.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    // Email is matched lower-cased.
    async fn get_credentials_by_email(&self, email: &str) -> StoreResult<Option<AccountCredentials>>;
    // Fails with `UniqueViolation` when the email is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    // Newest first, optionally capped.
    async fn list_users(&self, limit: Option<i64>) -> StoreResult<Vec<User>>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>>;
    // Flips `is_active` in place and returns the updated account.
    async fn toggle_user_active(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> StoreResult<Option<User>>;
    async fn get_user_activity(&self, id: Uuid) -> StoreResult<UserActivity>;

    // --- Invite codes ---
    // Fails with `UniqueViolation` on a code collision.
    async fn create_invite(&self, invite: NewInvite) -> StoreResult<InviteCode>;
    async fn get_invite(&self, code: &str) -> StoreResult<Option<InviteCode>>;
    async fn list_invites(&self, limit: i64) -> StoreResult<Vec<InviteCode>>;

    /// redeem_invite
    ///
    /// Atomically claims an unused code, creates the account and records `used_by`.
    /// Returns `Ok(None)` when the code was already claimed (the compare-and-set lost).
    /// Any failure, including a duplicate email, leaves the code unused.
    async fn redeem_invite(
        &self,
        code: &str,
        user: NewUser,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    // --- Prayer wall ---
    // Requests visible to `viewer`: public ones plus the viewer's own, newest first.
    async fn list_prayer_wall(&self, viewer: Uuid) -> StoreResult<Vec<PrayerWallEntry>>;
    async fn list_recent_prayer_requests(&self, limit: i64) -> StoreResult<Vec<PrayerRequest>>;
    async fn get_prayer_request(&self, id: Uuid) -> StoreResult<Option<PrayerRequest>>;
    async fn create_prayer_request(
        &self,
        owner: Uuid,
        input: PrayerRequestInput,
    ) -> StoreResult<PrayerRequest>;
    async fn delete_prayer_request(&self, id: Uuid) -> StoreResult<bool>;
    // Comments of the given requests, oldest first, with author names.
    async fn list_comments(&self, prayer_request_ids: &[Uuid]) -> StoreResult<Vec<Comment>>;
    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    async fn add_comment(
        &self,
        prayer_request_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment>;
    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;

    /// toggle_prayed
    ///
    /// Removes the caller's prayed record if present, otherwise inserts it. Returns whether
    /// the record exists afterwards. Concurrent toggles never leave two records.
    async fn toggle_prayed(&self, user_id: Uuid, prayer_request_id: Uuid) -> StoreResult<bool>;

    // --- Content ---
    // Newest first by sermon date.
    async fn list_sermons(&self, published_only: bool, limit: Option<i64>) -> StoreResult<Vec<Sermon>>;
    async fn create_sermon(&self, input: SermonInput) -> StoreResult<Sermon>;
    async fn update_sermon(&self, id: Uuid, input: SermonInput) -> StoreResult<Option<Sermon>>;
    async fn delete_sermon(&self, id: Uuid) -> StoreResult<bool>;

    // Soonest first. `starting_after` keeps only events that have not started yet.
    async fn list_events(
        &self,
        published_only: bool,
        starting_after: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Event>>;
    async fn create_event(&self, input: EventInput) -> StoreResult<Event>;
    async fn update_event(&self, id: Uuid, input: EventInput) -> StoreResult<Option<Event>>;
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    async fn get_livestream(&self) -> StoreResult<Option<LiveStream>>;
    async fn upsert_livestream(&self, input: LiveStreamInput) -> StoreResult<LiveStream>;

    // --- Donations ---
    async fn create_donation(&self, donation: NewDonation) -> StoreResult<DonationIntent>;
    // Newest first.
    async fn list_donations(&self) -> StoreResult<Vec<DonationIntent>>;

    async fn get_stats(&self) -> StoreResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;
