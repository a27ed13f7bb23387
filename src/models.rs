use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field stored on every account. Maps to the Postgres enum `user_role`
/// and is serialized in upper case ("USER" | "ADMIN") for API compatibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

/// User
///
/// The canonical account record from the `users` table. The password hash lives in
/// the same row but is only ever read through `AccountCredentials`, so it can never
/// leak through serialization of this struct.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Always stored lower-cased; unique across accounts.
    pub email: String,
    pub role: Role,
    // Disabled accounts cannot sign in and their sessions resolve as anonymous.
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Internal payload for account creation. The password has already been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// AccountCredentials
///
/// The minimal projection needed by the sign-in flow.
#[derive(Debug, Clone, FromRow)]
pub struct AccountCredentials {
    pub id: Uuid,
    pub password_hash: String,
    pub is_active: bool,
}

/// InviteCode
///
/// A single-use registration token from the `invite_codes` table.
/// `used_at` and `used_by` are set together, exactly once, in the same transaction
/// that creates the account the code authorized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct InviteCode {
    pub id: Uuid,
    pub code: String,
    /// When present, only this address may redeem the code.
    pub email: Option<String>,
    pub created_by: Uuid,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl InviteCode {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub code: String,
    pub email: Option<String>,
    pub created_by: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// PrayerRequest
///
/// A request posted on the prayer wall. `is_public = false` restricts it to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PrayerRequest {
    pub id: Uuid,
    // FK to users.id (Owner).
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub is_anonymous: bool,
    pub is_public: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A comment on a prayer request, augmented with the author's display name (a join).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub prayer_request_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded via a JOIN in the repository query.
    #[sqlx(default)]
    pub author_name: Option<String>,
}

/// PrayerWallEntry
///
/// One row of the prayer wall as seen by a specific viewer. The owner id is not
/// exposed; `is_mine` tells the client whether the viewer may delete the entry, and
/// `author_name` is withheld for anonymous requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PrayerWallEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub is_anonymous: bool,
    pub is_public: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author_name: Option<String>,
    pub prayed_count: i64,
    pub prayed_by_me: bool,
    pub is_mine: bool,
    // Filled in by the handler from a second query.
    #[sqlx(skip)]
    pub comments: Vec<Comment>,
}

/// Sermon
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Sermon {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub speaker: Option<String>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub duration: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Event
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub end_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// LiveStream
///
/// The single live stream configuration (the `live_stream` table holds one row).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LiveStream {
    pub embed_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// DonationStatus
///
/// Payment settlement is not implemented, so `Pending` is the only reachable state.
/// The column itself is an opaque string, leaving room for settlement states later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
        }
    }
}

/// DonationIntent
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct DonationIntent {
    pub id: Uuid,
    pub amount: f64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub message: Option<String>,
    // Anonymous donors have no account reference.
    pub user_id: Option<Uuid>,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub amount: f64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub message: Option<String>,
    pub user_id: Option<Uuid>,
    pub status: DonationStatus,
}

// --- Request Payloads (Input Schemas) ---

fn default_true() -> bool {
    true
}

/// Form clients submit blank inputs as "", which means "not provided".
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// SignUpRequest
///
/// Input payload for POST /api/auth/signup. `invite_code` is only consulted when
/// invite-only mode is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SignUpRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub invite_code: Option<String>,
}

/// SignInRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// SessionResponse
///
/// Returned by sign-in. The same token is also set as the `session_token` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// PrayerRequestInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct PrayerRequestInput {
    #[validate(length(min = 3, max = 100, message = "Title must be between 3 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 2000, message = "Content must be between 10 and 2000 characters"))]
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

/// CommentInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 500, message = "Comment must be between 1 and 500 characters"))]
    pub content: String,
}

/// PrayedResponse
///
/// The viewer's prayed status for a request after a toggle.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PrayedResponse {
    pub prayed: bool,
}

/// SermonInput
///
/// Create/replace payload for sermons. Empty URL fields are treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SermonInput {
    #[validate(length(min = 3, message = "Title must be at least 3 characters"))]
    pub title: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub speaker: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid video URL"))]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid audio URL"))]
    pub audio_url: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid thumbnail URL"))]
    pub thumbnail_url: Option<String>,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl SermonInput {
    /// Trims tags and drops blank ones, mirroring the comma-separated form input.
    pub fn normalized_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// EventInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct EventInput {
    #[validate(length(min = 3, message = "Title must be at least 3 characters"))]
    pub title: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub location: Option<String>,
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

/// LiveStreamInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LiveStreamInput {
    #[validate(url(message = "Invalid embed URL"))]
    pub embed_url: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub schedule: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// DonationInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct DonationInput {
    #[validate(range(min = 1.0, message = "Minimum donation is $1"))]
    pub amount: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
}

/// ProfileInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct ProfileInput {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
}

/// RoleChangeRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleChangeRequest {
    pub role: Role,
}

/// InviteRequest
///
/// Optional email binding for a new invite code.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct InviteRequest {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// ActionOk
///
/// Generic success body for mutations that return no record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ActionOk {
    pub success: bool,
}

impl ActionOk {
    pub fn new() -> Self {
        Self { success: true }
    }
}

impl Default for ActionOk {
    fn default() -> Self {
        Self::new()
    }
}

// --- Page View Schemas (Output) ---

/// HomeView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct HomeView {
    pub livestream: Option<LiveStream>,
    pub upcoming_events: Vec<Event>,
    pub latest_sermons: Vec<Sermon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInPageView {
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignUpPageView {
    pub invite_only: bool,
}

/// UserActivity
///
/// Per-account counters shown on the profile page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserActivity {
    pub prayer_requests: i64,
    pub comments: i64,
    pub prayed_for: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileView {
    pub user: User,
    pub activity: UserActivity,
}

/// AdminDashboardStats
///
/// Output schema for the administrative overview (GET /admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub users: i64,
    pub sermons: i64,
    pub events: i64,
    pub prayer_requests: i64,
    pub donations: i64,
    pub total_donations: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardView {
    pub stats: AdminDashboardStats,
    pub recent_users: Vec<User>,
    pub recent_prayer_requests: Vec<PrayerRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminUsersView {
    pub users: Vec<User>,
    pub invite_codes: Vec<InviteCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDonationsView {
    pub donations: Vec<DonationIntent>,
    pub count: i64,
    pub total_amount: f64,
    pub average_amount: f64,
}
