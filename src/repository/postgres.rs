use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
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

const USER_COLUMNS: &str = "id, name, email, role, is_active, created_at";
const INVITE_COLUMNS: &str =
    "id, code, email, created_by, expires_at, used_at, used_by, created_at";
const PRAYER_COLUMNS: &str = "id, user_id, title, content, is_anonymous, is_public, created_at";
const SERMON_COLUMNS: &str = "id, title, description, speaker, video_url, audio_url, thumbnail_url, date, duration, tags, is_published, created_at";
const EVENT_COLUMNS: &str =
    "id, title, description, location, start_date, end_date, image_url, is_published, created_at";
const LIVESTREAM_COLUMNS: &str = "embed_url, title, description, schedule, is_active, updated_at";
const DONATION_COLUMNS: &str =
    "id, amount, email, name, message, user_id, status, created_at";

const EMAIL_TAKEN: &str = "A user with this email already exists";
const CODE_TAKEN: &str = "Invite code already exists";

/// Maps a unique-constraint failure (SQLSTATE 23505) to the given user-facing message.
fn unique_or_database(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(message.to_string());
        }
    }
    StoreError::Database(err)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
/// All queries are runtime-checked (`query_as::<_, T>`) so the crate builds without a
/// live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str, id: Option<Uuid>) -> StoreResult<i64> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- ACCOUNTS ---

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_credentials_by_email(&self, email: &str) -> StoreResult<Option<AccountCredentials>> {
        Ok(sqlx::query_as::<_, AccountCredentials>(
            "SELECT id, password_hash, is_active FROM users WHERE email = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?)
    }

    /// create_user
    ///
    /// New accounts always start as active members; the role is only ever raised by an admin.
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role, is_active) \
             VALUES ($1, $2, lower($3), $4, $5, true) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(user.email.trim())
            .bind(&user.password_hash)
            .bind(Role::User)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_or_database(e, EMAIL_TAKEN))
    }

    async fn list_users(&self, limit: Option<i64>) -> StoreResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"));
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        Ok(builder.build_query_as::<User>().fetch_all(&self.pool).await?)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn toggle_user_active(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_active = NOT is_active WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> StoreResult<Option<User>> {
        let sql = format!("UPDATE users SET name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_activity(&self, id: Uuid) -> StoreResult<UserActivity> {
        Ok(UserActivity {
            prayer_requests: self
                .count("SELECT COUNT(*) FROM prayer_requests WHERE user_id = $1", Some(id))
                .await?,
            comments: self
                .count("SELECT COUNT(*) FROM comments WHERE user_id = $1", Some(id))
                .await?,
            prayed_for: self
                .count("SELECT COUNT(*) FROM prayed_for WHERE user_id = $1", Some(id))
                .await?,
        })
    }

    // --- INVITE CODES ---

    async fn create_invite(&self, invite: NewInvite) -> StoreResult<InviteCode> {
        let sql = format!(
            "INSERT INTO invite_codes (id, code, email, created_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {INVITE_COLUMNS}"
        );
        sqlx::query_as::<_, InviteCode>(&sql)
            .bind(Uuid::new_v4())
            .bind(&invite.code)
            .bind(&invite.email)
            .bind(invite.created_by)
            .bind(invite.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_or_database(e, CODE_TAKEN))
    }

    async fn get_invite(&self, code: &str) -> StoreResult<Option<InviteCode>> {
        let sql = format!("SELECT {INVITE_COLUMNS} FROM invite_codes WHERE code = $1");
        Ok(sqlx::query_as::<_, InviteCode>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_invites(&self, limit: i64) -> StoreResult<Vec<InviteCode>> {
        let sql = format!(
            "SELECT {INVITE_COLUMNS} FROM invite_codes ORDER BY created_at DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, InviteCode>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// redeem_invite
    ///
    /// One transaction: claim the code with a conditional update, create the account, then
    /// record who used it. An early return drops the transaction, which rolls it back.
    async fn redeem_invite(
        &self,
        code: &str,
        user: NewUser,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE invite_codes SET used_at = $2 WHERE code = $1 AND used_at IS NULL",
        )
        .bind(code)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role, is_active) \
             VALUES ($1, $2, lower($3), $4, $5, true) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(user.email.trim())
            .bind(&user.password_hash)
            .bind(Role::User)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| unique_or_database(e, EMAIL_TAKEN))?;

        sqlx::query("UPDATE invite_codes SET used_by = $2 WHERE code = $1")
            .bind(code)
            .bind(created.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(created))
    }

    // --- PRAYER WALL ---

    /// list_prayer_wall
    ///
    /// Enforces the visibility rule in SQL: public requests plus the viewer's own.
    /// Author names of anonymous requests never leave the database.
    async fn list_prayer_wall(&self, viewer: Uuid) -> StoreResult<Vec<PrayerWallEntry>> {
        Ok(sqlx::query_as::<_, PrayerWallEntry>(
            r#"
            SELECT
                p.id, p.title, p.content, p.is_anonymous, p.is_public, p.created_at,
                CASE WHEN p.is_anonymous THEN NULL ELSE u.name END AS author_name,
                (SELECT COUNT(*) FROM prayed_for pf WHERE pf.prayer_request_id = p.id) AS prayed_count,
                EXISTS (
                    SELECT 1 FROM prayed_for pf
                    WHERE pf.prayer_request_id = p.id AND pf.user_id = $1
                ) AS prayed_by_me,
                (p.user_id = $1) AS is_mine
            FROM prayer_requests p
            JOIN users u ON u.id = p.user_id
            WHERE p.is_public = true OR p.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_recent_prayer_requests(&self, limit: i64) -> StoreResult<Vec<PrayerRequest>> {
        let sql = format!(
            "SELECT {PRAYER_COLUMNS} FROM prayer_requests ORDER BY created_at DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, PrayerRequest>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_prayer_request(&self, id: Uuid) -> StoreResult<Option<PrayerRequest>> {
        let sql = format!("SELECT {PRAYER_COLUMNS} FROM prayer_requests WHERE id = $1");
        Ok(sqlx::query_as::<_, PrayerRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_prayer_request(
        &self,
        owner: Uuid,
        input: PrayerRequestInput,
    ) -> StoreResult<PrayerRequest> {
        let sql = format!(
            "INSERT INTO prayer_requests (id, user_id, title, content, is_anonymous, is_public) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRAYER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, PrayerRequest>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.is_anonymous)
            .bind(input.is_public)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_prayer_request(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM prayer_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, prayer_request_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        if prayer_request_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.prayer_request_id, c.user_id, c.content, c.created_at, u.name AS author_name
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.prayer_request_id = ANY($1)
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(prayer_request_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.prayer_request_id, c.user_id, c.content, c.created_at, u.name AS author_name
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// add_comment
    ///
    /// Inserts the comment and joins the author's name in the same statement.
    async fn add_comment(
        &self,
        prayer_request_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> StoreResult<Comment> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (id, prayer_request_id, user_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id, prayer_request_id, user_id, content, created_at
            )
            SELECT i.id, i.prayer_request_id, i.user_id, i.content, i.created_at, u.name AS author_name
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(prayer_request_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// toggle_prayed
    ///
    /// Delete first; only when nothing was deleted insert with `ON CONFLICT DO NOTHING`.
    /// The composite primary key guarantees a single record per pair even when two
    /// toggles race through the insert branch together.
    async fn toggle_prayed(&self, user_id: Uuid, prayer_request_id: Uuid) -> StoreResult<bool> {
        let removed =
            sqlx::query("DELETE FROM prayed_for WHERE user_id = $1 AND prayer_request_id = $2")
                .bind(user_id)
                .bind(prayer_request_id)
                .execute(&self.pool)
                .await?;
        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO prayed_for (user_id, prayer_request_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(prayer_request_id)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    // --- CONTENT ---

    async fn list_sermons(&self, published_only: bool, limit: Option<i64>) -> StoreResult<Vec<Sermon>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SERMON_COLUMNS} FROM sermons"));
        if published_only {
            builder.push(" WHERE is_published = true");
        }
        builder.push(" ORDER BY date DESC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        Ok(builder.build_query_as::<Sermon>().fetch_all(&self.pool).await?)
    }

    async fn create_sermon(&self, input: SermonInput) -> StoreResult<Sermon> {
        let sql = format!(
            "INSERT INTO sermons (id, title, description, speaker, video_url, audio_url, \
             thumbnail_url, date, duration, tags, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {SERMON_COLUMNS}"
        );
        let tags = input.normalized_tags();
        Ok(sqlx::query_as::<_, Sermon>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.speaker)
            .bind(&input.video_url)
            .bind(&input.audio_url)
            .bind(&input.thumbnail_url)
            .bind(input.date)
            .bind(&input.duration)
            .bind(tags)
            .bind(input.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_sermon(&self, id: Uuid, input: SermonInput) -> StoreResult<Option<Sermon>> {
        let sql = format!(
            "UPDATE sermons SET title = $2, description = $3, speaker = $4, video_url = $5, \
             audio_url = $6, thumbnail_url = $7, date = $8, duration = $9, tags = $10, \
             is_published = $11 WHERE id = $1 RETURNING {SERMON_COLUMNS}"
        );
        let tags = input.normalized_tags();
        Ok(sqlx::query_as::<_, Sermon>(&sql)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.speaker)
            .bind(&input.video_url)
            .bind(&input.audio_url)
            .bind(&input.thumbnail_url)
            .bind(input.date)
            .bind(&input.duration)
            .bind(tags)
            .bind(input.is_published)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_sermon(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sermons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_events(
        &self,
        published_only: bool,
        starting_after: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Event>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE true"));
        if published_only {
            builder.push(" AND is_published = true");
        }
        if let Some(from) = starting_after {
            builder.push(" AND start_date >= ");
            builder.push_bind(from);
        }
        builder.push(" ORDER BY start_date ASC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        Ok(builder.build_query_as::<Event>().fetch_all(&self.pool).await?)
    }

    async fn create_event(&self, input: EventInput) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events (id, title, description, location, start_date, end_date, \
             image_url, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(&input.image_url)
            .bind(input.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_event(&self, id: Uuid, input: EventInput) -> StoreResult<Option<Event>> {
        let sql = format!(
            "UPDATE events SET title = $2, description = $3, location = $4, start_date = $5, \
             end_date = $6, image_url = $7, is_published = $8 WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(&input.image_url)
            .bind(input.is_published)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_livestream(&self) -> StoreResult<Option<LiveStream>> {
        let sql = format!("SELECT {LIVESTREAM_COLUMNS} FROM live_stream WHERE id = 1");
        Ok(sqlx::query_as::<_, LiveStream>(&sql)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// upsert_livestream
    ///
    /// The table holds a single row (id = 1); the first save creates it, later saves replace it.
    async fn upsert_livestream(&self, input: LiveStreamInput) -> StoreResult<LiveStream> {
        let sql = format!(
            "INSERT INTO live_stream (id, embed_url, title, description, schedule, is_active, updated_at) \
             VALUES (1, $1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (id) DO UPDATE SET embed_url = EXCLUDED.embed_url, title = EXCLUDED.title, \
             description = EXCLUDED.description, schedule = EXCLUDED.schedule, \
             is_active = EXCLUDED.is_active, updated_at = NOW() \
             RETURNING {LIVESTREAM_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, LiveStream>(&sql)
            .bind(&input.embed_url)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.schedule)
            .bind(input.is_active)
            .fetch_one(&self.pool)
            .await?)
    }

    // --- DONATIONS ---

    async fn create_donation(&self, donation: NewDonation) -> StoreResult<DonationIntent> {
        let sql = format!(
            "INSERT INTO donation_intents (id, amount, email, name, message, user_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {DONATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, DonationIntent>(&sql)
            .bind(Uuid::new_v4())
            .bind(donation.amount)
            .bind(&donation.email)
            .bind(&donation.name)
            .bind(&donation.message)
            .bind(donation.user_id)
            .bind(donation.status.as_str())
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_donations(&self) -> StoreResult<Vec<DonationIntent>> {
        let sql = format!("SELECT {DONATION_COLUMNS} FROM donation_intents ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, DonationIntent>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// get_stats
    ///
    /// Compiles all necessary counters for the administrative dashboard in a single call.
    async fn get_stats(&self) -> StoreResult<AdminDashboardStats> {
        let total_donations = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION FROM donation_intents",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            users: self.count("SELECT COUNT(*) FROM users", None).await?,
            sermons: self.count("SELECT COUNT(*) FROM sermons", None).await?,
            events: self.count("SELECT COUNT(*) FROM events", None).await?,
            prayer_requests: self.count("SELECT COUNT(*) FROM prayer_requests", None).await?,
            donations: self.count("SELECT COUNT(*) FROM donation_intents", None).await?,
            total_donations,
        })
    }
}
