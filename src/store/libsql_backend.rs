//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::config::{OnboardingConfig, StoredConfig};
use crate::onboarding::model::{Address, UserAccount};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn current_config(&self) -> Result<Option<StoredConfig>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONFIG_COLUMNS} FROM onboarding_config WHERE id = 1"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_config: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_config(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_config row: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn page_from_column(value: i64, column: &str) -> Result<u8, DatabaseError> {
    u8::try_from(value)
        .map_err(|_| DatabaseError::Serialization(format!("{column} out of range: {value}")))
}

/// Map write failures, keeping constraint violations distinguishable.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

const CONFIG_COLUMNS: &str = "about_me_page, address_page, birthdate_page, version, updated_at";

/// Column order matches CONFIG_COLUMNS.
fn row_to_config(row: &libsql::Row) -> Result<StoredConfig, DatabaseError> {
    let get = |idx: i32| {
        row.get::<i64>(idx)
            .map_err(|e| DatabaseError::Query(format!("config row parse: {e}")))
    };
    let updated_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("config row parse: {e}")))?;

    Ok(StoredConfig {
        config: OnboardingConfig {
            about_me_page: page_from_column(get(0)?, "about_me_page")?,
            address_page: page_from_column(get(1)?, "address_page")?,
            birthdate_page: page_from_column(get(2)?, "birthdate_page")?,
        },
        version: get(3)?,
        updated_at: parse_datetime(&updated_str),
    })
}

const USER_COLUMNS: &str = "id, email, password_hash, onboarding_step, onboarding_complete, about_me, street, city, state, zip, birthdate, created_at, updated_at, revision";

/// Map a libsql Row to a UserAccount.
///
/// Column order matches USER_COLUMNS. The address is present only when all
/// four of its columns are set.
fn row_to_user(row: &libsql::Row) -> Result<UserAccount, DatabaseError> {
    let parse_err = |e: libsql::Error| DatabaseError::Query(format!("user row parse: {e}"));

    let id_str: String = row.get(0).map_err(parse_err)?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("invalid user id {id_str}: {e}")))?;
    let step: i64 = row.get(3).map_err(parse_err)?;
    let complete: i64 = row.get(4).map_err(parse_err)?;

    let street: Option<String> = row.get(6).ok();
    let city: Option<String> = row.get(7).ok();
    let state: Option<String> = row.get(8).ok();
    let zip: Option<String> = row.get(9).ok();
    let address = match (street, city, state, zip) {
        (Some(street), Some(city), Some(state), Some(zip)) => Some(Address {
            street,
            city,
            state,
            zip,
        }),
        _ => None,
    };

    let birthdate_str: Option<String> = row.get(10).ok();
    let created_str: String = row.get(11).map_err(parse_err)?;
    let updated_str: String = row.get(12).map_err(parse_err)?;
    let revision: i64 = row.get(13).map_err(parse_err)?;

    Ok(UserAccount {
        id,
        email: row.get(1).map_err(parse_err)?,
        password_hash: row.get(2).map_err(parse_err)?,
        onboarding_step: page_from_column(step, "onboarding_step")?,
        onboarding_complete: complete != 0,
        about_me: row.get(5).ok(),
        address,
        birthdate: birthdate_str
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
        revision,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Onboarding config ───────────────────────────────────────────

    async fn get_or_create_config(
        &self,
        default: &OnboardingConfig,
    ) -> Result<StoredConfig, DatabaseError> {
        let created = self
            .conn()
            .execute(
                "INSERT INTO onboarding_config (id, about_me_page, address_page, birthdate_page, version, updated_at)
                 VALUES (1, ?1, ?2, ?3, 1, ?4)
                 ON CONFLICT (id) DO NOTHING",
                params![
                    i64::from(default.about_me_page),
                    i64::from(default.address_page),
                    i64::from(default.birthdate_page),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("create_default_config", e))?;

        if created > 0 {
            info!(config = ?default, "Created default onboarding config");
        }

        self.current_config()
            .await?
            .ok_or_else(|| DatabaseError::Query("onboarding config missing after insert".into()))
    }

    async fn put_config(
        &self,
        config: &OnboardingConfig,
        expected_version: Option<i64>,
    ) -> Result<Option<StoredConfig>, DatabaseError> {
        let expected = match expected_version {
            Some(v) => libsql::Value::Integer(v),
            None => libsql::Value::Null,
        };

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO onboarding_config (id, about_me_page, address_page, birthdate_page, version, updated_at)
                     VALUES (1, ?1, ?2, ?3, 1, ?4)
                     ON CONFLICT (id) DO UPDATE SET
                        about_me_page = excluded.about_me_page,
                        address_page = excluded.address_page,
                        birthdate_page = excluded.birthdate_page,
                        version = onboarding_config.version + 1,
                        updated_at = excluded.updated_at
                     WHERE ?5 IS NULL OR onboarding_config.version = ?5
                     RETURNING {CONFIG_COLUMNS}"
                ),
                params![
                    i64::from(config.about_me_page),
                    i64::from(config.address_page),
                    i64::from(config.birthdate_page),
                    Utc::now().to_rfc3339(),
                    expected,
                ],
            )
            .await
            .map_err(|e| write_error("put_config", e))?;

        let stored = match rows.next().await {
            Ok(Some(row)) => Some(row_to_config(&row)?),
            Ok(None) => None,
            Err(e) => return Err(write_error("put_config", e)),
        };

        match &stored {
            Some(s) => debug!(version = s.version, "Onboarding config written"),
            None => debug!(?expected_version, "Onboarding config write skipped on version mismatch"),
        }
        Ok(stored)
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn create_user(&self, user: &UserAccount) -> Result<(), DatabaseError> {
        let address = user.address.as_ref();
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    user.id.to_string(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    i64::from(user.onboarding_step),
                    user.onboarding_complete as i64,
                    user.about_me.as_deref(),
                    address.map(|a| a.street.as_str()),
                    address.map(|a| a.city.as_str()),
                    address.map(|a| a.state.as_str()),
                    address.map(|a| a.zip.as_str()),
                    format_date(user.birthdate),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                    user.revision,
                ],
            )
            .await
            .map_err(|e| write_error("create_user", e))?;

        debug!(user_id = %user.id, "User inserted into DB");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user row: {e}"))),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_by_email row: {e}"))),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?;

        let mut users = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users row: {e}")))?
        {
            users.push(row_to_user(&row)?);
        }
        Ok(users)
    }

    async fn update_user(
        &self,
        user: &UserAccount,
        expected_revision: i64,
    ) -> Result<bool, DatabaseError> {
        let address = user.address.as_ref();
        let count = self
            .conn()
            .execute(
                "UPDATE users SET
                    email = ?1, password_hash = ?2, onboarding_step = ?3, onboarding_complete = ?4,
                    about_me = ?5, street = ?6, city = ?7, state = ?8, zip = ?9,
                    birthdate = ?10, updated_at = ?11, revision = revision + 1
                 WHERE id = ?12 AND revision = ?13",
                params![
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    i64::from(user.onboarding_step),
                    user.onboarding_complete as i64,
                    user.about_me.as_deref(),
                    address.map(|a| a.street.as_str()),
                    address.map(|a| a.city.as_str()),
                    address.map(|a| a.state.as_str()),
                    address.map(|a| a.zip.as_str()),
                    format_date(user.birthdate),
                    user.updated_at.to_rfc3339(),
                    user.id.to_string(),
                    expected_revision,
                ],
            )
            .await
            .map_err(|e| write_error("update_user", e))?;

        debug!(
            user_id = %user.id,
            step = user.onboarding_step,
            expected_revision,
            updated = count > 0,
            "User update"
        );
        Ok(count > 0)
    }

    async fn delete_all_users(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM users", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_all_users: {e}")))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_user(email: &str) -> UserAccount {
        UserAccount::new(email, "$2b$04$hash")
    }

    // ── Config tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn first_read_creates_default() {
        let db = test_db().await;
        let stored = db
            .get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        assert_eq!(stored.config, OnboardingConfig::default());
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn repeated_reads_keep_single_record() {
        let db = test_db().await;
        let default = OnboardingConfig::default();
        let first = db.get_or_create_config(&default).await.unwrap();
        let second = db.get_or_create_config(&default).await.unwrap();
        assert_eq!(first, second);

        let mut rows = db
            .conn()
            .query("SELECT COUNT(*) FROM onboarding_config", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn concurrent_first_reads_agree() {
        let db = Arc::new(test_db().await);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                db.get_or_create_config(&OnboardingConfig::default())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            let stored = handle.await.unwrap();
            assert_eq!(stored.version, 1);
        }
    }

    #[tokio::test]
    async fn put_then_read_roundtrip() {
        let db = test_db().await;
        let config = OnboardingConfig {
            about_me_page: 3,
            address_page: 2,
            birthdate_page: 3,
        };
        let written = db.put_config(&config, None).await.unwrap().unwrap();
        assert_eq!(written.config, config);

        let read = db
            .get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        assert_eq!(read.config, config);
        assert_eq!(read.version, written.version);
    }

    #[tokio::test]
    async fn put_increments_version() {
        let db = test_db().await;
        db.get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        let config = OnboardingConfig {
            about_me_page: 2,
            address_page: 3,
            birthdate_page: 3,
        };
        let written = db.put_config(&config, None).await.unwrap().unwrap();
        assert_eq!(written.version, 2);
    }

    #[tokio::test]
    async fn put_with_stale_version_is_skipped() {
        let db = test_db().await;
        db.get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        let config = OnboardingConfig {
            about_me_page: 3,
            address_page: 3,
            birthdate_page: 2,
        };
        assert!(db.put_config(&config, Some(5)).await.unwrap().is_none());

        let read = db
            .get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        assert_eq!(read.config, OnboardingConfig::default());

        let written = db.put_config(&config, Some(1)).await.unwrap().unwrap();
        assert_eq!(written.config, config);
        assert_eq!(written.version, 2);
    }

    #[tokio::test]
    async fn put_invalid_config_hits_check_constraint() {
        let db = test_db().await;
        db.get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        let invalid = OnboardingConfig {
            about_me_page: 2,
            address_page: 2,
            birthdate_page: 2,
        };
        let err = db.put_config(&invalid, None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "{err:?}");

        let read = db
            .get_or_create_config(&OnboardingConfig::default())
            .await
            .unwrap();
        assert_eq!(read.config, OnboardingConfig::default());
    }

    // ── User tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_get_user() {
        let db = test_db().await;
        let user = make_user("alice@example.com");
        db.create_user(&user).await.unwrap();

        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.onboarding_step, 1);
        assert!(!fetched.onboarding_complete);
        assert!(fetched.address.is_none());
        assert!(fetched.birthdate.is_none());
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let db = test_db().await;
        assert!(db.get_user(Uuid::new_v4()).await.unwrap().is_none());
        assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_constraint_error() {
        let db = test_db().await;
        db.create_user(&make_user("dup@example.com")).await.unwrap();
        let err = db.create_user(&make_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "{err:?}");
    }

    #[tokio::test]
    async fn update_persists_sections() {
        let db = test_db().await;
        let mut user = make_user("bob@example.com");
        db.create_user(&user).await.unwrap();

        user.onboarding_step = 2;
        user.about_me = Some("hello".into());
        user.address = Some(Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62701".into(),
        });
        user.birthdate = NaiveDate::from_ymd_opt(1990, 1, 15);
        assert!(db.update_user(&user, 0).await.unwrap());

        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.revision, 1);
        assert_eq!(fetched.onboarding_step, 2);
        assert_eq!(fetched.about_me.as_deref(), Some("hello"));
        assert_eq!(fetched.address, user.address);
        assert_eq!(fetched.birthdate, user.birthdate);
    }

    #[tokio::test]
    async fn update_with_stale_revision_is_skipped() {
        let db = test_db().await;
        let mut user = make_user("carol@example.com");
        db.create_user(&user).await.unwrap();

        user.onboarding_step = 3;
        assert!(!db.update_user(&user, 5).await.unwrap());
        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.onboarding_step, 1);
        assert_eq!(fetched.revision, 0);
    }

    #[tokio::test]
    async fn second_write_from_same_snapshot_misses() {
        let db = test_db().await;
        let mut user = make_user("dave@example.com");
        user.onboarding_step = 3;
        db.create_user(&user).await.unwrap();
        let snapshot = db.get_user(user.id).await.unwrap().unwrap();

        let mut completed = snapshot.clone();
        completed.onboarding_complete = true;
        completed.birthdate = NaiveDate::from_ymd_opt(1990, 1, 15);
        assert!(db.update_user(&completed, snapshot.revision).await.unwrap());

        // Same step, same complete flag as the snapshot; only the revision moved.
        let mut late = snapshot.clone();
        late.about_me = Some("late".into());
        assert!(!db.update_user(&late, snapshot.revision).await.unwrap());

        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert!(fetched.onboarding_complete);
        assert!(fetched.about_me.is_none());
        assert_eq!(fetched.birthdate, completed.birthdate);
    }

    #[tokio::test]
    async fn list_users_newest_first() {
        let db = test_db().await;
        let first = make_user("first@example.com");
        db.create_user(&first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = make_user("second@example.com");
        db.create_user(&second).await.unwrap();

        let users = db.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, second.id);
        assert_eq!(users[1].id, first.id);
    }

    #[tokio::test]
    async fn delete_all_users_reports_count() {
        let db = test_db().await;
        db.create_user(&make_user("a@example.com")).await.unwrap();
        db.create_user(&make_user("b@example.com")).await.unwrap();

        assert_eq!(db.delete_all_users().await.unwrap(), 2);
        assert!(db.list_users().await.unwrap().is_empty());
        assert_eq!(db.delete_all_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn on_disk_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("onboarding.db");
        let user = make_user("disk@example.com");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_user(&user).await.unwrap();
        }
        assert!(path.exists());

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "disk@example.com");
    }
}
