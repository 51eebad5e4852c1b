//! SQLite-backed workflow store.
//!
//! Referral rows live in a single `referrals` table. List-valued columns (`counties`,
//! `service_hours_preference`) are stored as JSON text and enums as their wire strings, so the
//! table stays readable with the plain `sqlite3` shell.
//!
//! The connection is shared behind a `Mutex` and every query runs on the blocking pool.

use super::WorkflowStore;
use crate::referral::{NewReferral, ReferralRecord, ReferralStatus};
use crate::{ReferralError, ReferralResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, case_manager_id, phi_id, service_type, urgency, \
     preferred_start_date, counties, service_hours_preference, emergency_services_needed, \
     waiver_type, plan_type, status, additional_notes, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteWorkflowStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteWorkflowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWorkflowStore").finish_non_exhaustive()
    }
}

impl SqliteWorkflowStore {
    /// Opens the database at `path`, creating parent directories and running migrations.
    ///
    /// # Errors
    ///
    /// - [`ReferralError::StorageDirCreation`] if the parent directory cannot be created.
    /// - [`ReferralError::Database`] if the database cannot be opened.
    /// - [`ReferralError::MigrationFailed`] if a migration script fails.
    pub fn open(path: &Path) -> ReferralResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ReferralError::StorageDirCreation)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> ReferralResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ReferralResult<Self> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> ReferralResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ReferralResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| ReferralError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn insert(&self, new: NewReferral) -> ReferralResult<ReferralRecord> {
        new.validate()?;

        self.with_conn(move |conn| {
            let now = Utc::now();
            let counties =
                serde_json::to_string(&new.counties).map_err(ReferralError::Serialization)?;
            let hours = serde_json::to_string(&new.service_hours_preference)
                .map_err(ReferralError::Serialization)?;

            conn.execute(
                "INSERT INTO referrals (case_manager_id, phi_id, service_type, urgency, \
                 preferred_start_date, counties, service_hours_preference, \
                 emergency_services_needed, waiver_type, plan_type, status, additional_notes, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                params![
                    new.case_manager_id,
                    new.phi_id,
                    new.service_type,
                    new.urgency.as_str(),
                    new.preferred_start_date,
                    counties,
                    hours,
                    new.emergency_services_needed,
                    new.waiver_type.as_str(),
                    new.plan_type.map(|p| p.as_str()),
                    new.status.as_str(),
                    new.additional_notes,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            tracing::debug!("inserted referral {} referencing PHI {}", id, new.phi_id);

            fetch_one(conn, id)?.ok_or(ReferralError::ReferralNotFound(id))
        })
        .await
    }

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralRecord>> {
        self.with_conn(move |conn| fetch_one(conn, id)).await
    }

    async fn list_by_case_manager(
        &self,
        case_manager_id: &str,
    ) -> ReferralResult<Vec<ReferralRecord>> {
        let case_manager_id = case_manager_id.to_owned();
        self.with_conn(move |conn| {
            fetch_many(
                conn,
                "WHERE case_manager_id = ?1",
                params![case_manager_id],
            )
        })
        .await
    }

    async fn list_by_status(&self, status: ReferralStatus) -> ReferralResult<Vec<ReferralRecord>> {
        self.with_conn(move |conn| fetch_many(conn, "WHERE status = ?1", params![status.as_str()]))
            .await
    }

    async fn update_status(
        &self,
        id: i64,
        status: ReferralStatus,
    ) -> ReferralResult<Option<ReferralRecord>> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE referrals SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now(), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            fetch_one(conn, id)
        })
        .await
    }

    async fn ping(&self) -> ReferralResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Schema
// ============================================================================

fn configure_pragmas(conn: &Connection) -> ReferralResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Current schema version, 0 for a fresh database.
fn current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

fn run_migrations(conn: &Connection) -> ReferralResult<()> {
    let current = current_version(conn);

    let migrations: [(i64, &str); 1] = [(1, include_str!("../../migrations/001_referrals.sql"))];

    for (version, sql) in migrations {
        if version > current {
            tracing::info!("running workflow migration v{}", version);
            conn.execute_batch(sql)
                .map_err(|e| ReferralError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

// ============================================================================
// Row mapping
// ============================================================================

/// A `referrals` row as SQLite returns it, before enum and JSON decoding.
struct ReferralRow {
    id: i64,
    case_manager_id: String,
    phi_id: String,
    service_type: String,
    urgency: String,
    preferred_start_date: Option<NaiveDate>,
    counties: String,
    service_hours_preference: String,
    emergency_services_needed: bool,
    waiver_type: String,
    plan_type: Option<String>,
    status: String,
    additional_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReferralRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            case_manager_id: row.get(1)?,
            phi_id: row.get(2)?,
            service_type: row.get(3)?,
            urgency: row.get(4)?,
            preferred_start_date: row.get(5)?,
            counties: row.get(6)?,
            service_hours_preference: row.get(7)?,
            emergency_services_needed: row.get(8)?,
            waiver_type: row.get(9)?,
            plan_type: row.get(10)?,
            status: row.get(11)?,
            additional_notes: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

fn stored<T: std::str::FromStr>(field: &'static str, value: String) -> ReferralResult<T> {
    value
        .parse()
        .map_err(|_| ReferralError::InvalidStoredValue { field, value })
}

fn stored_json<T: serde::de::DeserializeOwned>(
    field: &'static str,
    value: String,
) -> ReferralResult<T> {
    serde_json::from_str(&value).map_err(|_| ReferralError::InvalidStoredValue { field, value })
}

impl TryFrom<ReferralRow> for ReferralRecord {
    type Error = ReferralError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(ReferralRecord {
            id: row.id,
            case_manager_id: row.case_manager_id,
            phi_id: row.phi_id,
            service_type: row.service_type,
            urgency: stored("urgency", row.urgency)?,
            preferred_start_date: row.preferred_start_date,
            counties: stored_json("counties", row.counties)?,
            service_hours_preference: stored_json(
                "service_hours_preference",
                row.service_hours_preference,
            )?,
            emergency_services_needed: row.emergency_services_needed,
            waiver_type: stored("waiver_type", row.waiver_type)?,
            plan_type: row
                .plan_type
                .map(|p| stored("plan_type", p))
                .transpose()?,
            status: stored("status", row.status)?,
            additional_notes: row.additional_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn fetch_one(conn: &Connection, id: i64) -> ReferralResult<Option<ReferralRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM referrals WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            ReferralRow::read,
        )
        .optional()?;

    row.map(ReferralRecord::try_from).transpose()
}

fn fetch_many(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> ReferralResult<Vec<ReferralRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM referrals {} ORDER BY created_at DESC, id DESC",
        SELECT_COLUMNS, filter
    ))?;

    let rows = stmt
        .query_map(params, ReferralRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(ReferralRecord::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referral::{PlanType, ServiceHours, Urgency, WaiverType};
    use tempfile::TempDir;

    fn new_referral(case_manager: &str, phi_id: &str) -> NewReferral {
        NewReferral {
            case_manager_id: case_manager.into(),
            phi_id: phi_id.into(),
            service_type: "Individualized Home Supports".into(),
            urgency: Urgency::High,
            preferred_start_date: NaiveDate::from_ymd_opt(2026, 11, 1),
            counties: vec!["Hennepin".into(), "Ramsey".into()],
            service_hours_preference: vec![ServiceHours::Weekdays, ServiceHours::Evenings],
            emergency_services_needed: true,
            waiver_type: WaiverType::Cadi,
            plan_type: Some(PlanType::Cssp),
            status: ReferralStatus::Pending,
            additional_notes: Some("prefers mornings".into()),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_round_trips_columns() {
        let store = SqliteWorkflowStore::open_in_memory().unwrap();
        let new = new_referral("user-1", "550e8400e29b41d4a716446655440000");

        let created = store.insert(new.clone()).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.counties, new.counties);
        assert_eq!(created.service_hours_preference, new.service_hours_preference);
        assert_eq!(created.plan_type, Some(PlanType::Cssp));
        assert_eq!(created.status, ReferralStatus::Pending);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_phi_reference() {
        let store = SqliteWorkflowStore::open_in_memory().unwrap();
        let result = store.insert(new_referral("user-1", "  ")).await;
        assert!(matches!(
            result,
            Err(ReferralError::InvalidField { field: "phi_id", .. })
        ));
    }

    #[tokio::test]
    async fn test_list_by_case_manager_is_newest_first() {
        let store = SqliteWorkflowStore::open_in_memory().unwrap();
        let first = store.insert(new_referral("user-1", "a")).await.unwrap();
        let second = store.insert(new_referral("user-1", "b")).await.unwrap();
        store.insert(new_referral("user-2", "c")).await.unwrap();

        let mine = store.list_by_case_manager("user-1").await.unwrap();
        let ids: Vec<i64> = mine.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_update_status_and_list_by_status() {
        let store = SqliteWorkflowStore::open_in_memory().unwrap();
        let a = store.insert(new_referral("user-1", "a")).await.unwrap();
        let b = store.insert(new_referral("user-2", "b")).await.unwrap();

        let updated = store
            .update_status(a.id, ReferralStatus::Matched)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ReferralStatus::Matched);
        assert!(updated.updated_at >= a.updated_at);

        let pending = store.list_by_status(ReferralStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        assert_eq!(
            store
                .update_status(9999, ReferralStatus::Cancelled)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows_and_skips_applied_migrations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("workflow.sqlite3");

        let id = {
            let store = SqliteWorkflowStore::open(&path).unwrap();
            store.insert(new_referral("user-1", "a")).await.unwrap().id
        };

        let store = SqliteWorkflowStore::open(&path).unwrap();
        assert!(store.get(id).await.unwrap().is_some());
        assert!(store.ping().await.is_ok());
    }

    #[test]
    fn test_schema_version_is_current() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn), 1);

        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn), 1);
    }

    #[tokio::test]
    async fn test_corrupt_stored_value_is_reported() {
        let store = SqliteWorkflowStore::open_in_memory().unwrap();
        let created = store.insert(new_referral("user-1", "a")).await.unwrap();

        store
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE referrals SET counties = 'not json' WHERE id = ?1",
                    params![created.id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        match store.get(created.id).await {
            Err(ReferralError::InvalidStoredValue { field, .. }) => assert_eq!(field, "counties"),
            other => panic!("expected InvalidStoredValue, got {:?}", other),
        }
    }
}
