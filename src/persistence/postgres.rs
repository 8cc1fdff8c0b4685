//! PostgreSQL implementations of the repository traits.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{REPORT_COLUMNS, ReportRow, ReportTuple};
use crate::domain::{DashboardMetrics, Report, ReportRepository, ReportStatus, UserRepository};
use crate::error::ServiceError;

fn db_error(err: sqlx::Error) -> ServiceError {
    ServiceError::Persistence(err.to_string())
}

fn to_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Connects to `url` and applies pending migrations.
///
/// # Errors
///
/// Returns [`ServiceError::Persistence`] if the connection or a migration
/// fails.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, ServiceError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(db_error)?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| ServiceError::Persistence(e.to_string()))?;
    tracing::info!(max_connections, "postgres pool ready");
    Ok(pool)
}

/// Report storage backed by the `reports` table.
#[derive(Debug, Clone)]
pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PostgresReportRepository {
    async fn create(&self, report: Report) -> Result<Report, ServiceError> {
        let row = ReportRow::from(&report);
        sqlx::query(
            "INSERT INTO reports (id, incident_type_id, incident_type_name, \
             incident_type_requires_evidence, description, latitude, longitude, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&row.id)
        .bind(&row.incident_type_id)
        .bind(&row.incident_type_name)
        .bind(row.incident_type_requires_evidence)
        .bind(&row.description)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(&row.status)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(report)
    }

    async fn find(&self, id: &str) -> Result<Report, ServiceError> {
        let row = sqlx::query_as::<_, ReportTuple>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(ServiceError::ReportNotFound)?;
        Report::try_from(ReportRow::from(row))
    }

    async fn list(
        &self,
        page: usize,
        page_size: usize,
        status: Option<ReportStatus>,
    ) -> Result<(Vec<Report>, usize), ServiceError> {
        let status = status.map(ReportStatus::as_str);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let rows = sqlx::query_as::<_, ReportTuple>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(to_i64(page_size))
        .bind(to_i64(page.saturating_mul(page_size)))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let items = rows
            .into_iter()
            .map(|row| Report::try_from(ReportRow::from(row)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, to_count(total)))
    }

    async fn update_status(&self, id: &str, status: ReportStatus) -> Result<Report, ServiceError> {
        let row = sqlx::query_as::<_, ReportTuple>(&format!(
            "UPDATE reports SET status = $1 WHERE id = $2 RETURNING {REPORT_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(ServiceError::ReportNotFound)?;
        Report::try_from(ReportRow::from(row))
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::ReportNotFound);
        }
        Ok(())
    }

    async fn metrics(&self) -> Result<DashboardMetrics, ServiceError> {
        let (pending, resolved, critical) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT \
               COUNT(*) FILTER (WHERE status = 'en_revision'), \
               COUNT(*) FILTER (WHERE status = 'resuelto'), \
               COUNT(*) FILTER (WHERE status = 'critico') \
             FROM reports",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(DashboardMetrics {
            pending_reports: to_count(pending),
            resolved_reports: to_count(resolved),
            critical_incidents: to_count(critical),
        })
    }
}

/// Credential storage backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn password_hash(&self, email: &str) -> Result<Option<String>, ServiceError> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::EmailConflict);
        }
        Ok(())
    }
}
