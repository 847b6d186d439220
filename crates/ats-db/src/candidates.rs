//! PostgreSQL implementation of CandidateRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use ats_core::{
    Candidate, CandidateFilter, CandidatePatch, CandidatePredicate, CandidateRepository, CvBlob,
    Error, ListOrder, Page, Result, UniqueField,
};

use crate::escape_like;

/// Primary key constraint on `candidate.document`.
pub const DOCUMENT_CONSTRAINT: &str = "candidate_pkey";

/// Unique constraint on `candidate.email`.
pub const EMAIL_CONSTRAINT: &str = "candidate_email_key";

const COLUMNS: &str = "document, first_name, last_name, email, phone, address, education, \
                       experience, cv, cv_filename, created_at, updated_at";

/// Shared WHERE clause for listing filters; binds start at `$1`.
const FILTER_CLAUSE: &str = r#"
    ($1::TEXT IS NULL OR first_name ILIKE $1 ESCAPE '\')
    AND ($2::TEXT IS NULL OR last_name ILIKE $2 ESCAPE '\')
    AND ($3::TEXT IS NULL OR email ILIKE $3 ESCAPE '\')
"#;

#[derive(Clone)]
pub struct PgCandidateRepository {
    pool: Pool<Postgres>,
}

impl PgCandidateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Delete every candidate. Returns the number of rows removed.
    pub async fn purge(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM candidate")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "candidates",
            op = "purge",
            rows = result.rows_affected(),
            "Purged candidates"
        );
        Ok(result.rows_affected())
    }

    fn parse_row(row: &PgRow) -> Result<Candidate> {
        let cv: Option<Vec<u8>> = row.try_get("cv").map_err(Error::Database)?;
        Ok(Candidate {
            document: row.try_get("document").map_err(Error::Database)?,
            first_name: row.try_get("first_name").map_err(Error::Database)?,
            last_name: row.try_get("last_name").map_err(Error::Database)?,
            email: row.try_get("email").map_err(Error::Database)?,
            phone: row.try_get("phone").map_err(Error::Database)?,
            address: row.try_get("address").map_err(Error::Database)?,
            education: row.try_get("education").map_err(Error::Database)?,
            experience: row.try_get("experience").map_err(Error::Database)?,
            cv: cv.map(CvBlob::new),
            cv_filename: row.try_get("cv_filename").map_err(Error::Database)?,
            created_at: row.try_get("created_at").map_err(Error::Database)?,
            updated_at: row.try_get("updated_at").map_err(Error::Database)?,
        })
    }
}

/// Turn a filter value into an escaped `%...%` ILIKE pattern.
fn like_pattern(value: &Option<String>) -> Option<String> {
    value.as_deref().map(|v| format!("%{}%", escape_like(v)))
}

/// Map a write error, recognising unique violations by constraint name.
pub fn map_write_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(DOCUMENT_CONSTRAINT) => return Error::UniqueViolation(UniqueField::Document),
                Some(EMAIL_CONSTRAINT) => return Error::UniqueViolation(UniqueField::Email),
                _ => {}
            }
        }
    }
    Error::Database(err)
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn insert(&self, candidate: Candidate) -> Result<Candidate> {
        let sql = format!(
            r#"
            INSERT INTO candidate
                (document, first_name, last_name, email, phone, address, education,
                 experience, cv, cv_filename, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&candidate.document)
            .bind(&candidate.first_name)
            .bind(&candidate.last_name)
            .bind(&candidate.email)
            .bind(&candidate.phone)
            .bind(&candidate.address)
            .bind(&candidate.education)
            .bind(&candidate.experience)
            .bind(candidate.cv.as_ref().map(CvBlob::as_bytes))
            .bind(&candidate.cv_filename)
            .bind(candidate.created_at)
            .bind(candidate.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        debug!(
            subsystem = "database",
            component = "candidates",
            op = "insert",
            document = %candidate.document,
            "Inserted candidate"
        );
        Self::parse_row(&row)
    }

    async fn find_by_document(&self, document: &str) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {COLUMNS} FROM candidate WHERE document = $1");
        let row = sqlx::query(&sql)
            .bind(document)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn find_many(
        &self,
        filter: &CandidateFilter,
        page: Page,
        order: ListOrder,
    ) -> Result<Vec<Candidate>> {
        let order_by = match order {
            ListOrder::NewestFirst => "created_at DESC, seq ASC",
            ListOrder::OldestFirst => "created_at ASC, seq ASC",
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM candidate WHERE {FILTER_CLAUSE} \
             ORDER BY {order_by} LIMIT $4 OFFSET $5"
        );

        let rows = sqlx::query(&sql)
            .bind(like_pattern(&filter.first_name))
            .bind(like_pattern(&filter.last_name))
            .bind(like_pattern(&filter.email))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "candidates",
            op = "find_many",
            result_count = rows.len(),
            "Listed candidates"
        );
        rows.iter().map(Self::parse_row).collect()
    }

    async fn update(
        &self,
        document: &str,
        patch: &CandidatePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Candidate> {
        // A new CV always carries its own name (possibly none). A bare name
        // only renames an existing CV.
        let sql = format!(
            r#"
            UPDATE candidate SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                education = COALESCE($7, education),
                experience = COALESCE($8, experience),
                cv = COALESCE($9, cv),
                cv_filename = CASE
                    WHEN $9::BYTEA IS NOT NULL THEN $10::TEXT
                    WHEN cv IS NOT NULL AND $10::TEXT IS NOT NULL THEN $10::TEXT
                    ELSE cv_filename
                END,
                updated_at = GREATEST($11, created_at)
            WHERE document = $1
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(document)
            .bind(&patch.first_name)
            .bind(&patch.last_name)
            .bind(&patch.email)
            .bind(&patch.phone)
            .bind(&patch.address)
            .bind(&patch.education)
            .bind(&patch.experience)
            .bind(patch.cv.as_ref().map(CvBlob::as_bytes))
            .bind(&patch.cv_filename)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| Error::NotFound(format!("candidate {document}")))?;

        debug!(
            subsystem = "database",
            component = "candidates",
            op = "update",
            document,
            "Updated candidate"
        );
        Self::parse_row(&row)
    }

    async fn delete(&self, document: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM candidate WHERE document = $1")
            .bind(document)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("candidate {document}")));
        }
        debug!(
            subsystem = "database",
            component = "candidates",
            op = "delete",
            document,
            "Deleted candidate"
        );
        Ok(())
    }

    async fn count_where(&self, predicate: &CandidatePredicate) -> Result<i64> {
        let count: i64 = match predicate {
            CandidatePredicate::Document(document) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM candidate WHERE document = $1")
                    .bind(document)
                    .fetch_one(&self.pool)
                    .await
            }
            CandidatePredicate::Email {
                email,
                exclude_document,
            } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM candidate \
                     WHERE email = $1 AND ($2::VARCHAR IS NULL OR document <> $2)",
                )
                .bind(email)
                .bind(exclude_document)
                .fetch_one(&self.pool)
                .await
            }
            CandidatePredicate::Matches(filter) => {
                let sql = format!("SELECT COUNT(*) FROM candidate WHERE {FILTER_CLAUSE}");
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(like_pattern(&filter.first_name))
                    .bind(like_pattern(&filter.last_name))
                    .bind(like_pattern(&filter.email))
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(Error::Database)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&Some("gonz".to_string())), Some("%gonz%".to_string()));
        assert_eq!(
            like_pattern(&Some("50%_off".to_string())),
            Some("%50\\%\\_off%".to_string())
        );
        assert_eq!(like_pattern(&None), None);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_write_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_filter_clause_uses_three_binds() {
        assert!(FILTER_CLAUSE.contains("$1"));
        assert!(FILTER_CLAUSE.contains("$3"));
        assert!(!FILTER_CLAUSE.contains("$4"));
    }
}
