//! Read-side uniqueness checks for the two unique candidate keys.

use tracing::debug;

use crate::error::Result;
use crate::models::CandidatePredicate;
use crate::traits::CandidateRepository;

/// Answers "is this key already taken?" against a repository.
///
/// These checks run before a write so the caller gets a precise failure, but
/// they are not atomic with the write. The store's unique constraints stay
/// authoritative.
pub struct UniquenessChecker<'a> {
    repo: &'a dyn CandidateRepository,
}

impl<'a> UniquenessChecker<'a> {
    pub fn new(repo: &'a dyn CandidateRepository) -> Self {
        Self { repo }
    }

    /// Whether a record with this document number exists.
    pub async fn exists_by_document(&self, document: &str) -> Result<bool> {
        let count = self
            .repo
            .count_where(&CandidatePredicate::Document(document.to_string()))
            .await?;
        debug!(
            subsystem = "candidates",
            component = "uniqueness",
            op = "exists_by_document",
            document,
            count,
            "Checked document uniqueness"
        );
        Ok(count > 0)
    }

    /// Whether another record uses this email, ignoring `exclude_document`.
    pub async fn exists_by_email(
        &self,
        email: &str,
        exclude_document: Option<&str>,
    ) -> Result<bool> {
        let count = self
            .repo
            .count_where(&CandidatePredicate::Email {
                email: email.to_string(),
                exclude_document: exclude_document.map(String::from),
            })
            .await?;
        debug!(
            subsystem = "candidates",
            component = "uniqueness",
            op = "exists_by_email",
            excluded = exclude_document.unwrap_or(""),
            count,
            "Checked email uniqueness"
        );
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::InMemoryCandidateRepository;
    use crate::models::NewCandidate;
    use chrono::Utc;

    fn seeded() -> InMemoryCandidateRepository {
        let repo = InMemoryCandidateRepository::new();
        repo.seed(
            NewCandidate {
                document: "12345678A".to_string(),
                first_name: "María".to_string(),
                last_name: "González".to_string(),
                email: "maria@x.com".to_string(),
                phone: None,
                address: None,
                education: None,
                experience: None,
                cv: None,
                cv_filename: None,
            }
            .into_candidate(Utc::now()),
        );
        repo
    }

    #[tokio::test]
    async fn test_exists_by_document() {
        let repo = seeded();
        let checker = UniquenessChecker::new(&repo);
        assert!(checker.exists_by_document("12345678A").await.unwrap());
        assert!(!checker.exists_by_document("99999999Z").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_by_email_without_exclusion() {
        let repo = seeded();
        let checker = UniquenessChecker::new(&repo);
        assert!(checker.exists_by_email("maria@x.com", None).await.unwrap());
        assert!(!checker.exists_by_email("other@x.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_by_email_excludes_own_record() {
        let repo = seeded();
        let checker = UniquenessChecker::new(&repo);
        assert!(!checker
            .exists_by_email("maria@x.com", Some("12345678A"))
            .await
            .unwrap());
        assert!(checker
            .exists_by_email("maria@x.com", Some("99999999Z"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_email_match_is_exact() {
        let repo = seeded();
        let checker = UniquenessChecker::new(&repo);
        assert!(!checker.exists_by_email("MARIA@x.com", None).await.unwrap());
    }
}
