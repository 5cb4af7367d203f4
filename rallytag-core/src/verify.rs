use crate::error::{CoreError, Result};
use crate::storage::{AppendOutcome, MatchStore, Storage};
use crate::types::{JoinReceipt, VerificationClaim};
use std::sync::Arc;

/// Validates and records participation claims.
///
/// The membership and capacity checks live in
/// [`MatchStore::append_participant_if_room`], which runs them in one
/// transaction; this service only owns the lookup and the secret
/// comparison, and maps storage outcomes onto the error taxonomy.
pub struct VerificationService {
    storage: Arc<Storage>,
}

impl VerificationService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn verify(&self, claim: &VerificationClaim) -> Result<JoinReceipt> {
        let store = MatchStore::new(&self.storage);

        let record = store
            .get_match(&claim.match_id)
            .await?
            .ok_or_else(|| CoreError::match_not_found(&claim.match_id))?;

        // Exact comparison. The generation alphabet has a single case,
        // so there is nothing to fold.
        if record.secret != claim.secret {
            tracing::debug!("Rejected claim with wrong code for match {}", record.id);
            return Err(CoreError::InvalidCode);
        }

        let target = record.match_type.target_participants();
        match store
            .append_participant_if_room(&claim.match_id, &claim.acting_user)
            .await?
        {
            AppendOutcome::Joined(count) => {
                tracing::info!(
                    "User {} verified for match {} ({}/{})",
                    claim.acting_user,
                    record.id,
                    count,
                    target
                );
                Ok(JoinReceipt {
                    match_id: record.id,
                    participant_count: count,
                    target,
                })
            }
            AppendOutcome::AlreadyJoined => Err(CoreError::AlreadyJoined),
            AppendOutcome::Full => Err(CoreError::MatchFull),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchType;

    async fn service_with_match(match_type: MatchType) -> (VerificationService, String, String) {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let record = MatchStore::new(&storage)
            .create_match("host", match_type)
            .await
            .unwrap();
        (
            VerificationService::new(storage),
            record.id,
            record.secret,
        )
    }

    #[tokio::test]
    async fn test_verify_success_then_idempotent() {
        let (service, match_id, secret) = service_with_match(MatchType::Singles).await;
        let claim = VerificationClaim::new(&match_id, &secret, "alice");

        let receipt = service.verify(&claim).await.unwrap();
        assert_eq!(receipt.participant_count, 1);
        assert_eq!(receipt.target, 2);
        assert!(!receipt.confirmed());

        // Retried identical claim must not double count
        let err = service.verify(&claim).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyJoined));

        let count = MatchStore::new(&service.storage)
            .participant_count(&match_id)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_verify_wrong_code() {
        let (service, match_id, _secret) = service_with_match(MatchType::Singles).await;
        let err = service
            .verify(&VerificationClaim::new(&match_id, "WRONG9", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCode));
    }

    #[tokio::test]
    async fn test_verify_unknown_match() {
        let (service, _match_id, secret) = service_with_match(MatchType::Singles).await;
        let err = service
            .verify(&VerificationClaim::new("no-such-match", &secret, "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MatchNotFound(_)));
    }

    #[tokio::test]
    async fn test_singles_third_join_is_full() {
        let (service, match_id, secret) = service_with_match(MatchType::Singles).await;

        for user in ["alice", "bob"] {
            service
                .verify(&VerificationClaim::new(&match_id, &secret, user))
                .await
                .unwrap();
        }

        let err = service
            .verify(&VerificationClaim::new(&match_id, &secret, "carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MatchFull));
    }

    #[tokio::test]
    async fn test_creator_is_not_special_cased() {
        // Explicit policy: the host is never auto-counted, and a host
        // who submits their own code counts like any other identity.
        let (service, match_id, secret) = service_with_match(MatchType::Singles).await;

        let receipt = service
            .verify(&VerificationClaim::new(&match_id, &secret, "host"))
            .await
            .unwrap();
        assert_eq!(receipt.participant_count, 1);
    }

    #[tokio::test]
    async fn test_doubles_confirms_at_target() {
        let (service, match_id, secret) = service_with_match(MatchType::Doubles).await;

        let mut last = None;
        for user in ["p1", "p2", "p3", "p4"] {
            last = Some(
                service
                    .verify(&VerificationClaim::new(&match_id, &secret, user))
                    .await
                    .unwrap(),
            );
        }
        let receipt = last.unwrap();
        assert_eq!(receipt.participant_count, 4);
        assert!(receipt.confirmed());
    }
}
