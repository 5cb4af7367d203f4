use crate::codec;
use crate::error::Result;
use rallytag_core::{
    AuthProvider, Identity, JoinReceipt, Storage, VerificationClaim, VerificationService,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Verification intent preserved across a signup-or-login detour.
/// Serializable so a caller can stash it wherever its detour survives
/// (a file, a query parameter, session storage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub match_id: String,
    pub secret: String,
    pub return_path: String,
}

impl PendingVerification {
    pub fn to_token(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_token(token: &str) -> Result<Self> {
        Ok(serde_json::from_str(token)?)
    }
}

/// What opening a verification link produced.
#[derive(Debug)]
pub enum GuestOutcome {
    /// An authenticated actor opened the link; verification already ran.
    Verified(JoinReceipt),
    /// Nobody is signed in. The intent is preserved; send the guest
    /// through signup/login and call [`GuestEntryFlow::resume`] after.
    SignupRequired(PendingVerification),
}

/// Handles a verification link opened by a possibly-unauthenticated
/// actor. The pending intent is a one-shot value owned by this flow:
/// `resume` takes it, so a repeated resume cannot double-submit and
/// no ambient "already ran" flag is needed.
pub struct GuestEntryFlow {
    service: VerificationService,
    pending: Option<PendingVerification>,
}

impl GuestEntryFlow {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            service: VerificationService::new(storage),
            pending: None,
        }
    }

    /// Restore a flow from an intent that survived a detour in some
    /// external stash.
    pub fn with_pending(storage: Arc<Storage>, pending: PendingVerification) -> Self {
        Self {
            service: VerificationService::new(storage),
            pending: Some(pending),
        }
    }

    pub fn pending(&self) -> Option<&PendingVerification> {
        self.pending.as_ref()
    }

    /// Open a verification link. Decodes first, so a malformed link is
    /// rejected before anyone is sent through signup for nothing.
    pub async fn open_link(&mut self, raw: &str, auth: &dyn AuthProvider) -> Result<GuestOutcome> {
        let payload = codec::decode(raw)?;

        match auth.current_actor() {
            Some(actor) => {
                let receipt = self
                    .service
                    .verify(&VerificationClaim::new(
                        &payload.match_id,
                        &payload.secret,
                        &actor.user_id,
                    ))
                    .await?;
                Ok(GuestOutcome::Verified(receipt))
            }
            None => {
                let pending = PendingVerification {
                    match_id: payload.match_id,
                    secret: payload.secret,
                    return_path: raw.to_string(),
                };
                tracing::info!(
                    "Unauthenticated open of match {}, preserving intent",
                    pending.match_id
                );
                self.pending = Some(pending.clone());
                Ok(GuestOutcome::SignupRequired(pending))
            }
        }
    }

    /// Finish a preserved verification once authentication resolved.
    /// Returns `Ok(None)` when there is nothing pending (including a
    /// second call for the same intent).
    pub async fn resume(&mut self, actor: &Identity) -> Result<Option<JoinReceipt>> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Ok(None),
        };

        let receipt = self
            .service
            .verify(&VerificationClaim::new(
                &pending.match_id,
                &pending.secret,
                &actor.user_id,
            ))
            .await?;
        tracing::info!(
            "Resumed verification of match {} for {}",
            receipt.match_id,
            actor.user_id
        );
        Ok(Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use rallytag_core::{CoreError, MatchStore, MatchType, StaticAuth};

    async fn verify_link() -> (Arc<Storage>, String) {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let record = MatchStore::new(&storage)
            .create_match("host", MatchType::Singles)
            .await
            .unwrap();
        let link = codec::encode("https://rallytag.app", &record.id, &record.secret).unwrap();
        (storage, link)
    }

    #[tokio::test]
    async fn test_authenticated_open_verifies_immediately() {
        let (storage, link) = verify_link().await;
        let mut flow = GuestEntryFlow::new(storage);

        let outcome = flow
            .open_link(&link, &StaticAuth::authenticated("alice"))
            .await
            .unwrap();
        match outcome {
            GuestOutcome::Verified(receipt) => assert_eq!(receipt.participant_count, 1),
            other => panic!("expected immediate verification, got {:?}", other),
        }
        assert!(flow.pending().is_none());
    }

    #[tokio::test]
    async fn test_guest_detour_preserves_intent_and_resumes() {
        let (storage, link) = verify_link().await;
        let mut flow = GuestEntryFlow::new(storage.clone());

        let outcome = flow
            .open_link(&link, &StaticAuth::anonymous())
            .await
            .unwrap();
        let pending = match outcome {
            GuestOutcome::SignupRequired(pending) => pending,
            other => panic!("expected signup detour, got {:?}", other),
        };
        assert_eq!(pending.return_path, link);

        // Intent survives serialization across the detour
        let token = pending.to_token().unwrap();
        let restored = PendingVerification::from_token(&token).unwrap();
        let mut resumed_flow = GuestEntryFlow::with_pending(storage, restored);

        let receipt = resumed_flow
            .resume(&Identity::new("newuser"))
            .await
            .unwrap()
            .expect("pending intent should verify");
        assert_eq!(receipt.participant_count, 1);

        // One-shot: a second resume does nothing
        assert!(resumed_flow
            .resume(&Identity::new("newuser"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resume_surfaces_verification_errors() {
        let (storage, _link) = verify_link().await;
        let mut flow = GuestEntryFlow::with_pending(
            storage,
            PendingVerification {
                match_id: "missing".to_string(),
                secret: "9Q8W7E".to_string(),
                return_path: String::new(),
            },
        );

        let err = flow.resume(&Identity::new("alice")).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Core(CoreError::MatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_link_rejected_before_detour() {
        let (storage, _link) = verify_link().await;
        let mut flow = GuestEntryFlow::new(storage);

        let err = flow
            .open_link("totally not a link", &StaticAuth::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedPayload(_)));
        assert!(flow.pending().is_none());
    }
}
