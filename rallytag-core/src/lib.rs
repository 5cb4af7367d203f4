//! rallytag core - match records, storage, and the verification service
//!
//! Two parties confirm out of band that they played a match together:
//! the host opens a match and receives a short code, joiners submit
//! that code, and the match counts as confirmed once enough distinct
//! participants have verified. This crate owns the data model, the
//! SQLite-backed storage, and the claim verification itself; the
//! scanning protocol lives in `rallytag-scan`.

pub mod auth;
pub mod error;
pub mod secret;
pub mod storage;
pub mod types;
pub mod verify;

pub use auth::{AuthProvider, EnvAuth, Identity, StaticAuth};
pub use error::{CoreError, Result};
pub use storage::{AppendOutcome, MatchStore, Storage};
pub use types::{
    JoinReceipt, MatchRecord, MatchStatus, MatchType, Participant, VerificationClaim,
};
pub use verify::VerificationService;
