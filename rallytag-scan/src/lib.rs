//! rallytag scanning protocol
//!
//! Everything between "host opens a session" and "match confirmed":
//! the code transport codec (URL form plus the legacy JSON form), the
//! host session state machine with its quorum poller, the
//! camera-driven capture loop, and the guest entry flow that keeps a
//! verification alive across a signup detour.

pub mod capture;
pub mod codec;
pub mod error;
pub mod guest;
pub mod poller;
pub mod session;

pub use capture::{CameraDevice, CameraFacing, CaptureLoop, CaptureOutcome, ScriptedCamera};
pub use codec::{CodePayload, PayloadKind, VERIFY_PATH};
pub use error::{Result, ScanError};
pub use guest::{GuestEntryFlow, GuestOutcome, PendingVerification};
pub use poller::QuorumPoller;
pub use session::{HostSession, HostedMatch, SessionState};
