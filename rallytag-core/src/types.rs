use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Match format, which fixes the quorum target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Singles,
    Doubles,
}

impl MatchType {
    /// Number of distinct verified participants required to confirm.
    pub fn target_participants(&self) -> usize {
        match self {
            MatchType::Singles => 2,
            MatchType::Doubles => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Singles => "singles",
            MatchType::Doubles => "doubles",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singles" => Ok(MatchType::Singles),
            "doubles" => Ok(MatchType::Doubles),
            other => Err(format!("unknown match type: {}", other)),
        }
    }
}

/// Derived match status; never stored, always computed from the
/// participant count against the type's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Open,
    Confirmed,
}

/// A verified participant of a match. One row per identity per match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// A match as stored, with participants ordered by join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub match_type: MatchType,
    pub secret: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl MatchRecord {
    pub fn status(&self) -> MatchStatus {
        if self.participants.len() >= self.match_type.target_participants() {
            MatchStatus::Confirmed
        } else {
            MatchStatus::Open
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status() == MatchStatus::Confirmed
    }
}

/// What a verification call needs. Scan-derived and manually typed
/// submissions both reduce to this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaim {
    pub match_id: String,
    pub secret: String,
    pub acting_user: String,
}

impl VerificationClaim {
    pub fn new(
        match_id: impl Into<String>,
        secret: impl Into<String>,
        acting_user: impl Into<String>,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            secret: secret.into(),
            acting_user: acting_user.into(),
        }
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub match_id: String,
    pub participant_count: usize,
    pub target: usize,
}

impl JoinReceipt {
    pub fn confirmed(&self) -> bool {
        self.participant_count >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_targets() {
        assert_eq!(MatchType::Singles.target_participants(), 2);
        assert_eq!(MatchType::Doubles.target_participants(), 4);
    }

    #[test]
    fn test_match_type_round_trip() {
        for t in [MatchType::Singles, MatchType::Doubles] {
            assert_eq!(t.as_str().parse::<MatchType>().unwrap(), t);
        }
        assert!("triples".parse::<MatchType>().is_err());
    }

    #[test]
    fn test_status_derived_from_count() {
        let mut record = MatchRecord {
            id: "m1".to_string(),
            match_type: MatchType::Singles,
            secret: "7F2QK1".to_string(),
            creator: "host".to_string(),
            created_at: Utc::now(),
            participants: Vec::new(),
        };
        assert_eq!(record.status(), MatchStatus::Open);

        for user in ["a", "b"] {
            record.participants.push(Participant {
                user_id: user.to_string(),
                joined_at: Utc::now(),
            });
        }
        assert_eq!(record.status(), MatchStatus::Confirmed);
    }
}
