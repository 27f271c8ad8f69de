use crate::domain::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Release conditions attached to a conditional intent at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConditions {
    pub delivery_proof_required: bool,
    /// Seconds after proof submission during which a dispute may be raised.
    pub dispute_window_secs: i64,
}

impl ReleaseConditions {
    pub fn dispute_window(&self) -> Duration {
        Duration::seconds(self.dispute_window_secs)
    }
}

impl Default for ReleaseConditions {
    fn default() -> Self {
        Self {
            delivery_proof_required: true,
            // 72 hours
            dispute_window_secs: 72 * 3600,
        }
    }
}

/// Evidence submitted to satisfy an escrow's release condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub hash: String,
    pub uri: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: UserId,
}

/// A challenge raised against a delivery proof within the dispute window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub reason: String,
    pub raised_at: DateTime<Utc>,
    pub raised_by: UserId,
}

/// Escrow sub-record of a conditional intent, owned by the gateway.
///
/// Holds at most one proof and at most one dispute; a dispute requires a
/// prior proof and must land inside the dispute window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escrow {
    pub address: String,
    pub conditions: ReleaseConditions,
    pub proof: Option<DeliveryProof>,
    pub dispute: Option<Dispute>,
    /// Set once a dispute is raised; adjudication happens outside this system.
    pub release_suspended: bool,
}

impl Escrow {
    pub fn new(address: impl Into<String>, conditions: ReleaseConditions) -> Self {
        Self {
            address: address.into(),
            conditions,
            proof: None,
            dispute: None,
            release_suspended: false,
        }
    }

    /// Last instant at which a dispute may still be raised, if a proof exists.
    pub fn dispute_deadline(&self) -> Option<DateTime<Utc>> {
        self.proof
            .as_ref()
            .map(|proof| proof.submitted_at + self.conditions.dispute_window())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispute_deadline_follows_proof_submission() {
        let mut escrow = Escrow::new(
            "esc_1",
            ReleaseConditions {
                delivery_proof_required: true,
                dispute_window_secs: 3600,
            },
        );
        assert_eq!(escrow.dispute_deadline(), None);

        let submitted_at = Utc::now();
        escrow.proof = Some(DeliveryProof {
            hash: "abc".to_string(),
            uri: None,
            submitted_at,
            submitted_by: UserId::from("alice"),
        });
        assert_eq!(
            escrow.dispute_deadline(),
            Some(submitted_at + Duration::hours(1))
        );
    }
}
