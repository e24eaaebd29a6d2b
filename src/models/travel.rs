// src/models/travel.rs

use std::sync::OnceLock;

use mongodb::bson::{oid::ObjectId, DateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Travel {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub origin: String,
    pub destination: String,
    pub date: DateTime,
    pub airport: String,
    pub terminal: String,
    pub company: String,
    /// Check-in time, "HH:mm".
    pub billing_time: String,
    pub available_weight: f64,
    pub traveler: ObjectId,
    /// false once cancelled by its owner.
    pub state: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

static BILLING_TIME: OnceLock<Regex> = OnceLock::new();

/// Historic pattern, kept as-is: it accepts hours up to "29".
pub fn valid_billing_time(value: &str) -> bool {
    BILLING_TIME
        .get_or_init(|| Regex::new("^[0-2][0-9]:[0-5][0-9]$").unwrap())
        .is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normal_times() {
        assert!(valid_billing_time("08:30"));
        assert!(valid_billing_time("23:59"));
        assert!(valid_billing_time("00:00"));
    }

    #[test]
    fn the_loose_hour_bound_is_preserved() {
        // "29:00" has always been accepted; tightening it would reject
        // stored documents.
        assert!(valid_billing_time("29:00"));
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(!valid_billing_time("9:00"));
        assert!(!valid_billing_time("12:5"));
        assert!(!valid_billing_time("ab:cd"));
        assert!(!valid_billing_time("30:00"));
        assert!(!valid_billing_time("12:60"));
        assert!(!valid_billing_time(""));
    }
}
