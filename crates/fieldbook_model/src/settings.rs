//! The per-user rate settings singleton.

use crate::clock::Timestamp;
use crate::conflict::{ConflictPair, ConflictSubject};
use crate::error::{ModelError, ModelResult};
use crate::record::{RecordKind, SyncRecord};
use serde::{Deserialize, Serialize};

/// Fixed key of the settings singleton in every store.
pub const SETTINGS_KEY: &str = "rates";

/// Rate configuration used to price entries.
///
/// Writes always replace the whole document; there is no partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Amount paid per point.
    #[serde(default)]
    pub point_rate: f64,
    /// Amount paid per hour.
    #[serde(default)]
    pub hourly_rate: f64,
    /// Amount reimbursed per unit of distance.
    #[serde(default)]
    pub mileage_rate: f64,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// First-write timestamp (Unix ms).
    pub created_at: Timestamp,
    /// Last-write timestamp (Unix ms).
    pub modified_at: Timestamp,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Settings {
    /// Creates zero-rate settings stamped at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            point_rate: 0.0,
            hourly_rate: 0.0,
            mileage_rate: 0.0,
            currency: default_currency(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Sets all three rates.
    #[must_use]
    pub fn with_rates(mut self, point: f64, hourly: f64, mileage: f64) -> Self {
        self.point_rate = point;
        self.hourly_rate = hourly;
        self.mileage_rate = mileage;
        self
    }

    /// Sets the currency code.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Rejects non-finite or negative rates and empty currency codes.
    pub fn validate(&self) -> ModelResult<()> {
        for (field, value) in [
            ("pointRate", self.point_rate),
            ("hourlyRate", self.hourly_rate),
            ("mileageRate", self.mileage_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::invalid_field(
                    field,
                    "must be a finite, non-negative number",
                ));
            }
        }
        if self.currency.trim().is_empty() {
            return Err(ModelError::invalid_field("currency", "must not be empty"));
        }
        Ok(())
    }
}

impl SyncRecord for Settings {
    const KIND: RecordKind = RecordKind::Settings;

    fn key(&self) -> String {
        SETTINGS_KEY.to_string()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn set_created_at(&mut self, at: Timestamp) {
        self.created_at = at;
    }

    fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    fn set_modified_at(&mut self, at: Timestamp) {
        self.modified_at = at;
    }

    fn differing_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.point_rate != other.point_rate {
            fields.push("pointRate");
        }
        if self.hourly_rate != other.hourly_rate {
            fields.push("hourlyRate");
        }
        if self.mileage_rate != other.mileage_rate {
            fields.push("mileageRate");
        }
        if self.currency != other.currency {
            fields.push("currency");
        }
        fields
    }

    fn conflict_subject(pair: ConflictPair<Self>) -> ConflictSubject {
        ConflictSubject::Settings(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_key_is_fixed() {
        let settings = Settings::new(5);
        assert_eq!(settings.key(), SETTINGS_KEY);
        assert_eq!(settings.currency, "USD");
    }

    #[test]
    fn differing_fields_lists_rates() {
        let a = Settings::new(1).with_rates(1.5, 20.0, 0.6);
        let b = a.clone().with_rates(1.5, 22.0, 0.6).with_currency("EUR");
        assert_eq!(a.differing_fields(&b), vec!["hourlyRate", "currency"]);
    }

    #[test]
    fn validate_rejects_bad_rates() {
        assert!(Settings::new(1).with_rates(-1.0, 0.0, 0.0).validate().is_err());
        assert!(Settings::new(1).with_currency(" ").validate().is_err());
        assert!(Settings::new(1).with_rates(1.0, 2.0, 3.0).validate().is_ok());
    }

    #[test]
    fn missing_currency_defaults_on_decode() {
        let json = serde_json::json!({"pointRate": 2.0, "createdAt": 1, "modifiedAt": 2});
        let settings: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.currency, "USD");
        assert_eq!(settings.point_rate, 2.0);
    }
}
