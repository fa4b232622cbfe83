//! Daily entry records.

use crate::clock::Timestamp;
use crate::conflict::{ConflictPair, ConflictSubject};
use crate::error::{ModelError, ModelResult};
use crate::record::{RecordKind, SyncRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The natural key of an entry: a `YYYY-MM-DD` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryDate(String);

impl EntryDate {
    /// Parses and validates a date key.
    pub fn parse(value: &str) -> ModelResult<Self> {
        let trimmed = value.trim();
        NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map_err(|_| ModelError::InvalidDate(value.to_string()))?;
        // Reject forms chrono tolerates, such as missing zero padding.
        if trimmed.len() != 10 {
            return Err(ModelError::InvalidDate(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryDate {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntryDate {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntryDate> for String {
    fn from(value: EntryDate) -> Self {
        value.0
    }
}

/// Expense breakdown recorded with an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expenses {
    /// Fuel spend.
    pub fuel: f64,
    /// Meals spend.
    pub meals: f64,
    /// Lodging spend.
    pub lodging: f64,
    /// Anything else.
    pub other: f64,
}

impl Expenses {
    /// Sum of every category.
    pub fn total(&self) -> f64 {
        self.fuel + self.meals + self.lodging + self.other
    }
}

/// One day of field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Calendar date, the record key.
    pub date: EntryDate,
    /// Points earned.
    #[serde(default)]
    pub points: i64,
    /// Hours worked.
    #[serde(default)]
    pub hours: f64,
    /// Distance driven.
    #[serde(default)]
    pub mileage: f64,
    /// Whether the day was taken off.
    #[serde(default)]
    pub day_off: bool,
    /// Free-text note.
    #[serde(default)]
    pub note: String,
    /// Expense breakdown.
    #[serde(default)]
    pub expenses: Expenses,
    /// First-write timestamp (Unix ms).
    pub created_at: Timestamp,
    /// Last-write timestamp (Unix ms).
    pub modified_at: Timestamp,
}

impl Entry {
    /// Creates an empty entry for `date`, stamped at `now`.
    #[must_use]
    pub fn new(date: EntryDate, now: Timestamp) -> Self {
        Self {
            date,
            points: 0,
            hours: 0.0,
            mileage: 0.0,
            day_off: false,
            note: String::new(),
            expenses: Expenses::default(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Sets the points earned.
    #[must_use]
    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }

    /// Sets the hours worked.
    #[must_use]
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = hours;
        self
    }

    /// Sets the mileage.
    #[must_use]
    pub fn with_mileage(mut self, mileage: f64) -> Self {
        self.mileage = mileage;
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Sets the expense breakdown.
    #[must_use]
    pub fn with_expenses(mut self, expenses: Expenses) -> Self {
        self.expenses = expenses;
        self
    }

    /// Marks the entry as a day off.
    #[must_use]
    pub fn with_day_off(mut self, day_off: bool) -> Self {
        self.day_off = day_off;
        self
    }

    /// Rejects values that cannot round-trip or compare reliably.
    pub fn validate(&self) -> ModelResult<()> {
        let decimals = [
            ("hours", self.hours),
            ("mileage", self.mileage),
            ("expenses.fuel", self.expenses.fuel),
            ("expenses.meals", self.expenses.meals),
            ("expenses.lodging", self.expenses.lodging),
            ("expenses.other", self.expenses.other),
        ];
        for (field, value) in decimals {
            if !value.is_finite() {
                return Err(ModelError::invalid_field(field, "must be finite"));
            }
            if value < 0.0 {
                return Err(ModelError::invalid_field(field, "must not be negative"));
            }
        }
        if self.modified_at < self.created_at {
            return Err(ModelError::invalid_field(
                "modifiedAt",
                "must not precede createdAt",
            ));
        }
        Ok(())
    }
}

impl SyncRecord for Entry {
    const KIND: RecordKind = RecordKind::Entry;

    fn key(&self) -> String {
        self.date.to_string()
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
        if self.date != other.date {
            fields.push("date");
        }
        if self.points != other.points {
            fields.push("points");
        }
        if self.hours != other.hours {
            fields.push("hours");
        }
        if self.mileage != other.mileage {
            fields.push("mileage");
        }
        if self.day_off != other.day_off {
            fields.push("dayOff");
        }
        if self.note != other.note {
            fields.push("note");
        }
        if self.expenses.fuel != other.expenses.fuel {
            fields.push("expenses.fuel");
        }
        if self.expenses.meals != other.expenses.meals {
            fields.push("expenses.meals");
        }
        if self.expenses.lodging != other.expenses.lodging {
            fields.push("expenses.lodging");
        }
        if self.expenses.other != other.expenses.other {
            fields.push("expenses.other");
        }
        fields
    }

    fn conflict_subject(pair: ConflictPair<Self>) -> ConflictSubject {
        ConflictSubject::Entry(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> EntryDate {
        EntryDate::parse(s).unwrap()
    }

    #[test]
    fn entry_date_validation() {
        assert!(EntryDate::parse("2025-07-10").is_ok());
        assert_eq!(date(" 2025-07-10 ").as_str(), "2025-07-10");
        assert!(EntryDate::parse("2025-7-10").is_err());
        assert!(EntryDate::parse("2025-02-30").is_err());
        assert!(EntryDate::parse("10/07/2025").is_err());
        assert!(EntryDate::parse("").is_err());
    }

    #[test]
    fn entry_new_sets_both_timestamps() {
        let entry = Entry::new(date("2025-07-10"), 1_000);
        assert_eq!(entry.created_at, 1_000);
        assert_eq!(entry.modified_at, 1_000);
        assert_eq!(entry.key(), "2025-07-10");
    }

    #[test]
    fn differing_fields_ignores_timestamps() {
        let a = Entry::new(date("2025-07-10"), 1_000).with_points(5);
        let mut b = a.clone();
        b.created_at = 7;
        b.modified_at = 9_999;
        assert!(a.same_content(&b));

        let c = a.clone().with_points(8).with_note("flat tyre");
        assert_eq!(a.differing_fields(&c), vec!["points", "note"]);
    }

    #[test]
    fn nested_expenses_are_compared() {
        let a = Entry::new(date("2025-07-10"), 1_000);
        let b = a.clone().with_expenses(Expenses {
            meals: 12.5,
            ..Expenses::default()
        });
        assert_eq!(a.differing_fields(&b), vec!["expenses.meals"]);
        assert_eq!(b.expenses.total(), 12.5);
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        let entry = Entry::new(date("2025-07-10"), 1_000).with_hours(f64::NAN);
        assert!(entry.validate().is_err());

        let entry = Entry::new(date("2025-07-10"), 1_000).with_mileage(-3.0);
        assert!(entry.validate().is_err());

        let mut entry = Entry::new(date("2025-07-10"), 1_000);
        entry.modified_at = 10;
        assert!(entry.validate().is_err());

        assert!(Entry::new(date("2025-07-10"), 1_000).with_hours(8.5).validate().is_ok());
    }

    #[test]
    fn json_shape_uses_camel_case() {
        let entry = Entry::new(date("2025-07-10"), 1_000).with_points(5);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["date"], "2025-07-10");
        assert_eq!(json["modifiedAt"], 1_000);
        assert_eq!(json["dayOff"], false);

        let bad = serde_json::json!({"date": "nope", "createdAt": 1, "modifiedAt": 1});
        assert!(serde_json::from_value::<Entry>(bad).is_err());
    }
}
