//! Property-based test generators using proptest.
//!
//! Generated records are always valid: dates exist on the calendar and
//! numbers are finite and non-negative.

use fieldbook_model::{ConflictChoice, Entry, EntryDate, Expenses, Settings, Timestamp};
use proptest::prelude::*;

/// Strategy for valid entry dates in 2024 and 2025.
pub fn entry_date_strategy() -> impl Strategy<Value = EntryDate> {
    (2024i32..=2025, 1u32..=12, 1u32..=28).prop_map(|(year, month, day)| {
        EntryDate::parse(&format!("{year:04}-{month:02}-{day:02}"))
            .expect("generated date is valid")
    })
}

fn amount() -> impl Strategy<Value = f64> {
    (0u32..100_000).prop_map(|cents| f64::from(cents) / 100.0)
}

/// Strategy for expense breakdowns.
pub fn expenses_strategy() -> impl Strategy<Value = Expenses> {
    (amount(), amount(), amount(), amount()).prop_map(|(fuel, meals, lodging, other)| Expenses {
        fuel,
        meals,
        lodging,
        other,
    })
}

/// Strategy for valid entries stamped at `at`.
pub fn entry_strategy(at: Timestamp) -> impl Strategy<Value = Entry> {
    (
        entry_date_strategy(),
        0i64..500,
        (0u32..240).prop_map(|quarters| f64::from(quarters) / 4.0),
        amount(),
        any::<bool>(),
        "[a-z ]{0,24}",
        expenses_strategy(),
    )
        .prop_map(move |(date, points, hours, mileage, day_off, note, expenses)| {
            Entry::new(date, at)
                .with_points(points)
                .with_hours(hours)
                .with_mileage(mileage)
                .with_day_off(day_off)
                .with_note(note)
                .with_expenses(expenses)
        })
}

/// Strategy for sets of entries with distinct dates.
pub fn entry_set_strategy(at: Timestamp, max: usize) -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(entry_strategy(at), 0..=max).prop_map(|mut entries| {
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        entries.dedup_by(|a, b| a.date == b.date);
        entries
    })
}

/// Strategy for valid settings stamped at `at`.
pub fn settings_strategy(at: Timestamp) -> impl Strategy<Value = Settings> {
    (amount(), amount(), amount(), prop::sample::select(vec!["USD", "EUR", "KES"])).prop_map(
        move |(point, hourly, mileage, currency)| {
            Settings::new(at)
                .with_rates(point, hourly, mileage)
                .with_currency(currency)
        },
    )
}

/// Strategy for conflict answers.
pub fn choice_strategy() -> impl Strategy<Value = ConflictChoice> {
    prop_oneof![Just(ConflictChoice::KeepLocal), Just(ConflictChoice::KeepRemote)]
}
