//! Dosing schedule inference.
//!
//! Rules, in order:
//! 1. A `morning-noon-night` triplet ("1-0-1", "0-1/2-0") is authoritative
//!    when any field is positive. Keyword and frequency rules are skipped.
//! 2. Time-of-day keywords (Indonesian or English) add their slot. "sore"
//!    (afternoon) maps to Night.
//! 3. Frequency shorthand ("3 dd 1", "2x1") fills Morning, then Night, then
//!    Noon, only if rules 1-2 found nothing. With several frequency tokens
//!    in one entry, 3 beats 2, 2 beats 4, 4 beats 1, wherever they appear;
//!    other counts only apply when none of those is present (first wins).
//! 4. Default: Morning.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::types::{SlotSet, TimeSlot};

static RE_TRIPLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+(?:/\d+)?)\s*-\s*(\d+(?:/\d+)?)\s*-\s*(\d+(?:/\d+)?)\b").unwrap()
});

static RE_FREQUENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:dd|x)").unwrap());

static SLOT_KEYWORDS: LazyLock<Vec<(Regex, TimeSlot)>> = LazyLock::new(|| {
    vec![
        keyword(r"pagi|morning", TimeSlot::Morning),
        keyword(r"siang|noon|midday", TimeSlot::Noon),
        keyword(r"malam|night|bedtime", TimeSlot::Night),
        keyword(r"sore|afternoon|evening", TimeSlot::Night),
    ]
});

fn keyword(alternatives: &str, slot: TimeSlot) -> (Regex, TimeSlot) {
    (
        Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).unwrap(),
        slot,
    )
}

/// Which rule produced a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleRule {
    Triplet,
    Keywords,
    Frequency,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DosingSchedule {
    /// Never empty.
    pub slots: SlotSet,
    pub rule: ScheduleRule,
}

/// Infer the active time slots for a raw (pre-normalization) entry.
pub fn parse_schedule(raw: &str) -> DosingSchedule {
    if let Some(slots) = triplet_slots(raw) {
        return DosingSchedule {
            slots,
            rule: ScheduleRule::Triplet,
        };
    }

    let keyword_slots: SlotSet = SLOT_KEYWORDS
        .iter()
        .filter(|(re, _)| re.is_match(raw))
        .map(|(_, slot)| *slot)
        .collect();
    if !keyword_slots.is_empty() {
        return DosingSchedule {
            slots: keyword_slots,
            rule: ScheduleRule::Keywords,
        };
    }

    if let Some(freq) = daily_frequency(raw) {
        let slots = slots_for_frequency(freq);
        if !slots.is_empty() {
            return DosingSchedule {
                slots,
                rule: ScheduleRule::Frequency,
            };
        }
    }

    DosingSchedule {
        slots: SlotSet::from([TimeSlot::Morning]),
        rule: ScheduleRule::Default,
    }
}

/// Convenience wrapper returning only the slots.
pub fn parse_time_slots(raw: &str) -> SlotSet {
    parse_schedule(raw).slots
}

/// Slots activated by the first triplet pattern, if it activates any.
fn triplet_slots(raw: &str) -> Option<SlotSet> {
    let caps = RE_TRIPLET.captures(raw)?;
    let slots: SlotSet = TimeSlot::ALL
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            caps.get(i + 1)
                .and_then(|m| dose_fraction(m.as_str()))
                .is_some_and(|v| v > 0.0)
        })
        .map(|(_, slot)| *slot)
        .collect();
    (!slots.is_empty()).then_some(slots)
}

/// Parse "1", "2", "1/2". Zero denominators are treated as unparseable.
fn dose_fraction(field: &str) -> Option<f64> {
    match field.split_once('/') {
        Some((n, d)) => {
            let n: f64 = n.parse().ok()?;
            let d: f64 = d.parse().ok()?;
            (d != 0.0).then(|| n / d)
        }
        None => field.parse().ok(),
    }
}

/// Frequencies preferred when an entry carries more than one.
const FREQUENCY_PRIORITY: [u32; 4] = [3, 2, 4, 1];

/// The "N dd" / "N x" frequency of an entry.
fn daily_frequency(raw: &str) -> Option<u32> {
    let found: Vec<u32> = RE_FREQUENCY
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();
    FREQUENCY_PRIORITY
        .into_iter()
        .find(|freq| found.contains(freq))
        .or_else(|| found.first().copied())
}

/// Escalating fill: 1 -> Morning, 2 -> + Night, 3+ -> + Noon.
fn slots_for_frequency(freq: u32) -> SlotSet {
    let mut slots = SlotSet::new();
    if freq >= 1 {
        slots.insert(TimeSlot::Morning);
    }
    if freq >= 2 {
        slots.insert(TimeSlot::Night);
    }
    if freq >= 3 {
        slots.insert(TimeSlot::Noon);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(slots: &[TimeSlot]) -> SlotSet {
        slots.iter().copied().collect()
    }

    #[test]
    fn triplet_morning_and_night() {
        let schedule = parse_schedule("FENITOIN 100MG TAB 1-0-1");
        assert_eq!(schedule.slots, set(&[TimeSlot::Morning, TimeSlot::Night]));
        assert_eq!(schedule.rule, ScheduleRule::Triplet);
    }

    #[test]
    fn triplet_fraction_counts_as_positive() {
        assert_eq!(parse_time_slots("Diagit 0-1/2-0"), set(&[TimeSlot::Noon]));
        assert_eq!(parse_time_slots("x 1 - 1 - 1"), set(&TimeSlot::ALL));
    }

    #[test]
    fn triplet_short_circuits_keywords_and_frequency() {
        let slots = parse_time_slots("Amlodipin 1-0-0 malam 3 dd 1");
        assert_eq!(slots, set(&[TimeSlot::Morning]));
    }

    #[test]
    fn all_zero_triplet_falls_through() {
        let schedule = parse_schedule("obat 0-0-0 malam");
        assert_eq!(schedule.slots, set(&[TimeSlot::Night]));
        assert_eq!(schedule.rule, ScheduleRule::Keywords);
    }

    #[test]
    fn zero_denominator_is_inactive() {
        assert_eq!(parse_time_slots("1/0-1-0"), set(&[TimeSlot::Noon]));
    }

    #[test]
    fn indonesian_keywords() {
        assert_eq!(parse_time_slots("diminum pagi"), set(&[TimeSlot::Morning]));
        assert_eq!(parse_time_slots("SIANG hari"), set(&[TimeSlot::Noon]));
        assert_eq!(
            parse_time_slots("pagi dan malam"),
            set(&[TimeSlot::Morning, TimeSlot::Night])
        );
    }

    #[test]
    fn afternoon_maps_to_night() {
        assert_eq!(parse_time_slots("minum sore"), set(&[TimeSlot::Night]));
        assert_eq!(parse_time_slots("take in the afternoon"), set(&[TimeSlot::Night]));
    }

    #[test]
    fn keywords_are_whole_words() {
        // "overnight" and "soreness" must not trigger slots.
        assert_eq!(parse_schedule("soreness overnight").rule, ScheduleRule::Default);
    }

    #[test]
    fn keywords_suppress_frequency() {
        assert_eq!(parse_time_slots("3 dd 1 malam"), set(&[TimeSlot::Night]));
    }

    #[test]
    fn frequency_escalating_fill() {
        assert_eq!(parse_time_slots("1 dd 1"), set(&[TimeSlot::Morning]));
        assert_eq!(
            parse_time_slots("2x1"),
            set(&[TimeSlot::Morning, TimeSlot::Night])
        );
        assert_eq!(parse_time_slots("3 DD 1"), set(&TimeSlot::ALL));
    }

    #[test]
    fn multiple_frequencies_use_priority_not_position() {
        assert_eq!(daily_frequency("1 dd 1, bila nyeri 3 dd 1"), Some(3));
        assert_eq!(daily_frequency("4x1 lalu 2x1"), Some(2));
        assert_eq!(daily_frequency("1x1 atau 4x1"), Some(4));
        assert_eq!(daily_frequency("6 dd 1 atau 5 dd 1"), Some(6));
        assert_eq!(
            parse_time_slots("1 dd 1, bila nyeri 3 dd 1"),
            set(&TimeSlot::ALL)
        );
    }

    #[test]
    fn frequency_above_three_caps_at_three_slots() {
        let schedule = parse_schedule("4 dd 1");
        assert_eq!(schedule.slots, set(&TimeSlot::ALL));
        assert_eq!(schedule.rule, ScheduleRule::Frequency);
    }

    #[test]
    fn zero_frequency_defaults_to_morning() {
        assert_eq!(parse_schedule("0x").rule, ScheduleRule::Default);
    }

    #[test]
    fn no_signal_defaults_to_morning() {
        let schedule = parse_schedule("IBUPROFEN TAB");
        assert_eq!(schedule.slots, set(&[TimeSlot::Morning]));
        assert_eq!(schedule.rule, ScheduleRule::Default);
        assert_eq!(parse_time_slots(""), set(&[TimeSlot::Morning]));
    }
}
