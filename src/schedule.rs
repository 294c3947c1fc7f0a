use ::serde::{Deserialize, Serialize};
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

// Single source of truth for the Sunday=0 .. Saturday=6 mapping, shared by
// resolution and display formatting.
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub fn from_index(index: u32) -> Option<Day> {
        match index {
            0 => Some(Day::Sunday),
            1 => Some(Day::Monday),
            2 => Some(Day::Tuesday),
            3 => Some(Day::Wednesday),
            4 => Some(Day::Thursday),
            5 => Some(Day::Friday),
            6 => Some(Day::Saturday),
            _ => None,
        }
    }

    pub fn from_date(date: NaiveDate) -> Day {
        // num_days_from_sunday is always 0..=6
        Day::from_index(date.weekday().num_days_from_sunday()).unwrap_or(Day::Sunday)
    }

    pub fn to_index(&self) -> usize {
        match self {
            Day::Sunday => 0,
            Day::Monday => 1,
            Day::Tuesday => 2,
            Day::Wednesday => 3,
            Day::Thursday => 4,
            Day::Friday => 5,
            Day::Saturday => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        DAY_NAMES[self.to_index()]
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DaySchedule {
    pub enabled: bool,
    pub time_slots: Vec<TimeSlot>,
}

// Seven fixed keys, accepted in either capitalization; anything else in
// the payload is ignored.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    #[serde(alias = "Sunday")]
    pub sunday: DaySchedule,
    #[serde(alias = "Monday")]
    pub monday: DaySchedule,
    #[serde(alias = "Tuesday")]
    pub tuesday: DaySchedule,
    #[serde(alias = "Wednesday")]
    pub wednesday: DaySchedule,
    #[serde(alias = "Thursday")]
    pub thursday: DaySchedule,
    #[serde(alias = "Friday")]
    pub friday: DaySchedule,
    #[serde(alias = "Saturday")]
    pub saturday: DaySchedule,
}

impl WeeklySchedule {
    pub fn day(&self, day: Day) -> &DaySchedule {
        match day {
            Day::Sunday => &self.sunday,
            Day::Monday => &self.monday,
            Day::Tuesday => &self.tuesday,
            Day::Wednesday => &self.wednesday,
            Day::Thursday => &self.thursday,
            Day::Friday => &self.friday,
            Day::Saturday => &self.saturday,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Availability {
    pub weekly_schedule: WeeklySchedule,
    // Accepted from upstream but not interpreted when resolving
    pub exceptions: Vec<serde_json::Value>,
}

/// A slot after resolution: canonical times, a reserved flag instead of
/// removal, and the popularity label for rendering.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSlot {
    pub start: String,
    pub end: String,
    pub reserved: bool,
    pub popularity: Option<String>,
}

/// Strict time-of-day parser. Accepts only "H", "HH" (hour-only, minutes
/// are taken as 00), "H:MM" and "HH:MM"; anything else is rejected rather
/// than guessed at.
pub fn parse_time_of_day(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();

    let (hour_part, minute_part) = match raw.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (raw, None),
    };

    if hour_part.is_empty() || hour_part.len() > 2 || !hour_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let hour: u32 = hour_part.parse().ok()?;

    if hour > 23 {
        return None;
    }

    let minute: u32 = match minute_part {
        None => 0,
        Some(m) => {
            if m.len() != 2 || !m.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }

            m.parse().ok()?
        }
    };

    if minute > 59 {
        return None;
    }

    Some((hour, minute))
}

/// Canonical "HH:MM" form. Idempotent over its own output.
pub fn normalize_time(raw: &str) -> Option<String> {
    let (hour, minute) = parse_time_of_day(raw)?;

    Some(format!("{:02}:{:02}", hour, minute))
}

/// Resolve a tutor's recurring weekly availability against a concrete date.
///
/// A missing availability, a disabled day, or a slot that fails strict time
/// parsing all degrade to "not bookable" rather than erroring; the booking
/// form must always be able to render a "choose another day" state.
/// Source order of the slots is preserved.
pub fn resolve_day_schedule(availability: Option<&Availability>, date: NaiveDate) -> Vec<TimeSlot> {
    let availability = match availability {
        Some(availability) => availability,
        None => return Vec::new(),
    };

    let day_schedule = availability.weekly_schedule.day(Day::from_date(date));

    if !day_schedule.enabled {
        return Vec::new();
    }

    let mut slots = Vec::new();

    for slot in &day_schedule.time_slots {
        if !slot.available {
            continue;
        }

        let start = normalize_time(&slot.start);
        let end = normalize_time(&slot.end);

        if let (Some(start), Some(end)) = (start, end) {
            slots.push(TimeSlot {
                start,
                end,
                available: true,
            });
        }
    }

    slots
}

/// Flag slots that collide with the viewer's existing bookings. Reserved
/// slots stay in the list so the UI can show the conflict instead of
/// silently hiding the option.
pub fn mark_reserved(slots: Vec<TimeSlot>, reserved_times: &HashSet<String>) -> Vec<ResolvedSlot> {
    slots
        .into_iter()
        .map(|slot| {
            let reserved = reserved_times.contains(&slot.start);
            let popularity = classify_popularity(&slot.start).map(|label| label.to_string());

            ResolvedSlot {
                start: slot.start,
                end: slot.end,
                reserved,
                popularity,
            }
        })
        .collect()
}

struct PopularityRule {
    start_hour: u32,
    end_hour: u32,
    label: &'static str,
}

// Evaluated in order; end hour is exclusive
const POPULARITY_RULES: &[PopularityRule] = &[
    PopularityRule {
        start_hour: 14,
        end_hour: 16,
        label: "popular",
    },
    PopularityRule {
        start_hour: 9,
        end_hour: 11,
        label: "recommended",
    },
    PopularityRule {
        start_hour: 18,
        end_hour: 20,
        label: "evening",
    },
];

/// Presentation heuristic mapping an "HH:MM" start time to a fixed label.
pub fn classify_popularity(time: &str) -> Option<&'static str> {
    let (hour, _) = parse_time_of_day(time)?;

    for rule in POPULARITY_RULES {
        if hour >= rule.start_hour && hour < rule.end_hour {
            return Some(rule.label);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: &str, end: &str, available: bool) -> TimeSlot {
        TimeSlot {
            start: start.to_string(),
            end: end.to_string(),
            available,
        }
    }

    fn availability_with_monday(slots: Vec<TimeSlot>) -> Availability {
        let mut availability = Availability::default();
        availability.weekly_schedule.monday = DaySchedule {
            enabled: true,
            time_slots: slots,
        };
        availability
    }

    // 2026-08-03 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    #[test]
    fn test_normalize_accepts_canonical_and_abbreviated() {
        assert_eq!(normalize_time("09:00").as_deref(), Some("09:00"));
        assert_eq!(normalize_time("9:00").as_deref(), Some("09:00"));
        assert_eq!(normalize_time("9").as_deref(), Some("09:00"));
        assert_eq!(normalize_time("23").as_deref(), Some("23:00"));
        assert_eq!(normalize_time(" 14:30 ").as_deref(), Some("14:30"));
    }

    #[test]
    fn test_normalize_rejects_everything_else() {
        for raw in &["", ":", "24:00", "12:60", "9:5", "9:005", "ab:cd", "123", "9:-5", "09:00:00"] {
            assert_eq!(normalize_time(raw), None, "should reject {:?}", raw);
        }
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in &["9", "9:15", "09:15", "23:59", "0"] {
            let once = normalize_time(raw).unwrap();
            assert_eq!(normalize_time(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_day_mapping_round_trip() {
        for index in 0..7 {
            let day = Day::from_index(index).unwrap();
            assert_eq!(day.to_index() as u32, index);
        }

        assert_eq!(Day::from_date(monday()), Day::Monday);
        assert_eq!(Day::Monday.name(), "Monday");
        assert_eq!(Day::from_index(7), None);
    }

    #[test]
    fn test_resolve_filters_and_normalizes() {
        let availability = availability_with_monday(vec![
            slot("9", "10", true),
            slot("14:00", "15:00", false),
        ]);

        let slots = resolve_day_schedule(Some(&availability), monday());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, "09:00");
        assert_eq!(slots[0].end, "10:00");
    }

    #[test]
    fn test_resolve_preserves_source_order() {
        let availability = availability_with_monday(vec![
            slot("16:00", "17:00", true),
            slot("9:00", "10:00", true),
            slot("12:00", "13:00", true),
        ]);

        let slots = resolve_day_schedule(Some(&availability), monday());

        let starts: Vec<&str> = slots.iter().map(|s| s.start.as_str()).collect();
        assert_eq!(starts, vec!["16:00", "09:00", "12:00"]);
    }

    #[test]
    fn test_resolve_missing_availability() {
        assert!(resolve_day_schedule(None, monday()).is_empty());
    }

    #[test]
    fn test_resolve_disabled_day() {
        let mut availability = availability_with_monday(vec![slot("9:00", "10:00", true)]);
        availability.weekly_schedule.monday.enabled = false;

        assert!(resolve_day_schedule(Some(&availability), monday()).is_empty());
    }

    #[test]
    fn test_resolve_drops_unparseable_slots() {
        let availability = availability_with_monday(vec![
            slot("whenever", "10:00", true),
            slot("10:00", "11:00", true),
        ]);

        let slots = resolve_day_schedule(Some(&availability), monday());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, "10:00");
    }

    #[test]
    fn test_resolve_every_day_of_week() {
        let mut availability = Availability::default();
        availability.weekly_schedule.sunday = DaySchedule {
            enabled: true,
            time_slots: vec![slot("8:00", "9:00", true)],
        };
        availability.weekly_schedule.thursday = DaySchedule {
            enabled: true,
            time_slots: vec![slot("18:00", "19:00", true)],
        };

        // 2026-08-02 is a Sunday; walk the whole week from there
        let sunday = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();

        for offset in 0..7 {
            let date = sunday + chrono::Duration::days(offset);
            let slots = resolve_day_schedule(Some(&availability), date);

            match offset {
                0 => assert_eq!(slots[0].start, "08:00"),
                4 => assert_eq!(slots[0].start, "18:00"),
                _ => assert!(slots.is_empty(), "day offset {} should be empty", offset),
            }
        }
    }

    #[test]
    fn test_mark_reserved_flags_without_removing() {
        let slots = vec![slot("09:00", "10:00", true), slot("10:00", "11:00", true)];

        let mut reserved = HashSet::new();
        reserved.insert("09:00".to_string());

        let resolved = mark_reserved(slots, &reserved);

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].reserved);
        assert!(!resolved[1].reserved);
    }

    #[test]
    fn test_mark_reserved_attaches_popularity() {
        let slots = vec![slot("09:00", "10:00", true), slot("12:00", "13:00", true)];

        let resolved = mark_reserved(slots, &HashSet::new());

        assert_eq!(resolved[0].popularity.as_deref(), Some("recommended"));
        assert_eq!(resolved[1].popularity, None);
    }

    #[test]
    fn test_popularity_ranges() {
        assert_eq!(classify_popularity("14:00"), Some("popular"));
        assert_eq!(classify_popularity("15:59"), Some("popular"));
        assert_eq!(classify_popularity("16:00"), None);
        assert_eq!(classify_popularity("09:00"), Some("recommended"));
        assert_eq!(classify_popularity("10:30"), Some("recommended"));
        assert_eq!(classify_popularity("11:00"), None);
        assert_eq!(classify_popularity("18:00"), Some("evening"));
        assert_eq!(classify_popularity("19:45"), Some("evening"));
        assert_eq!(classify_popularity("20:00"), None);
    }

    #[test]
    fn test_popularity_total_over_all_hours() {
        for hour in 0..24 {
            let time = format!("{:02}:00", hour);
            let label = classify_popularity(&time);

            match hour {
                14 | 15 => assert_eq!(label, Some("popular")),
                9 | 10 => assert_eq!(label, Some("recommended")),
                18 | 19 => assert_eq!(label, Some("evening")),
                _ => assert_eq!(label, None),
            }
        }
    }

    #[test]
    fn test_weekly_schedule_accepts_capitalized_day_keys() {
        let raw = r#"{
            "weeklySchedule": {
                "Monday": { "enabled": true, "timeSlots": [{ "start": "9", "end": "10" }] }
            }
        }"#;

        let availability: Availability = serde_json::from_str(raw).unwrap();
        let slots = resolve_day_schedule(Some(&availability), monday());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, "09:00");
    }

    #[test]
    fn test_weekly_schedule_ignores_unknown_keys() {
        let raw = r#"{
            "weeklySchedule": {
                "monday": { "enabled": true, "timeSlots": [{ "start": "9", "end": "10" }] },
                "fooday": { "enabled": true }
            },
            "exceptions": [{ "date": "2026-08-03" }]
        }"#;

        let availability: Availability = serde_json::from_str(raw).unwrap();
        let slots = resolve_day_schedule(Some(&availability), monday());

        assert_eq!(slots.len(), 1);
        assert_eq!(availability.exceptions.len(), 1);
    }
}
