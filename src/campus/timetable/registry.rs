use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::campus::timetable::config::CourseConfig;
use crate::campus::timetable::model::{Day, RawCell, TimeSlot};

/// Append-only catalogue of the time slots seen in one extraction run.
#[derive(Debug, Clone, Default)]
pub struct TimeSlotRegistry {
    slots: Vec<TimeSlot>,
    positions: HashMap<TimeSlot, usize>,
}

impl TimeSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the `(start, end)` pair, registering it on first sight.
    /// Times are canonicalised to `HH:MM` when they parse.
    pub fn register_or_lookup(&mut self, start: &str, end: &str) -> usize {
        let slot = TimeSlot {
            start: parse_time_of_day(start).unwrap_or_else(|| start.trim().to_string()),
            end: parse_time_of_day(end).unwrap_or_else(|| end.trim().to_string()),
        };
        if let Some(index) = self.positions.get(&slot) {
            return *index;
        }
        let index = self.slots.len();
        self.positions.insert(slot.clone(), index);
        self.slots.push(slot);
        index
    }

    /// Index of the registered slot closest to `slot`, measured as the sum of
    /// the start and end distances in minutes, if it is within `tolerance`.
    pub fn nearest(&self, slot: &TimeSlot, tolerance: u32) -> Option<usize> {
        let start = minutes_of_day(&slot.start)?;
        let end = minutes_of_day(&slot.end)?;
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, known)| {
                let distance = minutes_of_day(&known.start)?.abs_diff(start)
                    + minutes_of_day(&known.end)?.abs_diff(end);
                Some((distance, index))
            })
            .filter(|(distance, _)| *distance <= tolerance)
            .min()
            .map(|(_, index)| index)
    }

    pub fn get(&self, index: usize) -> Option<&TimeSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Weekday columns of the timetable, read once from the header row.
#[derive(Debug, Clone, Default)]
pub struct DayRegistry {
    days: Vec<Day>,
    columns: BTreeMap<usize, usize>,
}

impl DayRegistry {
    /// Scans the header row left to right. Each cell containing a weekday of
    /// the vocabulary maps its column to that day; days are indexed in order
    /// of first appearance.
    pub fn from_header(row: &[RawCell], config: &CourseConfig) -> Self {
        let mut registry = Self::default();
        for (column, cell) in row.iter().enumerate() {
            let Some(label) = cell.text().and_then(|text| config.find_weekday(text)) else {
                continue;
            };
            let index = match registry.days.iter().position(|day| day.label == label) {
                Some(index) => index,
                None => {
                    registry.days.push(Day {
                        index: registry.days.len(),
                        label: label.to_string(),
                    });
                    registry.days.len() - 1
                }
            };
            registry.columns.insert(column, index);
        }
        registry
    }

    /// Day index of a grid column, if the column is a weekday column.
    pub fn day_for_column(&self, column: usize) -> Option<usize> {
        self.columns.get(&column).copied()
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Parses a time-slot cell such as `07:00 às 07:50`. The text must split into
/// exactly two parseable times around the separator.
pub fn parse_time_slot(text: &str, separator: &str) -> Option<TimeSlot> {
    if separator.is_empty() {
        return None;
    }
    let parts: Vec<&str> = text.trim().split(separator).collect();
    let [start, end] = parts.as_slice() else {
        return None;
    };
    Some(TimeSlot {
        start: parse_time_of_day(start)?,
        end: parse_time_of_day(end)?,
    })
}

/// Canonicalises `7:00`, `07h00`, `7h` or `07:00:00` to `07:00`.
pub fn parse_time_of_day(text: &str) -> Option<String> {
    let captures = time_re().captures(text.trim())?;
    let hours: u32 = captures.get(1)?.as_str().parse().ok()?;
    let minutes: u32 = match captures.get(2) {
        Some(minutes) => minutes.as_str().parse().ok()?,
        None => 0,
    };
    (hours < 24 && minutes < 60).then(|| format!("{hours:02}:{minutes:02}"))
}

fn minutes_of_day(text: &str) -> Option<u32> {
    let canonical = parse_time_of_day(text)?;
    let (hours, minutes) = canonical.split_once(':')?;
    Some(hours.parse::<u32>().ok()? * 60 + minutes.parse::<u32>().ok()?)
}

fn time_re() -> &'static Regex {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    TIME_RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})\s*[:hH]\s*(\d{2})?(?::\d{2})?$")
            .expect("time of day regex must compile")
    })
}
