use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

mod legacy;

/// A `(day_index, timeslot_index)` coordinate; serialised as a two-element array.
pub type SlotRef = (usize, usize);

/// Represents the content of one spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawCell {
    /// Blank or missing cell, including the shadow of a merged range.
    Empty,
    /// Textual cell content, possibly spanning several lines.
    Text(String),
    /// Numeric cell content (numbers, dates and times stored as serials).
    Number(f64),
}

impl RawCell {
    /// Returns the text when the cell holds non-blank text.
    pub fn text(&self) -> Option<&str> {
        match self {
            RawCell::Text(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    /// Whether the cell carries no information at all.
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(value) => value.trim().is_empty(),
            RawCell::Number(value) => value.is_nan(),
        }
    }

    /// Whether the cell is text with at least one alphabetic character.
    pub fn has_alphabetic(&self) -> bool {
        self.text()
            .is_some_and(|text| text.chars().any(char::is_alphabetic))
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

/// A worksheet as a list of rows; rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub rows: Vec<Vec<RawCell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// Builds a text-only grid; empty strings become [`RawCell::Empty`].
    pub fn from_text_rows<R, S>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| RawCell::from(cell.as_ref())).collect())
            .collect();
        Self { rows }
    }

    /// Appends the rows of another grid below this one.
    pub fn extend(&mut self, other: Grid) {
        self.rows.extend(other.rows);
    }

    /// Rows that carry at least one non-blank cell.
    pub fn informative_rows(&self) -> impl Iterator<Item = &[RawCell]> {
        self.rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.is_blank()))
            .map(Vec::as_slice)
    }
}

/// A start/end pair of canonical `HH:MM` times.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

/// A weekday column of the timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub index: usize,
    pub label: String,
}

/// A subject as seen by one extraction pass, before it is merged into the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectCandidate {
    /// Normalized subject name; the key used for matching.
    pub name: String,
    /// Cell text of the first occurrence.
    pub raw_name: String,
    pub professors: Vec<String>,
    pub elective: bool,
    pub period: u32,
    pub occupancy: BTreeSet<SlotRef>,
}

impl SubjectCandidate {
    pub fn new(name: String, raw_name: String, period: u32, elective: bool) -> Self {
        Self {
            name,
            raw_name,
            professors: Vec::new(),
            elective,
            period,
            occupancy: BTreeSet::new(),
        }
    }

    /// Records a professor name once.
    pub fn add_professor(&mut self, professor: String) {
        if !professor.is_empty() && !self.professors.contains(&professor) {
            self.professors.push(professor);
        }
    }

    /// Occupancy as the sorted list stored in canonical records.
    pub fn schedule(&self) -> Vec<SlotRef> {
        self.occupancy.iter().copied().collect()
    }
}

/// Requirement that has to be met before a subject can be taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Prerequisite {
    /// Minimum number of credits already earned.
    Credits { min_credits: u32 },
    /// Reference to another subject, usually by short code.
    Subject(String),
}

impl<'de> Deserialize<'de> for Prerequisite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        legacy::prerequisite(deserializer)
    }
}

/// A subject of the canonical store.
///
/// Legacy field names (`_cu`, `_se`, `_di`, ...) and value shapes are accepted
/// on input; output always uses the canonical names. Keys the schema does not
/// know are kept in [`SubjectRecord::extra`] and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "legacy::RecordRepr")]
pub struct SubjectRecord {
    pub course_code: String,
    /// 1-based term within the course.
    pub period: u32,
    pub name: String,
    /// Unique within the course scope; empty until one is assigned.
    pub short_code: String,
    pub practical_flag: bool,
    pub theoretical_flag: bool,
    pub elective_flag: bool,
    pub active_flag: bool,
    pub prerequisites: Vec<Prerequisite>,
    /// `(day_index, timeslot_index)` pairs without duplicates.
    pub schedule: Vec<SlotRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SubjectRecord {
    /// Creates an active record for a subject seen for the first time.
    pub fn from_candidate(
        candidate: &SubjectCandidate,
        course_code: &str,
        short_code: String,
    ) -> Self {
        Self {
            course_code: course_code.to_string(),
            period: candidate.period,
            name: candidate.name.clone(),
            short_code,
            practical_flag: false,
            theoretical_flag: false,
            elective_flag: candidate.elective,
            active_flag: true,
            prerequisites: Vec::new(),
            schedule: candidate.schedule(),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_record_round_trips_with_extra_fields() {
        let value = json!({
            "course_code": "engcomp",
            "period": 2,
            "name": "Cálculo II",
            "short_code": "7O",
            "practical_flag": false,
            "theoretical_flag": true,
            "elective_flag": false,
            "active_flag": true,
            "prerequisites": ["3O", {"min_credits": 120}],
            "schedule": [[0, 1], [2, 1]],
            "_da": "observação manual"
        });

        let record: SubjectRecord = serde_json::from_value(value.clone()).expect("record parsed");
        assert_eq!(record.schedule, vec![(0, 1), (2, 1)]);
        assert_eq!(
            record.prerequisites,
            vec![
                Prerequisite::Subject("3O".into()),
                Prerequisite::Credits { min_credits: 120 }
            ]
        );
        assert_eq!(record.extra.get("_da"), Some(&json!("observação manual")));
        assert_eq!(serde_json::to_value(&record).expect("record serialised"), value);
    }

    #[test]
    fn legacy_record_is_converted() {
        let value = json!({
            "_cu": 1,
            "_se": "3",
            "_di": "Física I",
            "_re": "",
            "_ap": 2,
            "_at": 0,
            "_el": false,
            "_ag": false,
            "_pr": ["1O", 60],
            "_ho": [[false, true], [false, false], [true, true]]
        });

        let record: SubjectRecord = serde_json::from_value(value).expect("legacy record parsed");
        assert_eq!(record.course_code, "1");
        assert_eq!(record.period, 3);
        assert!(record.practical_flag);
        assert!(!record.theoretical_flag);
        assert!(record.elective_flag);
        assert!(!record.active_flag);
        assert_eq!(
            record.prerequisites[1],
            Prerequisite::Credits { min_credits: 60 }
        );
        assert_eq!(record.schedule, vec![(0, 1), (2, 0), (2, 1)]);
        assert_eq!(record.extra.get("_ap"), Some(&json!(2)));
        assert_eq!(record.extra.get("_at"), Some(&json!(0)));
    }

    #[test]
    fn legacy_mandatory_subject_survives_a_rewrite() {
        let value = json!({
            "_cu": "engcomp",
            "_se": 1,
            "_di": "Cálculo I",
            "_re": "1O",
            "_ap": 2,
            "_at": 4,
            "_el": true,
            "_ag": true,
            "_pr": [],
            "_ho": [[0, 0]]
        });

        let record: SubjectRecord = serde_json::from_value(value).expect("legacy record parsed");
        assert!(!record.elective_flag);
        assert!(record.practical_flag);
        assert!(record.theoretical_flag);

        let written = serde_json::to_value(&record).expect("record serialised");
        assert_eq!(written["elective_flag"], json!(false));
        assert_eq!(written["_ap"], json!(2));
        assert_eq!(written["_at"], json!(4));
        assert!(written.get("_el").is_none());

        let reloaded: SubjectRecord = serde_json::from_value(written).expect("record reloaded");
        assert_eq!(reloaded, record);
    }

    #[test]
    fn duplicate_schedule_pairs_are_dropped_on_load() {
        let value = json!({
            "course_code": "mat",
            "name": "Álgebra Linear",
            "schedule": [[1, 4], [1, 4], [0, 2]]
        });

        let record: SubjectRecord = serde_json::from_value(value).expect("record parsed");
        assert_eq!(record.period, 1);
        assert_eq!(record.schedule, vec![(1, 4), (0, 2)]);
        assert!(record.short_code.is_empty());
    }

    #[test]
    fn blank_rows_are_not_informative() {
        let grid = Grid::new(vec![
            vec![RawCell::Empty, RawCell::Text("  ".into())],
            vec![RawCell::Number(f64::NAN)],
            vec![RawCell::Empty, RawCell::Text("SEG".into())],
        ]);
        assert_eq!(grid.informative_rows().count(), 1);
    }
}
