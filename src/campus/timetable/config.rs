//! Course scopes and the per-course settings the extractor and reconciler
//! depend on.
//!
//! Every course ships with built-in defaults. A TOML file can override any of
//! them under a `[courses.<code>]` table:
//!
//! ```toml
//! [courses.mat]
//! time_separator = " às "
//! ignored_labels = ["Horário", "Intervalo", "Almoço"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;
use tracing::debug;

use crate::campus::timetable::error::{Result, TimetableError};

/// Weekday labels as they appear in the timetable headers, Monday first.
pub const DEFAULT_WEEKDAYS: [&str; 7] = ["SEG", "TER", "QUA", "QUI", "SEX", "SÁB", "DOM"];

/// Glyphs that turn a leading number into a period marker ("1º", "2°", "3ª").
pub const DEFAULT_ORDINAL_GLYPHS: &str = "º°ª";

/// Suffix letter of generated short codes ("1O", "2O", ...).
pub const DEFAULT_SHORT_CODE_SUFFIX: char = 'O';

const WEEKEND_LONG_FORMS: [&str; 3] = ["SÁBADO", "SABADO", "DOMINGO"];

const LONG_WEEKDAYS: [&str; 9] = [
    "SEGUNDA", "TERÇA", "TERCA", "QUARTA", "QUINTA", "SEXTA", "SÁBADO", "SABADO", "DOMINGO",
];

/// The course (curriculum) a timetable and its records belong to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum CourseScope {
    /// Computer engineering.
    #[value(name = "engcomp")]
    ComputerEngineering,
    /// Mathematics.
    #[value(name = "mat")]
    Mathematics,
    /// Physics.
    #[value(name = "fis")]
    Physics,
    /// Tourism.
    #[value(name = "tur")]
    Tourism,
}

impl CourseScope {
    pub const ALL: [CourseScope; 4] = [
        CourseScope::ComputerEngineering,
        CourseScope::Mathematics,
        CourseScope::Physics,
        CourseScope::Tourism,
    ];

    /// Code stored in the `course_code` field of canonical records.
    pub fn code(self) -> &'static str {
        match self {
            CourseScope::ComputerEngineering => "engcomp",
            CourseScope::Mathematics => "mat",
            CourseScope::Physics => "fis",
            CourseScope::Tourism => "tur",
        }
    }

    /// Resolves a course code, as used in configuration files, to its scope.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.code() == code)
    }

    fn display_name(self) -> &'static str {
        match self {
            CourseScope::ComputerEngineering => "Engenharia de Computação",
            CourseScope::Mathematics => "Matemática",
            CourseScope::Physics => "Física",
            CourseScope::Tourism => "Turismo",
        }
    }

    fn time_separator(self) -> &'static str {
        match self {
            CourseScope::ComputerEngineering => " às ",
            CourseScope::Mathematics => " - ",
            CourseScope::Physics => "-",
            CourseScope::Tourism => " - ",
        }
    }

    // Older stores identify courses by a short prefix or a 1-based numeric id.
    fn legacy_aliases(self) -> Vec<String> {
        let (prefix, id) = match self {
            CourseScope::ComputerEngineering => ("eng", 1),
            CourseScope::Mathematics => ("matematica", 2),
            CourseScope::Physics => ("fisica", 3),
            CourseScope::Tourism => ("turismo", 4),
        };
        vec![prefix.to_string(), id.to_string()]
    }
}

impl fmt::Display for CourseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Resolved settings for one course scope.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseConfig {
    pub scope: CourseScope,
    /// Course code written to new records.
    pub code: String,
    pub name: String,
    /// Other course codes that identify records of this scope in the store.
    pub aliases: Vec<String>,
    /// Token separating start and end time inside a time-slot cell.
    pub time_separator: String,
    /// Weekday vocabulary, matched case-insensitively as substrings.
    pub weekdays: Vec<String>,
    pub ordinal_glyphs: String,
    /// Cell labels that never name a subject nor a professor.
    pub ignored_labels: Vec<String>,
    /// Section label after which the subjects of a period are electives.
    pub elective_label: String,
    /// Prefix of a note such as `Horário 14:00 - 14:50` that adds another
    /// slot to the subject above it.
    pub schedule_note_label: String,
    pub short_code_suffix: char,
}

impl CourseConfig {
    /// Built-in settings for the scope.
    pub fn for_scope(scope: CourseScope) -> Self {
        Self {
            scope,
            code: scope.code().to_string(),
            name: scope.display_name().to_string(),
            aliases: scope.legacy_aliases(),
            time_separator: scope.time_separator().to_string(),
            weekdays: DEFAULT_WEEKDAYS.iter().map(|day| day.to_string()).collect(),
            ordinal_glyphs: DEFAULT_ORDINAL_GLYPHS.to_string(),
            ignored_labels: vec!["Horário".to_string(), "Intervalo".to_string()],
            elective_label: "Optativas".to_string(),
            schedule_note_label: "Horário".to_string(),
            short_code_suffix: DEFAULT_SHORT_CODE_SUFFIX,
        }
    }

    /// Built-in settings for the scope, overridden by the optional TOML file.
    pub fn load(scope: CourseScope, path: Option<&Path>) -> Result<Self> {
        let mut config = Self::for_scope(scope);
        if let Some(path) = path {
            let source = fs::read_to_string(path)?;
            let file = ConfigFile::parse(&source)?;
            if let Some(overrides) = file.courses.get(scope.code()) {
                debug!(course = scope.code(), path = %path.display(), "applying course overrides");
                overrides.apply(&mut config);
            }
        }
        Ok(config)
    }

    /// Whether a stored `course_code` belongs to this scope.
    pub fn owns(&self, course_code: &str) -> bool {
        let course_code = course_code.trim();
        course_code == self.code || self.aliases.iter().any(|alias| alias == course_code)
    }

    /// Returns the first vocabulary weekday found inside the text.
    pub fn find_weekday(&self, text: &str) -> Option<&str> {
        let upper = text.to_uppercase();
        self.weekdays
            .iter()
            .find(|day| upper.contains(&day.to_uppercase()))
            .map(String::as_str)
    }

    /// Whether one of the words of the text is a weekday, either the
    /// vocabulary token itself or a long name starting with it ("Terça").
    pub fn mentions_weekday(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        let words: Vec<&str> = upper
            .split(|ch: char| !ch.is_alphabetic())
            .filter(|word| !word.is_empty())
            .collect();
        self.weekdays.iter().map(|day| day.to_uppercase()).any(|day| {
            words.iter().any(|word| {
                *word == day || (LONG_WEEKDAYS.contains(word) && word.starts_with(&day))
            })
        })
    }

    /// Text following the schedule-note label, when the cell is such a note.
    pub fn schedule_note<'t>(&self, text: &'t str) -> Option<&'t str> {
        let label = self.schedule_note_label.trim();
        if label.is_empty() {
            return None;
        }
        let text = text.trim();
        let head = text.get(..label.len())?;
        (head.to_lowercase() == label.to_lowercase())
            .then(|| text[label.len()..].trim_start_matches([':', ' ']))
    }

    /// Whether the whole cell is a weekday label rather than content.
    pub fn is_weekday_label(&self, text: &str) -> bool {
        let upper = text
            .trim()
            .trim_end_matches(|ch: char| !ch.is_alphabetic())
            .to_uppercase();
        if upper.is_empty() {
            return false;
        }
        if WEEKEND_LONG_FORMS.contains(&upper.as_str()) {
            return true;
        }
        self.weekdays.iter().map(|day| day.to_uppercase()).any(|day| {
            upper == day || (upper.starts_with(&day) && upper.ends_with("FEIRA"))
        })
    }

    pub fn is_ignored_label(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        self.ignored_labels
            .iter()
            .any(|label| lower.starts_with(&label.to_lowercase()))
    }

    pub fn is_elective_label(&self, text: &str) -> bool {
        let lower = text.trim().trim_end_matches(':').trim().to_lowercase();
        !self.elective_label.is_empty() && lower == self.elective_label.to_lowercase()
    }
}

/// Shape of the optional TOML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub courses: BTreeMap<String, CourseOverrides>,
}

impl ConfigFile {
    /// Parses the file and rejects tables for courses that do not exist.
    pub fn parse(source: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(source)?;
        if let Some(unknown) = file
            .courses
            .keys()
            .find(|code| CourseScope::from_code(code).is_none())
        {
            return Err(TimetableError::UnknownCourse(unknown.clone()));
        }
        Ok(file)
    }
}

/// Per-course overrides; absent keys keep the built-in value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseOverrides {
    pub name: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub time_separator: Option<String>,
    pub weekdays: Option<Vec<String>>,
    pub ordinal_glyphs: Option<String>,
    pub ignored_labels: Option<Vec<String>>,
    pub elective_label: Option<String>,
    pub schedule_note_label: Option<String>,
    pub short_code_suffix: Option<char>,
}

impl CourseOverrides {
    fn apply(&self, config: &mut CourseConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(aliases) = &self.aliases {
            config.aliases = aliases.clone();
        }
        if let Some(separator) = &self.time_separator {
            config.time_separator = separator.clone();
        }
        if let Some(weekdays) = &self.weekdays {
            config.weekdays = weekdays.clone();
        }
        if let Some(glyphs) = &self.ordinal_glyphs {
            config.ordinal_glyphs = glyphs.clone();
        }
        if let Some(labels) = &self.ignored_labels {
            config.ignored_labels = labels.clone();
        }
        if let Some(label) = &self.elective_label {
            config.elective_label = label.clone();
        }
        if let Some(label) = &self.schedule_note_label {
            config.schedule_note_label = label.clone();
        }
        if let Some(suffix) = self.short_code_suffix {
            config.short_code_suffix = suffix;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_named_course() {
        let file = ConfigFile::parse(
            r#"
            [courses.mat]
            time_separator = " às "
            short_code_suffix = "M"
            "#,
        )
        .expect("config parsed");

        let mut maths = CourseConfig::for_scope(CourseScope::Mathematics);
        file.courses["mat"].apply(&mut maths);
        assert_eq!(maths.time_separator, " às ");
        assert_eq!(maths.short_code_suffix, 'M');
        assert_eq!(maths.weekdays.len(), 7);
        assert!(!file.courses.contains_key("fis"));
    }

    #[test]
    fn unknown_course_table_is_rejected() {
        let error = ConfigFile::parse("[courses.law]\nname = \"Direito\"\n").unwrap_err();
        assert!(matches!(error, TimetableError::UnknownCourse(code) if code == "law"));
    }

    #[test]
    fn scope_owns_aliases() {
        let config = CourseConfig::for_scope(CourseScope::ComputerEngineering);
        assert!(config.owns("engcomp"));
        assert!(config.owns("1"));
        assert!(config.owns("eng"));
        assert!(!config.owns("mat"));
    }

    #[test]
    fn weekday_labels_are_detected() {
        let config = CourseConfig::for_scope(CourseScope::Physics);
        assert_eq!(config.find_weekday("Segunda (SEG)"), Some("SEG"));
        assert_eq!(config.find_weekday("sáb"), Some("SÁB"));
        assert!(config.is_weekday_label("TER"));
        assert!(config.is_weekday_label("qua."));
        assert!(!config.is_weekday_label("Cálculo I"));
        assert!(!config.is_weekday_label("Termodinâmica"));
    }

    #[test]
    fn weekday_mentions_need_a_whole_word() {
        let config = CourseConfig::for_scope(CourseScope::ComputerEngineering);
        assert!(config.mentions_weekday("SEG"));
        assert!(config.mentions_weekday("Terça-feira"));
        assert!(config.mentions_weekday("Segunda (SEG)"));
        assert!(!config.mentions_weekday("QUADRO DE HORÁRIOS"));
        assert!(!config.mentions_weekday("Termodinâmica"));
    }

    #[test]
    fn schedule_notes_are_recognised() {
        let config = CourseConfig::for_scope(CourseScope::ComputerEngineering);
        assert_eq!(config.schedule_note("Horário 14:00 - 14:50"), Some("14:00 - 14:50"));
        assert_eq!(config.schedule_note("horário: 8h - 9h"), Some("8h - 9h"));
        assert_eq!(config.schedule_note("Prof. Ana"), None);
    }
}
