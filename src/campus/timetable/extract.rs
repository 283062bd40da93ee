//! Walks a timetable grid and collects, per period, which subjects occupy
//! which (day, time slot) cells.
//!
//! The walk is a two-state machine. While [`ExtractorState::SeekingHeader`],
//! rows are skipped until one names weekdays; that row fixes the column → day
//! mapping. In [`ExtractorState::ScanningBody`] every row is classified by its
//! first informative cell as a period marker, a time-slot row, or a
//! continuation row carrying professor names and section labels.
//!
//! Periods advance on explicit ordinal markers (`2º PERÍODO`) or when a time
//! slot repeats inside the current period. A period that recorded nothing by
//! the time its first slot repeats is discarded and its ordinal reused.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::campus::timetable::config::CourseConfig;
use crate::campus::timetable::error::{Result, TimetableError};
use crate::campus::timetable::model::{Grid, RawCell, SubjectCandidate, TimeSlot};
use crate::campus::timetable::normalize::{clean_professor, normalize_subject};
use crate::campus::timetable::registry::{DayRegistry, TimeSlotRegistry, parse_time_slot};

/// Largest start plus end distance, in minutes, at which a schedule note
/// reuses an already registered slot instead of registering its own.
const NOTE_SLOT_TOLERANCE_MINUTES: u32 = 30;

/// Position of the extractor within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    SeekingHeader,
    ScanningBody,
}

/// Everything one extraction pass learned about a course's grid.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub course_code: String,
    pub days: DayRegistry,
    pub time_slots: TimeSlotRegistry,
    /// Period ordinals in the order they were opened.
    pub periods: Vec<u32>,
    /// Candidates in order of first sighting.
    pub candidates: Vec<SubjectCandidate>,
    /// Distinct professor names attached to candidates.
    pub professors: Vec<String>,
}

/// Extracts subject candidates from a grid using one course's settings.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleExtractor<'a> {
    config: &'a CourseConfig,
}

impl<'a> ScheduleExtractor<'a> {
    pub fn new(config: &'a CourseConfig) -> Self {
        Self { config }
    }

    /// Runs the state machine over every informative row of the grid.
    ///
    /// Fails with [`TimetableError::MissingHeader`] when no row names a weekday.
    pub fn extract(&self, grid: &Grid) -> Result<Extraction> {
        let mut context = ExtractionContext::new(self.config);
        for row in grid.informative_rows() {
            context.step(row);
        }
        context.finish()
    }
}

struct ExtractionContext<'a> {
    config: &'a CourseConfig,
    state: ExtractorState,
    days: DayRegistry,
    time_slots: TimeSlotRegistry,
    periods: Vec<u32>,
    current_period: Option<u32>,
    period_slots: HashSet<usize>,
    period_occupied: bool,
    elective_section: bool,
    candidates: Vec<SubjectCandidate>,
    positions: HashMap<(u32, String), usize>,
    last_in_column: HashMap<usize, usize>,
    professors: Vec<String>,
}

impl<'a> ExtractionContext<'a> {
    fn new(config: &'a CourseConfig) -> Self {
        Self {
            config,
            state: ExtractorState::SeekingHeader,
            days: DayRegistry::default(),
            time_slots: TimeSlotRegistry::new(),
            periods: Vec::new(),
            current_period: None,
            period_slots: HashSet::new(),
            period_occupied: false,
            elective_section: false,
            candidates: Vec::new(),
            positions: HashMap::new(),
            last_in_column: HashMap::new(),
            professors: Vec::new(),
        }
    }

    fn step(&mut self, row: &[RawCell]) {
        match self.state {
            ExtractorState::SeekingHeader => self.seek_header(row),
            ExtractorState::ScanningBody => self.scan_body(row),
        }
    }

    fn finish(self) -> Result<Extraction> {
        if self.state == ExtractorState::SeekingHeader {
            return Err(TimetableError::MissingHeader);
        }
        Ok(Extraction {
            course_code: self.config.code.clone(),
            days: self.days,
            time_slots: self.time_slots,
            periods: self.periods,
            candidates: self.candidates,
            professors: self.professors,
        })
    }

    fn seek_header(&mut self, row: &[RawCell]) {
        let names_weekday = row
            .iter()
            .filter_map(RawCell::text)
            .any(|text| self.config.mentions_weekday(text));
        if !names_weekday {
            return;
        }

        self.days = DayRegistry::from_header(row, self.config);
        self.state = ExtractorState::ScanningBody;
        debug!(day_count = self.days.len(), "weekday header found");

        // Headers like "1º PERÍODO | SEG | TER" also open a period.
        if let Some(ordinal) = first_informative(row).and_then(|(_, text)| self.period_marker(text)) {
            self.enter_marked_period(ordinal);
        }
    }

    fn scan_body(&mut self, row: &[RawCell]) {
        if let Some(ordinal) = first_informative(row).and_then(|(_, text)| self.period_marker(text)) {
            self.enter_marked_period(ordinal);
            return;
        }

        let separator = self.config.time_separator.as_str();
        let time_cell = row.iter().enumerate().find_map(|(column, cell)| {
            cell.text()
                .and_then(|text| parse_time_slot(text, separator))
                .map(|slot| (column, slot))
        });

        match time_cell {
            Some((column, slot)) => self.record_time_row(row, column, slot),
            None => self.record_context_row(row),
        }
    }

    /// Leading integer of a cell such as `3º PERÍODO` or `Período 2°`.
    fn period_marker(&self, text: &str) -> Option<u32> {
        let glyphs = &self.config.ordinal_glyphs;
        let mut chars = text.char_indices().peekable();
        while let Some((start, ch)) = chars.next() {
            if !ch.is_ascii_digit() {
                continue;
            }
            let mut end = start + ch.len_utf8();
            while let Some(&(at, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = at + next.len_utf8();
                chars.next();
            }
            let glyph = text[end..].trim_start().chars().next();
            if glyph.is_some_and(|glyph| glyphs.contains(glyph)) {
                return text[start..end].parse().ok().filter(|ordinal| *ordinal >= 1);
            }
        }
        None
    }

    fn enter_marked_period(&mut self, ordinal: u32) {
        if self.periods.contains(&ordinal) {
            trace!(ordinal, "period marker already registered");
            return;
        }
        self.periods.push(ordinal);
        self.open_period(ordinal);
    }

    fn open_period(&mut self, ordinal: u32) {
        debug!(period = ordinal, "period opened");
        self.current_period = Some(ordinal);
        self.reset_period_state();
    }

    fn reset_period_state(&mut self) {
        self.period_slots.clear();
        self.period_occupied = false;
        self.elective_section = false;
        self.last_in_column.clear();
    }

    fn ensure_period(&mut self) -> u32 {
        match self.current_period {
            Some(ordinal) => ordinal,
            None => {
                self.periods.push(1);
                self.open_period(1);
                1
            }
        }
    }

    fn record_time_row(&mut self, row: &[RawCell], time_column: usize, slot: TimeSlot) {
        let slot_index = self.time_slots.register_or_lookup(&slot.start, &slot.end);
        let period = self.ensure_period();

        if self.period_slots.contains(&slot_index) {
            if self.period_occupied {
                let next = period + 1;
                if !self.periods.contains(&next) {
                    self.periods.push(next);
                }
                self.open_period(next);
            } else {
                debug!(period, "discarding empty period");
                self.reset_period_state();
            }
        }
        self.period_slots.insert(slot_index);

        for (column, cell) in row.iter().enumerate().skip(time_column + 1) {
            let Some(day) = self.days.day_for_column(column) else {
                continue;
            };
            let Some(text) = cell.text() else {
                continue;
            };
            if self.apply_schedule_note(column, text) {
                continue;
            }
            if !cell.has_alphabetic()
                || self.config.is_weekday_label(text)
                || self.config.is_ignored_label(text)
            {
                continue;
            }
            if self.config.is_elective_label(text) {
                self.elective_section = true;
                continue;
            }
            self.record_occurrence(column, day, slot_index, text);
        }
    }

    fn record_occurrence(&mut self, column: usize, day: usize, slot: usize, text: &str) {
        let cell = normalize_subject(text, self.elective_section);
        if cell.name.is_empty() {
            trace!(raw = text, "subject normalized to an empty name");
            return;
        }

        let period = self.ensure_period();
        let key = (period, cell.name.clone());
        let index = match self.positions.get(&key) {
            Some(index) => *index,
            None => {
                let raw_name = text.trim().to_string();
                self.candidates
                    .push(SubjectCandidate::new(cell.name, raw_name, period, cell.elective));
                self.positions.insert(key, self.candidates.len() - 1);
                self.candidates.len() - 1
            }
        };

        let candidate = &mut self.candidates[index];
        candidate.elective |= cell.elective;
        candidate.occupancy.insert((day, slot));
        if let Some(professor) = cell.professor {
            self.attach_professor(index, professor);
        }
        self.last_in_column.insert(column, index);
        self.period_occupied = true;
    }

    fn record_context_row(&mut self, row: &[RawCell]) {
        for (column, cell) in row.iter().enumerate() {
            let Some(text) = cell.text() else {
                continue;
            };
            if !cell.has_alphabetic() || self.apply_schedule_note(column, text) {
                continue;
            }
            if self.config.is_elective_label(text) {
                debug!("elective section started");
                self.elective_section = true;
                continue;
            }
            if self.config.is_weekday_label(text) || self.config.is_ignored_label(text) {
                continue;
            }
            let subject = self.last_in_column.get(&column).copied();
            match subject {
                Some(index) => self.attach_professor(index, clean_professor(text)),
                None => trace!(column, text, "context text without a subject above it"),
            }
        }
    }

    // A "Horário 14:00 - 14:50" note adds the subject above it to that slot,
    // or to the closest registered slot. Returns whether the text was a note.
    fn apply_schedule_note(&mut self, column: usize, text: &str) -> bool {
        let Some(note) = self.config.schedule_note(text) else {
            return false;
        };
        let Some(slot) = [self.config.time_separator.as_str(), "-"]
            .into_iter()
            .find_map(|separator| parse_time_slot(note, separator))
        else {
            return false;
        };

        let subject = self.last_in_column.get(&column).copied();
        let (Some(index), Some(day)) = (subject, self.days.day_for_column(column)) else {
            trace!(column, text, "schedule note without a subject above it");
            return true;
        };
        let slot_index = self
            .time_slots
            .nearest(&slot, NOTE_SLOT_TOLERANCE_MINUTES)
            .unwrap_or_else(|| self.time_slots.register_or_lookup(&slot.start, &slot.end));
        debug!(
            subject = %self.candidates[index].name,
            day,
            slot = slot_index,
            "schedule note applied"
        );
        self.candidates[index].occupancy.insert((day, slot_index));
        true
    }

    fn attach_professor(&mut self, index: usize, professor: String) {
        if professor.is_empty() {
            return;
        }
        if !self.professors.contains(&professor) {
            self.professors.push(professor.clone());
        }
        self.candidates[index].add_professor(professor);
    }
}

fn first_informative(row: &[RawCell]) -> Option<(usize, &str)> {
    row.iter()
        .enumerate()
        .find(|(_, cell)| !cell.is_blank())
        .and_then(|(column, cell)| cell.text().map(|text| (column, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campus::timetable::config::CourseScope;

    fn engcomp() -> CourseConfig {
        CourseConfig::for_scope(CourseScope::ComputerEngineering)
    }

    fn extract(rows: Vec<Vec<&str>>) -> Extraction {
        let config = engcomp();
        ScheduleExtractor::new(&config)
            .extract(&Grid::from_text_rows(rows))
            .expect("grid extracted")
    }

    fn summary(extraction: &Extraction) -> Vec<(u32, &str, Vec<(usize, usize)>)> {
        extraction
            .candidates
            .iter()
            .map(|candidate| (candidate.period, candidate.name.as_str(), candidate.schedule()))
            .collect()
    }

    #[test]
    fn single_subject_under_header() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Cálculo I", ""],
        ]);

        assert_eq!(summary(&extraction), vec![(1, "Cálculo I", vec![(0, 0)])]);
        assert_eq!(extraction.days.days()[0].label, "SEG");
        assert_eq!(extraction.time_slots.len(), 1);
        assert_eq!(extraction.periods, vec![1]);
    }

    #[test]
    fn rows_before_header_and_blank_rows_are_ignored() {
        let extraction = extract(vec![
            vec!["HORÁRIO 2024/2", "", ""],
            vec!["07:00 às 07:50", "Ignorada", ""],
            vec!["", "", ""],
            vec!["Horário", "SEG", "TER"],
            vec!["", "  ", ""],
            vec!["07:00 às 07:50", "", "Física I"],
        ]);

        assert_eq!(summary(&extraction), vec![(1, "Física I", vec![(1, 0)])]);
    }

    #[test]
    fn repeated_slot_opens_next_period() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Cálculo I", ""],
            vec!["07:50 às 08:40", "", "Física I"],
            vec!["07:00 às 07:50", "Cálculo II", "CÁLCULO II"],
        ]);

        assert_eq!(
            summary(&extraction),
            vec![
                (1, "Cálculo I", vec![(0, 0)]),
                (1, "Física I", vec![(1, 1)]),
                (2, "Cálculo II", vec![(0, 0), (1, 0)]),
            ]
        );
        assert_eq!(extraction.periods, vec![1, 2]);
    }

    #[test]
    fn empty_period_is_discarded_and_ordinal_reused() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "", ""],
            vec!["07:50 às 08:40", "---", "12"],
            vec!["07:00 às 07:50", "Álgebra Linear", ""],
            vec!["07:50 às 08:40", "", "Álgebra Linear"],
        ]);

        assert_eq!(
            summary(&extraction),
            vec![(1, "Álgebra Linear", vec![(0, 0), (1, 1)])]
        );
        assert_eq!(extraction.periods, vec![1]);
    }

    #[test]
    fn explicit_markers_set_the_period() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["1º PERÍODO", "", ""],
            vec!["07:00 às 07:50", "Cálculo I", ""],
            vec!["3º PERÍODO", "", ""],
            vec!["07:00 às 07:50", "Física II", ""],
            vec!["3º PERÍODO", "", ""],
            vec!["07:50 às 08:40", "Física II", ""],
        ]);

        assert_eq!(
            summary(&extraction),
            vec![
                (1, "Cálculo I", vec![(0, 0)]),
                (3, "Física II", vec![(0, 0), (0, 1)]),
            ]
        );
        assert_eq!(extraction.periods, vec![1, 3]);
    }

    #[test]
    fn header_row_can_carry_the_first_marker() {
        let extraction = extract(vec![
            vec!["2º PERÍODO", "SEG", "TER"],
            vec!["07:00 às 07:50", "", "Estruturas de Dados"],
        ]);

        assert_eq!(
            summary(&extraction),
            vec![(2, "Estruturas de Dados", vec![(1, 0)])]
        );
    }

    #[test]
    fn professors_come_from_second_lines_and_rows_below() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "CÁLCULO I", "FÍSICA I\nProf. Rui"],
            vec!["", "Prof. Ana / Prof. Bia", ""],
            vec!["Intervalo", "", ""],
        ]);

        assert_eq!(extraction.candidates[0].professors, vec!["Prof. Ana"]);
        assert_eq!(extraction.candidates[1].professors, vec!["Prof. Rui"]);
        assert_eq!(extraction.professors, vec!["Prof. Rui", "Prof. Ana"]);
    }

    #[test]
    fn elective_section_and_markers_flag_candidates() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Compiladores", "Redes - OPT"],
            vec!["Optativas:", "", ""],
            vec!["07:50 às 08:40", "Visão Computacional", ""],
            vec!["2º PERÍODO", "", ""],
            vec!["07:00 às 07:50", "Algoritmos", ""],
        ]);

        let flags: Vec<(&str, bool)> = extraction
            .candidates
            .iter()
            .map(|candidate| (candidate.name.as_str(), candidate.elective))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("Compiladores", false),
                ("Redes", true),
                ("Visão Computacional", true),
                ("Algoritmos", false),
            ]
        );
    }

    #[test]
    fn non_subject_cells_are_not_occurrences() {
        let config = engcomp();
        let grid = Grid::new(vec![
            vec![RawCell::Empty, "SEG".into(), "TER".into(), "QUA".into()],
            vec![
                "07:00 às 07:50".into(),
                RawCell::Number(3.0),
                "123 / 45".into(),
                "TER".into(),
            ],
            vec!["07:50 às 08:40".into(), "INTERVALO".into(), RawCell::Empty, RawCell::Empty],
        ]);

        let extraction = ScheduleExtractor::new(&config)
            .extract(&grid)
            .expect("grid extracted");
        assert!(extraction.candidates.is_empty());
    }

    #[test]
    fn malformed_time_text_falls_through() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Cálculo I", ""],
            vec!["07:00 as 07:50", "Física I", ""],
        ]);

        assert_eq!(summary(&extraction), vec![(1, "Cálculo I", vec![(0, 0)])]);
        assert_eq!(extraction.candidates[0].professors, vec!["Física I"]);
    }

    #[test]
    fn columns_without_a_day_are_skipped() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Cálculo I", "", "Sem dia"],
        ]);

        assert_eq!(summary(&extraction), vec![(1, "Cálculo I", vec![(0, 0)])]);
    }

    #[test]
    fn schedule_note_adds_the_noted_slot() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "", "Física I"],
            vec!["", "", "Horário 14:00 - 14:50"],
            vec!["14:00 às 14:50", "Cálculo I", ""],
        ]);

        assert_eq!(
            summary(&extraction),
            vec![
                (1, "Física I", vec![(1, 0), (1, 1)]),
                (1, "Cálculo I", vec![(0, 1)]),
            ]
        );
        assert_eq!(extraction.time_slots.len(), 2);
        assert!(extraction.candidates[0].professors.is_empty());
    }

    #[test]
    fn schedule_note_snaps_to_a_close_slot() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Redes", ""],
            vec!["07:50 às 08:40", "Horário 07:55 - 08:40", ""],
        ]);

        assert_eq!(summary(&extraction), vec![(1, "Redes", vec![(0, 0), (0, 1)])]);
        assert_eq!(extraction.time_slots.len(), 2);
    }

    #[test]
    fn title_row_with_weekday_substring_is_not_the_header() {
        let extraction = extract(vec![
            vec!["QUADRO DE HORÁRIOS", "", ""],
            vec!["", "SEG", "TER"],
            vec!["07:00 às 07:50", "Cálculo I", ""],
        ]);

        assert_eq!(extraction.days.days()[0].label, "SEG");
        assert_eq!(summary(&extraction), vec![(1, "Cálculo I", vec![(0, 0)])]);
    }

    #[test]
    fn missing_header_is_an_error() {
        let config = engcomp();
        let grid = Grid::from_text_rows(vec![vec!["07:00 às 07:50", "Cálculo I"]]);
        let error = ScheduleExtractor::new(&config).extract(&grid).unwrap_err();
        assert!(matches!(error, TimetableError::MissingHeader));
    }

    #[test]
    fn occupancy_stays_within_registry_bounds() {
        let extraction = extract(vec![
            vec!["", "SEG", "TER", "QUA"],
            vec!["07:00 às 07:50", "A1", "B1", "C1"],
            vec!["07:50 às 08:40", "A1", "", "C1"],
            vec!["08:40 às 09:30", "", "B1", ""],
            vec!["07:00 às 07:50", "D2", "", "D2"],
            vec!["07:50 às 08:40", "D2", "E2", ""],
        ]);

        for candidate in &extraction.candidates {
            for (day, slot) in &candidate.occupancy {
                assert!(*day < extraction.days.len());
                assert!(*slot < extraction.time_slots.len());
            }
        }
        assert_eq!(extraction.periods, vec![1, 2]);
    }
}
