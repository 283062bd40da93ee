use std::collections::{BTreeMap, HashSet};

use crate::campus::timetable::error::Result;
use crate::campus::timetable::model::{Prerequisite, SubjectRecord};

/// Column headers of every course sheet, in order.
pub const RECORD_COLUMNS: [&str; 10] = [
    "course_code",
    "period",
    "name",
    "short_code",
    "practical_flag",
    "theoretical_flag",
    "elective_flag",
    "active_flag",
    "prerequisites",
    "schedule",
];

/// Separator between prerequisites inside one cell.
pub const PREREQUISITE_SEPARATOR: &str = "; ";

/// A typed worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Represents all tables required to materialise the Excel workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

/// Lays the canonical store out as one sheet per course code, rows ordered
/// by period and then by their position in the store.
pub fn build_workbook(records: &[SubjectRecord]) -> Result<WorkbookData> {
    let mut by_course: BTreeMap<&str, Vec<&SubjectRecord>> = BTreeMap::new();
    for record in records {
        by_course
            .entry(record.course_code.as_str())
            .or_default()
            .push(record);
    }

    let mut sheet_names = SheetNameRegistry::default();
    let mut tables = Vec::with_capacity(by_course.len());
    for (course_code, mut course_records) in by_course {
        course_records.sort_by_key(|record| record.period);
        let rows = course_records
            .into_iter()
            .map(record_row)
            .collect::<Result<Vec<_>>>()?;
        tables.push(SheetTable {
            sheet_name: sheet_names.assign(course_code),
            columns: RECORD_COLUMNS.iter().map(|column| column.to_string()).collect(),
            rows,
        });
    }

    Ok(WorkbookData { tables })
}

fn record_row(record: &SubjectRecord) -> Result<Vec<CellValue>> {
    let prerequisites = record
        .prerequisites
        .iter()
        .map(|prerequisite| match prerequisite {
            Prerequisite::Subject(reference) => reference.clone(),
            Prerequisite::Credits { min_credits } => format!("CREDITS:{min_credits}"),
        })
        .collect::<Vec<_>>()
        .join(PREREQUISITE_SEPARATOR);

    Ok(vec![
        CellValue::Text(record.course_code.clone()),
        CellValue::Number(f64::from(record.period)),
        CellValue::Text(record.name.clone()),
        CellValue::Text(record.short_code.clone()),
        CellValue::Bool(record.practical_flag),
        CellValue::Bool(record.theoretical_flag),
        CellValue::Bool(record.elective_flag),
        CellValue::Bool(record.active_flag),
        CellValue::Text(prerequisites),
        CellValue::Text(serde_json::to_string(&record.schedule)?),
    ])
}

#[derive(Debug, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let prefix: String = base.chars().take(31 - suffix.len()).collect();
            let candidate = format!("{prefix}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "Sheet".to_string();
    }
    sanitized.chars().take(31).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<SubjectRecord> {
        serde_json::from_value(serde_json::json!([
            {"course_code": "mat", "period": 2, "name": "Análise", "short_code": "2O",
             "active_flag": true, "prerequisites": ["1O", {"min_credits": 30}], "schedule": [[1, 0]]},
            {"course_code": "engcomp", "period": 1, "name": "Cálculo I", "short_code": "1O",
             "active_flag": false, "schedule": []},
            {"course_code": "mat", "period": 1, "name": "Cálculo I", "short_code": "1O",
             "active_flag": true, "schedule": [[0, 0], [2, 0]]}
        ]))
        .expect("records parsed")
    }

    #[test]
    fn one_sheet_per_course_sorted_by_period() {
        let workbook = build_workbook(&records()).expect("workbook built");
        let names: Vec<&str> = workbook.tables.iter().map(|t| t.sheet_name.as_str()).collect();
        assert_eq!(names, ["engcomp", "mat"]);

        let maths = &workbook.tables[1];
        assert_eq!(maths.columns.len(), RECORD_COLUMNS.len());
        assert_eq!(maths.rows[0][2], CellValue::Text("Cálculo I".into()));
        assert_eq!(maths.rows[0][9], CellValue::Text("[[0,0],[2,0]]".into()));
        assert_eq!(maths.rows[1][8], CellValue::Text("1O; CREDITS:30".into()));
        assert_eq!(maths.rows[1][1], CellValue::Number(2.0));
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        let mut registry = SheetNameRegistry::default();
        assert_eq!(registry.assign("eng/comp"), "eng_comp");
        assert_eq!(registry.assign("eng:comp"), "eng_comp_1");
        assert_eq!(registry.assign("  "), "Sheet");
    }
}
