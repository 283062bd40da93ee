//! Merges freshly extracted candidates into the canonical store.
//!
//! Records are matched on normalized names inside one course scope. A match
//! receives the new schedule and is reactivated; short codes, prerequisites and
//! credit flags stay as curated. Unmatched candidates become new records and
//! unmatched records are deactivated, never removed.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::campus::timetable::config::CourseConfig;
use crate::campus::timetable::model::{SubjectCandidate, SubjectRecord};
use crate::campus::timetable::normalize::normalize_name;

/// Counters describing what a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub created: usize,
    pub deactivated: usize,
    /// Short codes generated for matched records that had none.
    pub codes_assigned: usize,
    /// Candidates folded into an earlier candidate of the same name.
    pub folded: usize,
}

/// The updated store plus a summary of the changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<SubjectRecord>,
    pub summary: ReconcileSummary,
}

/// Reconciles `persisted` with the candidates of one extraction for `scope`.
///
/// Records of other courses are carried over unchanged. Applying the same
/// candidates twice leaves the records of the first application unchanged.
pub fn reconcile(
    persisted: Vec<SubjectRecord>,
    extracted: &[SubjectCandidate],
    scope: &CourseConfig,
) -> Reconciliation {
    let mut summary = ReconcileSummary::default();
    let candidates = fold_by_name(extracted, &mut summary);

    let mut records = persisted;
    let persisted_len = records.len();

    let normalized: Vec<Option<String>> = records
        .iter()
        .map(|record| scope.owns(&record.course_code).then(|| normalize_name(&record.name)))
        .collect();

    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (index, name) in normalized.iter().enumerate() {
        if let Some(name) = name {
            by_name.entry(name.as_str()).or_insert(index);
        }
    }

    let mut used_codes: HashSet<String> = records
        .iter()
        .zip(&normalized)
        .filter(|(record, name)| name.is_some() && !record.short_code.trim().is_empty())
        .map(|(record, _)| record.short_code.trim().to_string())
        .collect();

    let mut matched_names: HashSet<&str> = HashSet::new();
    for candidate in &candidates {
        match by_name.get(candidate.name.as_str()) {
            Some(&index) => {
                let record = &mut records[index];
                record.schedule = candidate.schedule();
                record.active_flag = true;
                if record.short_code.trim().is_empty() {
                    record.short_code = claim_short_code(&mut used_codes, scope.short_code_suffix);
                    summary.codes_assigned += 1;
                }
                matched_names.insert(candidate.name.as_str());
                summary.matched += 1;
            }
            None => {
                let short_code = claim_short_code(&mut used_codes, scope.short_code_suffix);
                debug!(name = %candidate.name, %short_code, "new subject");
                records.push(SubjectRecord::from_candidate(candidate, &scope.code, short_code));
                summary.created += 1;
            }
        }
    }

    for (record, name) in records[..persisted_len].iter_mut().zip(&normalized) {
        let Some(name) = name else {
            continue;
        };
        if !matched_names.contains(name.as_str()) && record.active_flag {
            debug!(name = %record.name, "subject no longer scheduled");
            record.active_flag = false;
            summary.deactivated += 1;
        }
    }

    Reconciliation { records, summary }
}

/// First `"{n}{suffix}"` code, counting from 1, that is not in use.
pub fn next_short_code(used: &HashSet<String>, suffix: char) -> String {
    (1u32..)
        .map(|n| format!("{n}{suffix}"))
        .find(|code| !used.contains(code))
        .unwrap_or_default()
}

fn claim_short_code(used: &mut HashSet<String>, suffix: char) -> String {
    let code = next_short_code(used, suffix);
    used.insert(code.clone());
    code
}

// The same subject may be listed under several periods; the first sighting
// keeps its period and absorbs the occupancy of the others. Names are
// normalized again so that both sides of a match share one canonical form.
fn fold_by_name(
    extracted: &[SubjectCandidate],
    summary: &mut ReconcileSummary,
) -> Vec<SubjectCandidate> {
    let mut folded: Vec<SubjectCandidate> = Vec::with_capacity(extracted.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for candidate in extracted {
        let name = normalize_name(&candidate.name);
        if name.is_empty() {
            continue;
        }
        match positions.get(&name) {
            Some(&index) => {
                let first = &mut folded[index];
                first.occupancy.extend(candidate.occupancy.iter().copied());
                first.elective |= candidate.elective;
                for professor in &candidate.professors {
                    first.add_professor(professor.clone());
                }
                summary.folded += 1;
            }
            None => {
                let mut candidate = candidate.clone();
                candidate.name = name.clone();
                positions.insert(name, folded.len());
                folded.push(candidate);
            }
        }
    }
    folded
}
