use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::campus::timetable::config::CourseConfig;
use crate::campus::timetable::error::{Result, TimetableError};
use crate::campus::timetable::extract::{Extraction, ScheduleExtractor};
use crate::campus::timetable::io::{excel_write, grid_read, store};
use crate::campus::timetable::reconcile::{ReconcileSummary, reconcile};
use crate::campus::timetable::tabulate::build_workbook;

/// How a store synchronisation run behaves.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Worksheet to read; all worksheets when absent.
    pub sheet: Option<String>,
    /// Start from an empty store when the store file does not exist yet.
    pub create_store: bool,
    /// Reconcile and report without writing the store.
    pub dry_run: bool,
}

/// Reads a timetable workbook and extracts the course's subject candidates.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), course = %config.code)
)]
pub fn extract_workbook(input: &Path, sheet: Option<&str>, config: &CourseConfig) -> Result<Extraction> {
    if !input.exists() {
        return Err(TimetableError::MissingInput(input.to_path_buf()));
    }
    let grid = grid_read::read_grid(input, sheet)?;
    debug!(row_count = grid.rows.len(), "grid read");
    let extraction = ScheduleExtractor::new(config).extract(&grid)?;
    info!(
        candidate_count = extraction.candidates.len(),
        day_count = extraction.days.len(),
        slot_count = extraction.time_slots.len(),
        period_count = extraction.periods.len(),
        "timetable extracted"
    );
    Ok(extraction)
}

/// Extracts the workbook and writes the extraction as JSON to `output`, or
/// to standard output when no path is given.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn extract_to_json(
    input: &Path,
    output: Option<&Path>,
    sheet: Option<&str>,
    config: &CourseConfig,
) -> Result<()> {
    let extraction = extract_workbook(input, sheet, config)?;
    let document = extraction_document(&extraction);
    match output {
        Some(path) => store::write_json_atomically(path, &document),
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &document)?;
            writeln!(stdout)?;
            Ok(())
        }
    }
}

/// JSON view of an extraction: registries, periods, candidates and professors.
pub fn extraction_document(extraction: &Extraction) -> Value {
    json!({
        "course_code": extraction.course_code,
        "days": extraction.days.days(),
        "time_slots": extraction.time_slots.slots(),
        "periods": extraction.periods,
        "candidates": extraction.candidates,
        "professors": extraction.professors,
    })
}

/// Extracts the workbook, reconciles it into the canonical store and writes
/// the store back. Nothing is written unless every step succeeded.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), store = %store_path.display(), course = %config.code)
)]
pub fn sync_store(
    input: &Path,
    store_path: &Path,
    config: &CourseConfig,
    options: &SyncOptions,
) -> Result<ReconcileSummary> {
    let extraction = extract_workbook(input, options.sheet.as_deref(), config)?;

    let persisted = match store::load_store(store_path) {
        Err(TimetableError::MissingStore(_)) if options.create_store => {
            warn!("store does not exist yet, starting from an empty one");
            Vec::new()
        }
        other => other?,
    };
    let persisted_count = persisted.len();

    let reconciliation = reconcile(persisted, &extraction.candidates, config);
    let summary = reconciliation.summary;
    info!(
        persisted = persisted_count,
        matched = summary.matched,
        created = summary.created,
        deactivated = summary.deactivated,
        codes_assigned = summary.codes_assigned,
        folded = summary.folded,
        "store reconciled"
    );

    if options.dry_run {
        info!("dry run, store left untouched");
    } else {
        store::save_store(store_path, &reconciliation.records)?;
    }
    Ok(summary)
}

/// Materialises the canonical store as a review workbook, one sheet per course.
#[instrument(
    level = "info",
    skip_all,
    fields(store = %store_path.display(), output = %output.display())
)]
pub fn export_workbook(store_path: &Path, output: &Path) -> Result<()> {
    let records = store::load_store(store_path)?;
    let workbook = build_workbook(&records)?;
    debug!(sheet_count = workbook.tables.len(), "workbook constructed");
    excel_write::write_workbook(output, &workbook)
}
