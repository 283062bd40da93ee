//! Core library for the timetable-sync command line application.
//!
//! The library turns a hand-maintained timetable workbook into canonical
//! subject records and keeps a persisted store of those records in step with
//! each new extraction. IO adapters live under [`campus::timetable::io`], the
//! record types in [`campus::timetable::model`], the grid walk in
//! [`campus::timetable::extract`], the store merge in
//! [`campus::timetable::reconcile`], and the end-to-end pipelines under
//! [`campus::timetable::sync`].

pub mod campus;

pub use campus::timetable::{
    Result, TimetableError, config, error, extract, io, model, normalize, reconcile, registry,
    sync, tabulate,
};
