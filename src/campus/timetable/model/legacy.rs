//! Lenient readers for the value shapes older stores were written with.

use std::collections::BTreeMap;

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{Prerequisite, SlotRef, SubjectRecord};

/// On-disk shape of a record, canonical or legacy.
///
/// Legacy `_el` means "mandatory", the opposite of `elective_flag`. Legacy
/// `_ap`/`_at` are credit counts; they set the matching flag and are kept in
/// `extra` so the counts survive a rewrite.
#[derive(Deserialize)]
pub(super) struct RecordRepr {
    #[serde(alias = "_cu", deserialize_with = "course_code")]
    course_code: String,
    #[serde(alias = "_se", default = "first_period", deserialize_with = "period")]
    period: u32,
    #[serde(alias = "_di")]
    name: String,
    #[serde(alias = "_re", default, deserialize_with = "text")]
    short_code: String,
    #[serde(default, deserialize_with = "flag")]
    practical_flag: bool,
    #[serde(default, deserialize_with = "flag")]
    theoretical_flag: bool,
    #[serde(default, deserialize_with = "optional_flag")]
    elective_flag: Option<bool>,
    #[serde(rename = "_el", default, deserialize_with = "optional_flag")]
    mandatory: Option<bool>,
    #[serde(rename = "_ap", default)]
    practical_credits: Option<Value>,
    #[serde(rename = "_at", default)]
    theoretical_credits: Option<Value>,
    #[serde(alias = "_ag", default, deserialize_with = "flag")]
    active_flag: bool,
    #[serde(alias = "_pr", default, deserialize_with = "prerequisites")]
    prerequisites: Vec<Prerequisite>,
    #[serde(alias = "_ho", default, deserialize_with = "schedule")]
    schedule: Vec<SlotRef>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl From<RecordRepr> for SubjectRecord {
    fn from(repr: RecordRepr) -> Self {
        let mut extra = repr.extra;
        let practical = credit_flag(repr.practical_credits.as_ref());
        let theoretical = credit_flag(repr.theoretical_credits.as_ref());
        if let Some(credits) = repr.practical_credits {
            extra.insert("_ap".to_string(), credits);
        }
        if let Some(credits) = repr.theoretical_credits {
            extra.insert("_at".to_string(), credits);
        }

        Self {
            course_code: repr.course_code,
            period: repr.period,
            name: repr.name,
            short_code: repr.short_code,
            practical_flag: repr.practical_flag || practical,
            theoretical_flag: repr.theoretical_flag || theoretical,
            elective_flag: repr
                .elective_flag
                .or(repr.mandatory.map(|mandatory| !mandatory))
                .unwrap_or(false),
            active_flag: repr.active_flag,
            prerequisites: repr.prerequisites,
            schedule: repr.schedule,
            extra,
        }
    }
}

// Credit counts, booleans or numeric text; anything else counts as unset.
fn credit_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|credits| credits != 0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().is_ok_and(|credits| credits != 0.0),
        _ => false,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrerequisiteRepr {
    Credits { min_credits: u32 },
    // Bare integers were credit thresholds in the first store layout.
    Count(u32),
    Reference(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScheduleRepr {
    Pairs(Vec<SlotRef>),
    // day × slot matrix of booleans
    Matrix(Vec<Vec<bool>>),
}

fn first_period() -> u32 {
    1
}

fn course_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(code)) => Ok(code),
        Some(Scalar::Int(id)) => Ok(id.to_string()),
        Some(Scalar::Float(id)) if id.fract() == 0.0 => Ok((id as i64).to_string()),
        _ => Err(D::Error::custom("course code must be a string or an integer id")),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => String::new(),
        Some(Scalar::Text(value)) => value,
        Some(Scalar::Int(value)) => value.to_string(),
        Some(Scalar::Float(value)) => value.to_string(),
        Some(Scalar::Bool(value)) => value.to_string(),
    })
}

fn period<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let period = match Option::<Scalar>::deserialize(deserializer)? {
        None => return Ok(first_period()),
        Some(Scalar::Int(value)) => value,
        Some(Scalar::Float(value)) if value.fract() == 0.0 => value as i64,
        Some(Scalar::Text(value)) if value.trim().is_empty() => return Ok(first_period()),
        Some(Scalar::Text(value)) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("invalid period '{value}'")))?,
        Some(_) => return Err(D::Error::custom("period must be an integer")),
    };
    u32::try_from(period)
        .ok()
        .filter(|period| *period >= 1)
        .ok_or_else(|| D::Error::custom(format!("period must be >= 1, found {period}")))
}

/// Booleans, non-zero numbers and textual booleans.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(optional_flag(deserializer)?.unwrap_or(false))
}

fn optional_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Bool(value)) => Ok(Some(value)),
        Some(Scalar::Int(value)) => Ok(Some(value != 0)),
        Some(Scalar::Float(value)) => Ok(Some(value != 0.0)),
        Some(Scalar::Text(value)) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "sim" | "verdadeiro" => Ok(Some(true)),
            "false" | "0" | "" | "não" | "nao" | "falso" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid flag value '{other}'"))),
        },
    }
}

pub(super) fn prerequisite<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Prerequisite, D::Error> {
    Ok(match PrerequisiteRepr::deserialize(deserializer)? {
        PrerequisiteRepr::Credits { min_credits } | PrerequisiteRepr::Count(min_credits) => {
            Prerequisite::Credits { min_credits }
        }
        PrerequisiteRepr::Reference(reference) => Prerequisite::Subject(reference),
    })
}

fn prerequisites<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Prerequisite>, D::Error> {
    Ok(Option::<Vec<Prerequisite>>::deserialize(deserializer)?.unwrap_or_default())
}

fn schedule<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SlotRef>, D::Error> {
    let pairs: Vec<SlotRef> = match Option::<ScheduleRepr>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ScheduleRepr::Pairs(pairs)) => pairs,
        Some(ScheduleRepr::Matrix(days)) => days
            .iter()
            .enumerate()
            .flat_map(|(day, slots)| {
                slots
                    .iter()
                    .enumerate()
                    .filter(|(_, occupied)| **occupied)
                    .map(move |(slot, _)| (day, slot))
            })
            .collect(),
    };

    let mut unique = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if !unique.contains(&pair) {
            unique.push(pair);
        }
    }
    Ok(unique)
}
