//! Cleaning of raw cell text into canonical subject names.
//!
//! The pipeline is fixed and ordered: trim, strip the elective marker, handle
//! section suffixes, split off the professor line, title-case with word
//! fix-ups, collapse whitespace. Its output is a fixed point of the pipeline,
//! which is what makes name matching across runs reliable.

/// Marks a subject as elective when it appears in the cell text.
const ELECTIVE_MARKER: &str = " - opt";

/// Words kept in lower case unless they open the name.
const CONNECTIVES: [&str; 18] = [
    "de", "da", "do", "das", "dos", "a", "à", "ao", "aos", "para", "com", "sem", "em", "o", "e",
    "um", "uma", "usando",
];

/// Casing corrections applied to whole words after title-casing.
const CASING_FIXES: [(&str, &str); 12] = [
    ("Ii", "II"),
    ("Iii", "III"),
    ("Iv", "IV"),
    ("Vi", "VI"),
    ("Vii", "VII"),
    ("Viii", "VIII"),
    ("Ix", "IX"),
    ("Xi", "XI"),
    ("Xii", "XII"),
    ("Tcc", "TCC"),
    ("Iot", "IoT"),
    ("Ia", "IA"),
];

/// Result of cleaning one subject cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCell {
    /// Canonical subject name; empty when nothing usable was left.
    pub name: String,
    pub elective: bool,
    /// Second line of a multi-line cell, cleaned as a professor name.
    pub professor: Option<String>,
}

/// Cleans a subject cell. `source_elective` is used when the text itself
/// carries no elective marker.
pub fn normalize_subject(raw: &str, source_elective: bool) -> NormalizedCell {
    let text = raw.trim();
    let elective = source_elective || find_ignore_ascii_case(text, ELECTIVE_MARKER).is_some();

    let mut lines = text.lines();
    let mut name = lines.next().unwrap_or_default().trim().to_string();
    let professor = lines
        .next()
        .map(clean_professor)
        .filter(|professor| !professor.is_empty());

    if let Some(at) = find_ignore_ascii_case(&name, ELECTIVE_MARKER) {
        name.truncate(at);
    }
    let name = strip_section_suffix(name.trim_end().to_string());

    NormalizedCell {
        name: fix_words(&title_case(&name)),
        elective,
        professor,
    }
}

/// Canonical name of a subject, ignoring elective and professor side data.
pub fn normalize_name(raw: &str) -> String {
    normalize_subject(raw, false).name
}

/// Cleans free text naming a professor: only the part before a `/` is kept and
/// line breaks become spaces.
pub fn clean_professor(raw: &str) -> String {
    let head = raw.split('/').next().unwrap_or_default();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

// " - A" and " -A" are cut at their first occurrence. A " -B" marker drops the
// last two characters of the name and appends "- B", whatever those characters
// were; a name already ending in "- B" is left alone.
fn strip_section_suffix(mut text: String) -> String {
    if let Some(at) = find_ignore_ascii_case(&text, " - a") {
        text.truncate(at);
    } else if let Some(at) = find_ignore_ascii_case(&text, " -a") {
        text.truncate(at);
    } else if find_ignore_ascii_case(&text, " -b").is_some() && !ends_with_section_b(&text) {
        let keep = text.chars().count().saturating_sub(2);
        text = text.chars().take(keep).collect();
        text.push_str("- B");
    }
    text
}

fn ends_with_section_b(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 3 && bytes[bytes.len() - 3..].eq_ignore_ascii_case(b"- b")
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut inside_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if inside_word {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            inside_word = true;
        } else {
            output.push(ch);
            inside_word = false;
        }
    }
    output
}

fn fix_words(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(position, word)| fix_word(position, word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn fix_word(position: usize, word: &str) -> String {
    let core_start = word
        .find(|ch: char| ch.is_alphanumeric())
        .unwrap_or(word.len());
    let core_end = word
        .rfind(|ch: char| ch.is_alphanumeric())
        .map(|at| at + word[at..].chars().next().map_or(0, char::len_utf8))
        .unwrap_or(core_start);
    let (prefix, rest) = word.split_at(core_start);
    let (core, suffix) = rest.split_at(core_end.saturating_sub(core_start));

    let lowered = core.to_lowercase();
    let fixed = if position > 0 && CONNECTIVES.contains(&lowered.as_str()) {
        lowered
    } else {
        CASING_FIXES
            .iter()
            .find(|(from, _)| *from == core)
            .map(|(_, to)| to.to_string())
            .unwrap_or_else(|| core.to_string())
    };
    format!("{prefix}{fixed}{suffix}")
}

// The needle must be ASCII so that a match always ends on a char boundary.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    let bytes = haystack.as_bytes();
    haystack
        .char_indices()
        .map(|(at, _)| at)
        .find(|&at| {
            bytes.len() - at >= needle.len() && bytes[at..at + needle.len()].eq_ignore_ascii_case(needle)
        })
}
