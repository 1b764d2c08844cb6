//! Marker-delimited text codecs for visit notes and prescriptions.
//!
//! Older records keep diagnosis and complaint inside `note`, and
//! recommendations and follow-up inside `rx`, separated by fixed Ukrainian
//! markers. These functions write and read that format.

/// Marker that opens the diagnosis line of a note.
pub const DIAGNOSIS_MARKER: &str = "Діагноз:";

/// Marker that opens the complaint/history section of a note.
pub const COMPLAINT_MARKER: &str = "Скарги/анамнез:";

/// Marker that opens the recommendations section of a prescription.
pub const RECOMMENDATIONS_MARKER: &str = "Рекомендації:\n";

/// Marker that opens the follow-up section of a prescription.
pub const FOLLOW_UP_MARKER: &str = "Контроль / при погіршенні:\n";

/// Diagnosis and complaint recovered from a note.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedNote {
    pub diagnosis: String,
    pub complaint: String,
}

/// Prescription split into its sections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRx {
    pub rx: String,
    pub recommendations: String,
    pub follow_up: String,
}

/// Build a note from diagnosis and complaint.
///
/// Without a diagnosis the note is just the complaint.
pub fn build_visit_note(diagnosis: &str, complaint: &str) -> String {
    let dx = diagnosis.trim();
    let complaint = complaint.trim();

    match (dx.is_empty(), complaint.is_empty()) {
        (false, false) => format!("{} {}\n\n{} {}", DIAGNOSIS_MARKER, dx, COMPLAINT_MARKER, complaint),
        (false, true) => format!("{} {}", DIAGNOSIS_MARKER, dx),
        _ => complaint.to_string(),
    }
}

/// Recover diagnosis and complaint from a note.
///
/// Markers match in any letter case. The diagnosis runs to the end of its
/// line. A note without any marker is treated entirely as the complaint.
pub fn parse_visit_note(note: &str) -> ParsedNote {
    let diagnosis = find_marker(note, DIAGNOSIS_MARKER)
        .map(|(_, end)| {
            let rest = note[end..].trim_start();
            rest.split('\n').next().unwrap_or_default().trim().to_string()
        })
        .unwrap_or_default();

    let complaint = find_marker(note, COMPLAINT_MARKER)
        .map(|(_, end)| note[end..].trim().to_string())
        .unwrap_or_default();

    let complaint = if complaint.is_empty() && diagnosis.is_empty() {
        note.trim().to_string()
    } else {
        complaint
    };

    ParsedNote {
        diagnosis,
        complaint,
    }
}

/// First case-insensitive occurrence of `marker`, as a byte range of `text`.
fn find_marker(text: &str, marker: &str) -> Option<(usize, usize)> {
    text.char_indices()
        .find_map(|(at, _)| marker_len_at(&text[at..], marker).map(|len| (at, at + len)))
}

/// Byte length of `marker` at the start of `text`, ignoring case.
fn marker_len_at(text: &str, marker: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let mut end = 0;
    for expected in marker.chars() {
        let (at, found) = chars.next()?;
        if !found.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        end = at + found.len_utf8();
    }
    Some(end)
}

/// Combine prescription, recommendations and follow-up into one text.
pub fn build_rx_combined(rx: &str, recommendations: &str, follow_up: &str) -> String {
    let mut parts = Vec::with_capacity(3);

    let rx = rx.trim();
    if !rx.is_empty() {
        parts.push(rx.to_string());
    }
    let recommendations = recommendations.trim();
    if !recommendations.is_empty() {
        parts.push(format!("{}{}", RECOMMENDATIONS_MARKER, recommendations));
    }
    let follow_up = follow_up.trim();
    if !follow_up.is_empty() {
        parts.push(format!("{}{}", FOLLOW_UP_MARKER, follow_up));
    }

    parts.join("\n\n")
}

/// Split a combined prescription into its sections.
///
/// Sections are recognized only at the start of the text or of a line.
pub fn parse_rx_combined(text: &str) -> ParsedRx {
    let recs_at = find_section(text, RECOMMENDATIONS_MARKER);
    let follow_at = find_section(text, FOLLOW_UP_MARKER);

    let recommendations = recs_at
        .map(|at| {
            let body = &text[at + RECOMMENDATIONS_MARKER.len()..];
            let end = body
                .find(&format!("\n\n{}", FOLLOW_UP_MARKER))
                .unwrap_or(body.len());
            body[..end].trim().to_string()
        })
        .unwrap_or_default();

    let follow_up = follow_at
        .map(|at| text[at + FOLLOW_UP_MARKER.len()..].trim().to_string())
        .unwrap_or_default();

    let cut = [recs_at, follow_at]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(text.len());

    ParsedRx {
        rx: text[..cut].trim().to_string(),
        recommendations,
        follow_up,
    }
}

fn find_section(text: &str, marker: &str) -> Option<usize> {
    text.match_indices(marker)
        .map(|(at, _)| at)
        .find(|&at| at == 0 || text[..at].ends_with('\n'))
}
