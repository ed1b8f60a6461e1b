use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_id: i64,
    pub unty_file_no: String,
    pub file_seq: i64,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Reuses the caller's attachment group or opens a new one.
pub fn resolve_group(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Group ids become directory names under the upload root, so only ASCII
/// alphanumerics and `-` are accepted.
pub fn is_valid_group(group: &str) -> bool {
    !group.is_empty()
        && group.len() <= 64
        && group.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

/// Spaces become `_`; only Hangul syllables, ASCII alphanumerics, `_`, `.` and `-` survive.
/// Returns `None` when nothing usable is left or the name is only dots.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| if ch == ' ' { '_' } else { ch })
        .filter(|ch| {
            ch.is_ascii_alphanumeric()
                || matches!(ch, '_' | '.' | '-')
                || ('\u{AC00}'..='\u{D7A3}').contains(ch)
        })
        .collect();

    if cleaned.chars().all(|ch| ch == '.') {
        return None;
    }
    Some(cleaned)
}
