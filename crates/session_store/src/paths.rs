use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::SessionStoreError;

pub const DEFAULT_STORE_FILE: &str = "openai.env";

/// Compact sortable stamp used as backup suffix, e.g. `20240111-015113`.
pub fn backup_timestamp(now: OffsetDateTime) -> Result<String, SessionStoreError> {
    now.format(format_description!(
        "[year][month][day]-[hour][minute][second]"
    ))
    .map_err(SessionStoreError::ClockFormat)
}

/// Sibling backup path `<file>.<stamp>`, with `-<n>` appended for `attempt > 0`.
#[must_use]
pub fn backup_path(store_path: &Path, stamp: &str, attempt: u32) -> PathBuf {
    let file_name = store_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_STORE_FILE.to_string());
    let suffix = if attempt == 0 {
        stamp.to_string()
    } else {
        format!("{stamp}-{attempt}")
    };
    store_path.with_file_name(format!("{file_name}.{suffix}"))
}

pub(crate) fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Directory that receives temporary files for atomic replacement.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
