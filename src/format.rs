use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Byte count with two decimals in base-1024 units, e.g. `1.50 KB`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", SIZE_UNITS[unit])
}

/// Epoch seconds in local time, falling back to UTC; the raw number if out of range.
pub fn local_timestamp(epoch_secs: i64) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    timestamp_in(epoch_secs, offset)
}

pub(crate) fn timestamp_in(epoch_secs: i64, offset: UtcOffset) -> String {
    OffsetDateTime::from_unix_timestamp(epoch_secs)
        .ok()
        .and_then(|at| {
            at.to_offset(offset)
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .ok()
        })
        .unwrap_or_else(|| epoch_secs.to_string())
}
