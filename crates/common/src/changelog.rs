// Human-readable `change_log.txt` rendering of a version record.

use crate::timestamp;
use crate::types::VersionRecord;

pub const CHANGE_LOG_FILE: &str = "change_log.txt";

/// Render the change log for `record`. There is no trailing newline.
///
/// The output depends only on the record's fields, so the copy in the
/// version directory and the copy in the latest directory are identical.
pub fn render_change_log(record: &VersionRecord) -> String {
    format!(
        "Commit Hash: {}\nCommit Date: {}\nCommit Message: {}\nVersion: {}",
        record.commit_hash,
        timestamp::format(&record.commit_date),
        record.commit_message,
        record.version,
    )
}
