//! Derives sibling SQLite paths for the event queue and session store from
//! `AppConfig::metadata_db_path` (§4.8 — the config model has a single
//! metadata path; this binary is the only place that needs the other two,
//! so it derives them here rather than growing the shared config struct).

use std::path::{Path, PathBuf};

pub fn event_queue_path(metadata_db_path: &str) -> PathBuf {
    sibling(metadata_db_path, "events.sqlite3")
}

pub fn session_store_path(metadata_db_path: &str) -> PathBuf {
    sibling(metadata_db_path, "sessions.sqlite3")
}

fn sibling(metadata_db_path: &str, file_name: &str) -> PathBuf {
    let path = Path::new(metadata_db_path);
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_siblings_in_the_same_directory() {
        assert_eq!(
            event_queue_path("./vnform-data/metadata.sqlite3"),
            PathBuf::from("./vnform-data/events.sqlite3")
        );
        assert_eq!(
            session_store_path("./vnform-data/metadata.sqlite3"),
            PathBuf::from("./vnform-data/sessions.sqlite3")
        );
    }

    #[test]
    fn falls_back_to_bare_filename_when_path_has_no_parent() {
        assert_eq!(event_queue_path("metadata.sqlite3"), PathBuf::from("events.sqlite3"));
    }
}
