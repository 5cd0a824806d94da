//! LIST line formatting.
//!
//! Entries read from disk get a UNIX `ls -l` style line built from their
//! native attributes. Drives and shortcuts have no attributes and get one
//! fixed line.

use chrono::{DateTime, Duration, Utc};

use crate::namespace::{DirEntry, FileAttr, FileType};

/// Entries older than this show the year instead of the time of day.
const RECENT_DAYS: i64 = 180;

/// The listing line for a synthesized directory (a drive or a shortcut).
pub fn synthetic_line(name: &str) -> String {
    format!("drwxr-xr-x   1 owner    group           0 Jan 01  1970 {name}\r\n")
}

/// The listing line for any entry, relative to the current time.
pub fn list_line(entry: &DirEntry) -> String {
    list_line_at(entry, Utc::now())
}

/// Same as [`list_line`] with an explicit "now".
pub fn list_line_at(entry: &DirEntry, now: DateTime<Utc>) -> String {
    let Some(attr) = &entry.attr else {
        return synthetic_line(&entry.name);
    };
    format!(
        "{} {:>3} {:<8} {:<8} {:>8} {} {}\r\n",
        mode_string(attr),
        1,
        "owner",
        "group",
        attr.size,
        timestamp(attr, now),
        entry.name
    )
}

/// The NLST line: just the name.
pub fn name_line(entry: &DirEntry) -> String {
    format!("{}\r\n", entry.name)
}

fn mode_string(attr: &FileAttr) -> &'static str {
    match (attr.kind, attr.readonly) {
        (FileType::Directory, false) => "drwxr-xr-x",
        (FileType::Directory, true) => "dr-xr-xr-x",
        (FileType::Symlink, _) => "lrwxrwxrwx",
        (FileType::File, false) => "-rw-r--r--",
        (FileType::File, true) => "-r--r--r--",
    }
}

fn timestamp(attr: &FileAttr, now: DateTime<Utc>) -> String {
    let mtime: DateTime<Utc> = attr.mtime.into();
    if now.signed_duration_since(mtime) > Duration::days(RECENT_DAYS) || mtime > now {
        mtime.format("%b %d  %Y").to_string()
    } else {
        mtime.format("%b %d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::SystemTime;

    fn file(name: &str, size: u64, mtime: DateTime<Utc>) -> DirEntry {
        DirEntry {
            name: name.into(),
            kind: FileType::File,
            attr: Some(FileAttr {
                size,
                kind: FileType::File,
                mtime: SystemTime::from(mtime),
                readonly: false,
            }),
        }
    }

    #[test]
    fn synthetic_lines_are_fixed() {
        assert_eq!(
            synthetic_line("Disc_C"),
            "drwxr-xr-x   1 owner    group           0 Jan 01  1970 Disc_C\r\n"
        );
        assert_eq!(
            list_line(&DirEntry::synthetic_directory("D")),
            "drwxr-xr-x   1 owner    group           0 Jan 01  1970 D\r\n"
        );
    }

    #[test]
    fn native_lines_use_attributes() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let recent = file("report.txt", 1234, Utc.with_ymd_and_hms(2024, 5, 30, 8, 15, 0).unwrap());
        assert_eq!(
            list_line_at(&recent, now),
            "-rw-r--r--   1 owner    group        1234 May 30 08:15 report.txt\r\n"
        );

        let old = file("old.txt", 5, Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(
            list_line_at(&old, now),
            "-rw-r--r--   1 owner    group           5 Jan 02  2020 old.txt\r\n"
        );
    }

    #[test]
    fn nlst_is_bare_names() {
        assert_eq!(name_line(&DirEntry::synthetic_directory("C")), "C\r\n");
    }
}
