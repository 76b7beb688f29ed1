//! Extracts publish records from a job's log text.

use regex_lite::Regex;

use crate::static_lazy_lock;

static_lazy_lock! {
    PUBLISHED: Regex =
        Regex::new(r"--- Published package (\S+) version (\S+) ---").unwrap();
}

static_lazy_lock! {
    UPLOADED_WITH_DIGEST: Regex =
        Regex::new(r"--- Uploaded package (\S+) as a GitHub artifact \(SHA256: (\S+)\) ---")
            .unwrap();
}

static_lazy_lock! {
    UPLOADED: Regex =
        Regex::new(r"--- Uploaded package (\S+) as a GitHub artifact ---").unwrap();
}

/// One marker line a producing job emits when it publishes a package.
///
/// Matching is case-sensitive and anchored to the literal marker text; the
/// captured fields are maximal runs of non-whitespace characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishMarker {
    /// `--- Published package <name> version <version> ---`
    Published { name: String, version: String },
    /// `--- Uploaded package <name> as a GitHub artifact ---`
    Uploaded { name: String },
    /// `--- Uploaded package <name> as a GitHub artifact (SHA256: <hash>) ---`
    UploadedWithDigest { name: String, hash: String },
}

impl PublishMarker {
    /// Parses a single log line, ignoring anything around the marker (the
    /// runner prefixes every line with a timestamp).
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(caps) = UPLOADED_WITH_DIGEST.captures(line) {
            return Some(Self::UploadedWithDigest {
                name: caps[1].to_owned(),
                hash: caps[2].to_owned(),
            });
        }
        if let Some(caps) = UPLOADED.captures(line) {
            return Some(Self::Uploaded {
                name: caps[1].to_owned(),
            });
        }
        if let Some(caps) = PUBLISHED.captures(line) {
            return Some(Self::Published {
                name: caps[1].to_owned(),
                version: caps[2].to_owned(),
            });
        }
        None
    }
}

/// One distinct package a job's log claims was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub name: String,
    pub version: Option<String>,
    pub hash: Option<String>,
}

impl PublishRecord {
    /// The de-duplication key: `(name, version)` when a version is tracked,
    /// else the name alone.
    pub fn key(&self) -> (&str, Option<&str>) {
        (&self.name, self.version.as_deref())
    }
}

impl From<PublishMarker> for PublishRecord {
    fn from(marker: PublishMarker) -> Self {
        match marker {
            PublishMarker::Published { name, version } => Self {
                name,
                version: Some(version),
                hash: None,
            },
            PublishMarker::Uploaded { name } => Self {
                name,
                version: None,
                hash: None,
            },
            PublishMarker::UploadedWithDigest { name, hash } => Self {
                name,
                version: None,
                hash: Some(hash),
            },
        }
    }
}

/// Scans a raw job log for publish markers.
///
/// Lines are split on `\r?\n` and matched independently; non-matching lines
/// are ignored. The result preserves first-seen order and is de-duplicated by
/// [`PublishRecord::key`], first occurrence winning. A log without markers
/// yields an empty set.
pub fn scan_log(log: &str) -> Vec<PublishRecord> {
    let mut records: Vec<PublishRecord> = Vec::new();

    for line in log.lines() {
        let Some(marker) = PublishMarker::parse(line) else {
            continue;
        };
        let record = PublishRecord::from(marker);
        if !records.iter().any(|seen| seen.key() == record.key()) {
            records.push(record);
        }
    }

    records
}

/// Chooses the record to verify for a target package.
///
/// Among records matching the name (and version, when one is requested), a
/// record carrying a hash wins over the hashless marker variants; otherwise
/// the first match is kept.
pub fn pick_record<'a>(
    records: &'a [PublishRecord],
    package: &str,
    version: Option<&str>,
) -> Option<&'a PublishRecord> {
    let mut fallback = None;

    for record in records {
        if record.name != package {
            continue;
        }
        if version.is_some() && record.version.as_deref() != version {
            continue;
        }
        if record.hash.is_some() {
            return Some(record);
        }
        if fallback.is_none() {
            fallback = Some(record);
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_without_markers_yields_nothing() {
        let log = "2024-05-01T10:00:00Z Restoring packages\r\n2024-05-01T10:00:01Z Build succeeded\n";
        assert!(scan_log(log).is_empty());
    }

    #[test]
    fn uploaded_with_digest_is_captured() {
        let log = "--- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: abc123) ---";
        let records = scan_log(log);
        assert_eq!(
            records,
            vec![PublishRecord {
                name: String::from("demo.1.0.0.nupkg"),
                version: None,
                hash: Some(String::from("abc123")),
            }]
        );
    }

    #[test]
    fn timestamp_prefixes_do_not_hide_markers() {
        let log = "2024-05-01T10:00:02Z --- Published package demo version 1.0.0 ---";
        let records = scan_log(log);
        assert_eq!(records[0].version.as_deref(), Some("1.0.0"));
        assert_eq!(records[0].hash, None);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let log = "--- published package demo version 1.0.0 ---";
        assert!(scan_log(log).is_empty());
    }

    #[test]
    fn duplicates_keep_the_first_occurrence() {
        let log = "\
--- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: first) ---
--- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: second) ---
--- Uploaded package other.nupkg as a GitHub artifact ---";
        let records = scan_log(log);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash.as_deref(), Some("first"));
        assert_eq!(records[1].name, "other.nupkg");
    }

    #[test]
    fn versioned_records_dedupe_per_version() {
        let log = "\
--- Published package demo version 1.0.0 ---
--- Published package demo version 1.0.1 ---
--- Published package demo version 1.0.0 ---";
        let records = scan_log(log);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn hashed_record_wins_over_a_hashless_one() {
        let log = "\
--- Published package demo.1.0.0.nupkg version 1.0.0 ---
--- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: abc123) ---";
        let records = scan_log(log);
        assert_eq!(records.len(), 2);

        let picked = pick_record(&records, "demo.1.0.0.nupkg", None).unwrap();
        assert_eq!(picked.hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn version_filter_narrows_the_pick() {
        let log = "\
--- Published package demo version 1.0.0 ---
--- Published package demo version 1.0.1 ---";
        let records = scan_log(log);

        let picked = pick_record(&records, "demo", Some("1.0.1")).unwrap();
        assert_eq!(picked.version.as_deref(), Some("1.0.1"));
        assert!(pick_record(&records, "demo", Some("2.0.0")).is_none());
        assert!(pick_record(&records, "missing", None).is_none());
    }

    #[test]
    fn plain_upload_marker_has_no_hash() {
        let marker =
            PublishMarker::parse("--- Uploaded package demo.nupkg as a GitHub artifact ---")
                .unwrap();
        assert_eq!(
            marker,
            PublishMarker::Uploaded {
                name: String::from("demo.nupkg")
            }
        );
    }
}
