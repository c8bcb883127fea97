//! Version comparison for dependency checks.
//!
//! Only MAJOR.MINOR.PATCH take part in the comparison. Anything after the
//! first `-` and any component past the third are ignored, so `1.2.3-rc1`
//! and `1.2.3.4` both compare as `1.2.3`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::SemVersion;

/// Outcome of comparing a source version against a target (minimum) version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VersionComparison {
    /// Source could not be parsed.
    SourceInvalid,
    /// Source is empty.
    SourceEmpty,
    /// Source is newer than target.
    SourceGreater,
    Equal,
    /// Source is older than target.
    SourceLess,
    /// No target given; nothing to satisfy.
    TargetEmpty,
    /// Target could not be parsed.
    TargetInvalid,
}

impl VersionComparison {
    /// Whether the source meets the target as a minimum version.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            VersionComparison::TargetEmpty
                | VersionComparison::Equal
                | VersionComparison::SourceGreater
        )
    }
}

/// Reduce a version string to its MAJOR.MINOR.PATCH part.
pub fn pure_semver(input: &str) -> String {
    let release = input.split('-').next().unwrap_or_default();
    release
        .split('.')
        .take(3)
        .collect::<Vec<_>>()
        .join(".")
        .trim()
        .to_string()
}

/// Parse a version leniently: optional `v` prefix, one to three numeric
/// components (missing ones are zero), optional `-pre` / `+build` suffix.
pub fn parse(input: &str) -> Option<SemVersion> {
    let pure = pure_semver(input);
    let pure = pure.split('+').next().unwrap_or_default();
    let pure = pure.strip_prefix('v').unwrap_or(pure);
    if pure.is_empty() {
        return None;
    }

    let mut parts = [0u64; 3];
    for (slot, part) in parts.iter_mut().zip(pure.split('.')) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    Some(SemVersion::new(parts[0], parts[1], parts[2]))
}

/// Compare `source` against the minimum `target`.
///
/// The target is checked first: an empty target is always satisfied.
pub fn compare_versions(source: &str, target: &str) -> VersionComparison {
    if pure_semver(target).is_empty() {
        return VersionComparison::TargetEmpty;
    }
    let Some(target) = parse(target) else {
        return VersionComparison::TargetInvalid;
    };

    if pure_semver(source).is_empty() {
        return VersionComparison::SourceEmpty;
    }
    let Some(source) = parse(source) else {
        return VersionComparison::SourceInvalid;
    };

    match source.cmp(&target) {
        Ordering::Greater => VersionComparison::SourceGreater,
        Ordering::Equal => VersionComparison::Equal,
        Ordering::Less => VersionComparison::SourceLess,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_semver_strips_suffixes() {
        assert_eq!(pure_semver("1.2.3-rc1"), "1.2.3");
        assert_eq!(pure_semver("1.2.3.4"), "1.2.3");
        assert_eq!(pure_semver(" 1.2 "), "1.2");
        assert_eq!(pure_semver(""), "");
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(parse("v1.2.3"), Some(SemVersion::new(1, 2, 3)));
        assert_eq!(parse("1.2"), Some(SemVersion::new(1, 2, 0)));
        assert_eq!(parse("7"), Some(SemVersion::new(7, 0, 0)));
        assert_eq!(parse("1.2.3+build.5"), Some(SemVersion::new(1, 2, 3)));
        assert_eq!(parse("one.two"), None);
        assert_eq!(parse("1..2"), None);
    }

    #[test]
    fn test_outcomes() {
        assert_eq!(compare_versions("1.2.0", ""), VersionComparison::TargetEmpty);
        assert_eq!(compare_versions("1.2.0", "x.y"), VersionComparison::TargetInvalid);
        assert_eq!(compare_versions("", "1.0.0"), VersionComparison::SourceEmpty);
        assert_eq!(compare_versions("abc", "1.0.0"), VersionComparison::SourceInvalid);
        assert_eq!(compare_versions("1.2.0", "1.2.0"), VersionComparison::Equal);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), VersionComparison::SourceGreater);
        assert_eq!(compare_versions("1.1.0", "1.2.0"), VersionComparison::SourceLess);
    }

    #[test]
    fn test_prerelease_ignored() {
        assert_eq!(compare_versions("1.2.0-beta", "1.2.0"), VersionComparison::Equal);
    }

    #[test]
    fn test_satisfied_set() {
        assert!(VersionComparison::TargetEmpty.is_satisfied());
        assert!(VersionComparison::Equal.is_satisfied());
        assert!(VersionComparison::SourceGreater.is_satisfied());
        assert!(!VersionComparison::SourceLess.is_satisfied());
        assert!(!VersionComparison::SourceEmpty.is_satisfied());
        assert!(!VersionComparison::SourceInvalid.is_satisfied());
        assert!(!VersionComparison::TargetInvalid.is_satisfied());
    }

    #[test]
    fn test_monotonic_in_source() {
        let target = "2.3.4";
        let versions = ["1.0.0", "2.3.3", "2.3.4", "2.3.5", "2.4.0", "3.0.0"];
        let satisfied: Vec<bool> = versions
            .iter()
            .map(|v| compare_versions(v, target).is_satisfied())
            .collect();
        assert_eq!(satisfied, vec![false, false, true, true, true, true]);
    }
}
