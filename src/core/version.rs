//! Package version identifiers and version ranges.
//!
//! Versions are dotted numeric identifiers (`2024.1.1`, `2.7`, `3`) mapped onto
//! `semver::Version`, remembering how many components were written. Range bounds
//! compare on that precision, so `@:2024` contains `2024.2` and `@2` contains `2.9.1`.
//! Non-numeric identifiers such as `master` only match themselves.
//!
//! At most three components are numeric, the limit of `semver::Version`. A longer
//! identifier such as `1.2.3.4` is a named version: it orders after every numeric
//! version, matches only a range naming it exactly, and cannot be a range bound.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::condition::ConditionParseError;

/// A version identifier as declared by a package or requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    raw: String,
    numeric: Option<(Version, u8)>,
}

impl PackageVersion {
    /// Parse a version identifier. Never fails: anything that is not dotted
    /// numeric becomes a named version.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let numeric = parse_version_lenient(&raw);
        PackageVersion { raw, numeric }
    }

    /// The identifier as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version has a numeric (orderable) form.
    pub fn is_numeric(&self) -> bool {
        self.numeric.is_some()
    }

    fn semver(&self) -> Option<&Version> {
        self.numeric.as_ref().map(|(v, _)| v)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric versions order numerically; named versions sort above all numeric
/// ones and among themselves by name.
impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.semver(), other.semver()) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.raw.cmp(&other.raw)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PackageVersion::new(s))
    }
}

/// Parse a dotted numeric version with one to three components.
///
/// Returns the padded version and the number of components written.
pub fn parse_version_lenient(s: &str) -> Option<(Version, u8)> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut nums = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        nums[i] = part.parse().ok()?;
    }

    Some((Version::new(nums[0], nums[1], nums[2]), parts.len() as u8))
}

/// One end of a version interval.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    precision: u8,
}

impl Bound {
    fn parse(s: &str) -> Option<Self> {
        parse_version_lenient(s).map(|(version, precision)| Bound { version, precision })
    }

    /// Compare `v` against this bound, looking only at the components the bound spells out.
    fn compare(&self, v: &Version) -> Ordering {
        let lhs = truncate(v, self.precision);
        let rhs = truncate(&self.version, self.precision);
        lhs.cmp(&rhs)
    }
}

fn truncate(v: &Version, precision: u8) -> (u64, u64, u64) {
    match precision {
        1 => (v.major, 0, 0),
        2 => (v.major, v.minor, 0),
        _ => (v.major, v.minor, v.patch),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Interval {
    /// `lo:hi`, `lo:`, `:hi`, or `v` (both bounds equal).
    Numeric { lo: Option<Bound>, hi: Option<Bound> },
    /// A named version such as `master`.
    Named(String),
}

impl Interval {
    fn contains(&self, version: &PackageVersion) -> bool {
        match self {
            Interval::Named(name) => version.raw == *name,
            Interval::Numeric { lo, hi } => {
                let Some(v) = version.semver() else {
                    return false;
                };
                let above = lo.as_ref().map_or(true, |b| b.compare(v) != Ordering::Less);
                let below = hi.as_ref().map_or(true, |b| b.compare(v) != Ordering::Greater);
                above && below
            }
        }
    }
}

/// A union of version intervals, written as in `@2.1:`, `@:2024`, `@2020.1:2021.10,2025`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    intervals: Vec<Interval>,
}

impl VersionRange {
    /// A range matching every numeric version.
    pub fn any() -> Self {
        VersionRange {
            raw: ":".to_string(),
            intervals: vec![Interval::Numeric { lo: None, hi: None }],
        }
    }

    /// Whether `version` lies in the range. Versions without a numeric form only
    /// match named intervals, so evaluation never fails.
    pub fn contains(&self, version: &PackageVersion) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    /// The range as written, without the leading `@`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionRange {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_start_matches('@');
        if raw.is_empty() {
            return Err(ConditionParseError::new(s, "empty version range"));
        }

        let mut intervals = Vec::new();
        for piece in raw.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(ConditionParseError::new(s, "empty alternative in version range"));
            }

            let interval = match piece.split_once(':') {
                Some((lo, hi)) => {
                    let lo = parse_bound(s, lo)?;
                    let hi = parse_bound(s, hi)?;
                    if let (Some(l), Some(h)) = (&lo, &hi) {
                        if h.compare(&l.version) == Ordering::Greater {
                            return Err(ConditionParseError::new(
                                s,
                                format!("lower bound `{}` exceeds upper bound", piece),
                            ));
                        }
                    }
                    Interval::Numeric { lo, hi }
                }
                None => match Bound::parse(piece) {
                    Some(b) => Interval::Numeric {
                        lo: Some(b.clone()),
                        hi: Some(b),
                    },
                    None => Interval::Named(piece.to_string()),
                },
            };
            intervals.push(interval);
        }

        Ok(VersionRange {
            raw: raw.to_string(),
            intervals,
        })
    }
}

fn parse_bound(input: &str, s: &str) -> Result<Option<Bound>, ConditionParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    Bound::parse(s)
        .map(Some)
        .ok_or_else(|| ConditionParseError::new(input, format!("invalid version bound `{}`", s)))
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn v(s: &str) -> PackageVersion {
        PackageVersion::new(s)
    }

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version_lenient("2025.1"), Some((Version::new(2025, 1, 0), 2)));
        assert_eq!(parse_version_lenient("3"), Some((Version::new(3, 0, 0), 1)));
        assert_eq!(parse_version_lenient("2024.1.1"), Some((Version::new(2024, 1, 1), 3)));
        assert_eq!(parse_version_lenient("master"), None);
        assert_eq!(parse_version_lenient("1.2.3.4"), None);
        assert_eq!(parse_version_lenient("1..2"), None);
    }

    #[test]
    fn test_lower_bound() {
        let r = range("@2.1:");
        assert!(r.contains(&v("2.1")));
        assert!(r.contains(&v("2.1.5")));
        assert!(r.contains(&v("2024.2")));
        assert!(!r.contains(&v("2.0.9")));
    }

    #[test]
    fn test_upper_bound_is_inclusive_on_precision() {
        let r = range(":2024");
        assert!(r.contains(&v("2024.2")));
        assert!(r.contains(&v("2023.9")));
        assert!(!r.contains(&v("2025.1")));

        let gcc = range(":4.99");
        assert!(gcc.contains(&v("4.99.1")));
        assert!(gcc.contains(&v("4.8")));
        assert!(!gcc.contains(&v("5.1")));
    }

    #[test]
    fn test_exact_matches_prefix() {
        let r = range("2");
        assert!(r.contains(&v("2")));
        assert!(r.contains(&v("2.9.1")));
        assert!(!r.contains(&v("3.0")));
    }

    #[test]
    fn test_closed_interval_and_union() {
        let r = range("2020.1:2021.10,2025");
        assert!(r.contains(&v("2020.9")));
        assert!(r.contains(&v("2021.10")));
        assert!(!r.contains(&v("2023.9")));
        assert!(r.contains(&v("2025.1")));
    }

    #[test]
    fn test_named_versions_never_satisfy_numeric_ranges() {
        assert!(!range("2.1:").contains(&v("master")));
        assert!(!VersionRange::any().contains(&v("master")));
        assert!(range("master").contains(&v("master")));
    }

    #[test]
    fn test_four_components_are_named() {
        let four = v("1.2.3.4");
        assert!(!four.is_numeric());
        assert!(!range("1:").contains(&four));
        assert!(range("1.2.3.4").contains(&four));
        assert!(v("1.2.3") < four);
        assert!("1.2.3.4:".parse::<VersionRange>().is_err());
    }

    #[test]
    fn test_invalid_ranges() {
        assert!("".parse::<VersionRange>().is_err());
        assert!("3:2".parse::<VersionRange>().is_err());
        assert!("1.x:".parse::<VersionRange>().is_err());
        assert!("1,,2".parse::<VersionRange>().is_err());
        assert!("2.1:2".parse::<VersionRange>().is_ok());
    }

    #[test]
    fn test_version_ordering() {
        let mut versions = vec![v("master"), v("2024.1.1"), v("2025.1"), v("2019.9")];
        versions.sort();
        let names: Vec<_> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["2019.9", "2024.1.1", "2025.1", "master"]);
    }
}
