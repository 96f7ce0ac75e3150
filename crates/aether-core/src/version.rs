//! Version parsing, ordering, ranges, and constraints.
//!
//! Versions use the Maven ordering rather than semver: segments split on `.`
//! and `-`, numeric segments compare as numbers, and well-known qualifiers
//! order as `alpha < beta < milestone < rc < snapshot < "" (release) < sp`.
//! Unknown qualifiers compare case-insensitively after the known ladder.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Version::new)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Number(u64),
    Known(Qualifier),
    Text(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        let raw = version.into();
        let segments = split_segments(&raw);
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_snapshot(&self) -> bool {
        self.raw.ends_with("-SNAPSHOT")
    }

    /// The version without a `-SNAPSHOT` suffix.
    pub fn base(&self) -> &str {
        self.raw.strip_suffix("-SNAPSHOT").unwrap_or(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let ord = cmp_segments(self.segments.get(i), other.segments.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::new(s)
    }
}

fn split_segments(version: &str) -> Vec<Segment> {
    version
        .split(['.', '-'])
        .filter(|token| !token.is_empty())
        .map(classify_token)
        .collect()
}

fn classify_token(token: &str) -> Segment {
    if let Ok(n) = token.parse::<u64>() {
        return Segment::Number(n);
    }
    match token.to_ascii_lowercase().as_str() {
        "alpha" | "a" => Segment::Known(Qualifier::Alpha),
        "beta" | "b" => Segment::Known(Qualifier::Beta),
        "milestone" | "m" => Segment::Known(Qualifier::Milestone),
        "rc" | "cr" => Segment::Known(Qualifier::Rc),
        "snapshot" => Segment::Known(Qualifier::Snapshot),
        "ga" | "final" | "release" => Segment::Known(Qualifier::Release),
        "sp" => Segment::Known(Qualifier::Sp),
        _ => Segment::Text(token.to_ascii_lowercase()),
    }
}

fn cmp_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(s), None) => cmp_to_padding(s),
        (None, Some(s)) => cmp_to_padding(s).reverse(),
        (Some(a), Some(b)) => cmp_two(a, b),
    }
}

/// Compare a segment against the implicit padding of a shorter version,
/// which behaves like the release qualifier (`1.0 == 1.0.0 == 1.0.ga`).
fn cmp_to_padding(seg: &Segment) -> Ordering {
    match seg {
        Segment::Number(0) => Ordering::Equal,
        Segment::Number(_) => Ordering::Greater,
        Segment::Known(q) => q.cmp(&Qualifier::Release),
        Segment::Text(_) => Ordering::Less,
    }
}

fn cmp_two(a: &Segment, b: &Segment) -> Ordering {
    use Segment::*;
    match (a, b) {
        (Number(a), Number(b)) => a.cmp(b),
        (Known(a), Known(b)) => a.cmp(b),
        (Number(_), Known(_) | Text(_)) => Ordering::Greater,
        (Known(_) | Text(_), Number(_)) => Ordering::Less,
        (Text(a), Text(b)) => a.cmp(b),
        (Known(q), Text(_)) => {
            if *q >= Qualifier::Release {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Text(_), Known(q)) => {
            if *q >= Qualifier::Release {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

/// One end of a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A version range expression such as `[1.0,2.0)`, `(,2.0]` or `[1.5]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    raw: String,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// Parse a range expression. Returns `None` for bare versions.
    pub fn parse(spec: &str) -> Option<Self> {
        let raw = spec.trim();
        if !is_range_syntax(raw) || raw.len() < 2 {
            return None;
        }
        let lower_inclusive = raw.starts_with('[');
        let upper_inclusive = raw.ends_with(']');
        let inner = &raw[1..raw.len() - 1];

        let (lower, upper) = match inner.split_once(',') {
            Some((lo, hi)) => {
                let bound = |text: &str, inclusive: bool| {
                    let text = text.trim();
                    (!text.is_empty()).then(|| Bound {
                        version: Version::new(text),
                        inclusive,
                    })
                };
                (bound(lo, lower_inclusive), bound(hi, upper_inclusive))
            }
            None => {
                // Single version: `[1.5]` pins exactly that version.
                let pin = Bound {
                    version: Version::new(inner.trim()),
                    inclusive: true,
                };
                (Some(pin.clone()), Some(pin))
            }
        };

        Some(Self {
            raw: raw.to_string(),
            lower,
            upper,
        })
    }

    pub fn lower(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    pub fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            let ord = version.cmp(&lower.version);
            if ord == Ordering::Less || (!lower.inclusive && ord == Ordering::Equal) {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ord = version.cmp(&upper.version);
            if ord == Ordering::Greater || (!upper.inclusive && ord == Ordering::Equal) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether a version string is a range expression rather than a single
/// (recommended) version.
pub fn is_range_syntax(spec: &str) -> bool {
    let spec = spec.trim_start();
    spec.starts_with('[') || spec.starts_with('(')
}

/// A parsed version constraint: either a range or a single recommended
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionConstraint {
    Range(VersionRange),
    Recommended(Version),
}

impl VersionConstraint {
    /// Parse a constraint expression; bare versions become recommendations.
    pub fn parse(spec: &str) -> Self {
        match VersionRange::parse(spec) {
            Some(range) => VersionConstraint::Range(range),
            None => VersionConstraint::Recommended(Version::new(spec.trim())),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, VersionConstraint::Range(_))
    }

    pub fn range(&self) -> Option<&VersionRange> {
        match self {
            VersionConstraint::Range(range) => Some(range),
            VersionConstraint::Recommended(_) => None,
        }
    }

    pub fn recommended(&self) -> Option<&Version> {
        match self {
            VersionConstraint::Range(_) => None,
            VersionConstraint::Recommended(version) => Some(version),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Range(range) => range.contains(version),
            VersionConstraint::Recommended(recommended) => recommended == version,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Range(range) => range.fmt(f),
            VersionConstraint::Recommended(version) => version.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::new(s)
    }

    #[test]
    fn numeric_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.0.1") < v("1.1.0"));
        assert!(v("1.9") < v("1.10"));
    }

    #[test]
    fn qualifier_ladder() {
        assert!(v("1.0-alpha") < v("1.0-beta"));
        assert!(v("1.0-beta") < v("1.0-milestone"));
        assert!(v("1.0-milestone") < v("1.0-rc"));
        assert!(v("1.0-rc") < v("1.0-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < v("1.0"));
        assert!(v("1.0") < v("1.0-sp"));
    }

    #[test]
    fn qualifier_aliases() {
        assert_eq!(v("1.0-a"), v("1.0-alpha"));
        assert_eq!(v("1.0-cr"), v("1.0-rc"));
        assert_eq!(v("1.0"), v("1.0.ga"));
        assert_eq!(v("1.0"), v("1.0.final"));
    }

    #[test]
    fn trailing_zeros_are_padding() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
    }

    #[test]
    fn unknown_qualifiers_sort_below_release() {
        assert!(v("1.0.0-jre") < v("1.0.0"));
        assert!(v("31.0-jre") < v("32.0-jre"));
    }

    #[test]
    fn case_insensitive_text() {
        assert_eq!(v("1.0-JRE"), v("1.0-jre"));
    }

    #[test]
    fn snapshot_detection() {
        assert!(v("1.0-SNAPSHOT").is_snapshot());
        assert_eq!(v("1.0-SNAPSHOT").base(), "1.0");
        assert!(!v("1.0").is_snapshot());
    }

    #[test]
    fn range_inclusive_bounds() {
        let range = VersionRange::parse("[1.0,2.0]").unwrap();
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.5")));
        assert!(range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));
        assert!(!range.contains(&v("2.0.1")));
    }

    #[test]
    fn range_exclusive_upper() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
    }

    #[test]
    fn range_open_lower() {
        let range = VersionRange::parse("(,2.0)").unwrap();
        assert!(range.contains(&v("0.1")));
        assert!(!range.contains(&v("2.0")));
    }

    #[test]
    fn range_exact_pin() {
        let range = VersionRange::parse("[1.5]").unwrap();
        assert!(range.contains(&v("1.5")));
        assert!(!range.contains(&v("1.4")));
        assert!(!range.contains(&v("1.6")));
    }

    #[test]
    fn bare_version_is_not_a_range() {
        assert!(VersionRange::parse("1.0").is_none());
        assert!(!is_range_syntax("1.0"));
        assert!(is_range_syntax("[1.0,)"));
    }

    #[test]
    fn constraint_forms() {
        let range = VersionConstraint::parse("[1.0,2.0)");
        assert!(range.is_range());
        assert!(range.contains(&v("1.5")));

        let soft = VersionConstraint::parse("1.0");
        assert!(!soft.is_range());
        assert!(soft.contains(&v("1.0")));
        assert!(!soft.contains(&v("1.1")));
        assert_eq!(soft.to_string(), "1.0");
    }
}
