//! Version numbers and the range constraints that govern them.
//!
//! Elm versions are plain `MAJOR.MINOR.PATCH` triples with no prerelease or
//! build metadata, ordered componentwise. Package manifests restrict their
//! dependencies with two-sided ranges written `1.0.0 <= v < 2.0.0`; both
//! bounds are always present and each comparator is `<` or `<=`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing version or constraint text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The text is not a `MAJOR.MINOR.PATCH` triple.
    #[error("malformed version `{text}`: expected three dot-separated numbers like `2.0.3`")]
    MalformedVersion { text: String },
    /// The text is not a two-sided range like `1.0.0 <= v < 2.0.0`.
    #[error("malformed constraint `{text}`: expected the form `1.0.0 <= v < 2.0.0`")]
    MalformedConstraint { text: String },
}

/// A package version: `MAJOR.MINOR.PATCH`.
///
/// Ordering is componentwise, so `1.2.0 < 1.10.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::MalformedVersion { text: text.to_string() };
        let mut parts = text.split('.');
        let major = parse_component(parts.next()).ok_or_else(malformed)?;
        let minor = parse_component(parts.next()).ok_or_else(malformed)?;
        let patch = parse_component(parts.next()).ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(Self { major, minor, patch })
    }
}

/// Parses one version component: decimal digits only, no signs.
fn parse_component(part: Option<&str>) -> Option<u64> {
    let part = part?;
    if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// A comparator on one side of a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Strict `<`.
    Less,
    /// Inclusive `<=`.
    LessOrEqual,
}

impl Op {
    const fn as_str(self) -> &'static str {
        match self {
            Op::Less => "<",
            Op::LessOrEqual => "<=",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Op::Less),
            "<=" => Some(Op::LessOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A two-sided version range, written `LOWER op v op UPPER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub lower: Version,
    pub lower_op: Op,
    pub upper_op: Op,
    pub upper: Version,
}

impl Constraint {
    #[must_use]
    pub const fn new(lower: Version, lower_op: Op, upper_op: Op, upper: Version) -> Self {
        Self { lower, lower_op, upper_op, upper }
    }

    /// The constraint satisfied only by `version` itself.
    #[must_use]
    pub const fn from_exact(version: Version) -> Self {
        Self::new(version, Op::LessOrEqual, Op::LessOrEqual, version)
    }

    /// Whether `version` falls inside this range.
    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        let above_lower = match self.lower_op {
            Op::Less => self.lower < *version,
            Op::LessOrEqual => self.lower <= *version,
        };
        let below_upper = match self.upper_op {
            Op::Less => *version < self.upper,
            Op::LessOrEqual => *version <= self.upper,
        };
        above_lower && below_upper
    }

    /// Whether no version at all can satisfy this range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.lower.cmp(&self.upper) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => {
                self.lower_op != Op::LessOrEqual || self.upper_op != Op::LessOrEqual
            }
        }
    }

    /// Narrows to the range both constraints allow, or `None` when the
    /// ranges are disjoint.
    #[must_use]
    pub fn intersect(&self, other: &Constraint) -> Option<Constraint> {
        let (lower, lower_op) = match self.lower.cmp(&other.lower) {
            Ordering::Greater => (self.lower, self.lower_op),
            Ordering::Less => (other.lower, other.lower_op),
            Ordering::Equal => (self.lower, stricter(self.lower_op, other.lower_op)),
        };
        let (upper, upper_op) = match self.upper.cmp(&other.upper) {
            Ordering::Less => (self.upper, self.upper_op),
            Ordering::Greater => (other.upper, other.upper_op),
            Ordering::Equal => (self.upper, stricter(self.upper_op, other.upper_op)),
        };
        let merged = Constraint::new(lower, lower_op, upper_op, upper);
        if merged.is_empty() {
            None
        } else {
            Some(merged)
        }
    }
}

/// Picks the tighter of two comparators applied to the same bound version.
const fn stricter(a: Op, b: Op) -> Op {
    match (a, b) {
        (Op::LessOrEqual, Op::LessOrEqual) => Op::LessOrEqual,
        _ => Op::Less,
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} v {} {}",
            self.lower, self.lower_op, self.upper_op, self.upper
        )
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::MalformedConstraint { text: text.to_string() };
        let mut tokens = text.split_whitespace();
        let lower = tokens.next().ok_or_else(malformed)?;
        let lower_op = tokens.next().ok_or_else(malformed)?;
        let var = tokens.next().ok_or_else(malformed)?;
        let upper_op = tokens.next().ok_or_else(malformed)?;
        let upper = tokens.next().ok_or_else(malformed)?;
        if tokens.next().is_some() || var != "v" {
            return Err(malformed());
        }
        Ok(Self {
            lower: lower.parse().map_err(|_| malformed())?,
            lower_op: Op::parse(lower_op).ok_or_else(malformed)?,
            upper_op: Op::parse(upper_op).ok_or_else(malformed)?,
            upper: upper.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
