//! Dotted numeric versions and prefix constraints.
//!
//! Versions order component-wise. When one version is a strict prefix of
//! another the shorter one sorts first, so `0.1 < 0.1.0`: a missing trailing
//! component is "earlier", never an implicit zero. Release resolution and the
//! version cache both depend on this ordering, so it must not be swapped for
//! semantic-version equality when reused elsewhere.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

const ANY: &str = "*";

/// Parses a dotted list of unsigned integers.
fn parse_components(text: &str) -> Result<Vec<u32>, ParseError> {
    let trimmed = text.trim();
    trimmed
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::new(trimmed, part));
            }
            part.parse::<u32>()
                .map_err(|_| ParseError::new(trimmed, part))
        })
        .collect()
}

fn write_components(parts: &[u32], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            f.write_str(".")?;
        }
        write!(f, "{part}")?;
    }
    Ok(())
}

/// A released version such as `0.3.1`.
///
/// # Examples
/// ```
/// use reproto_launcher::Version;
///
/// let short: Version = "0.1".parse()?;
/// let long: Version = "0.1.0".parse()?;
/// assert!(short < long);
/// assert_eq!(long.to_string(), "0.1.0");
/// # Ok::<(), reproto_launcher::ParseError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    parts: Vec<u32>,
}

impl Version {
    /// Parses a dotted version string.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] naming the offending component when any part is
    /// empty, non-numeric, or does not fit in a `u32`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parse_components(text).map(|parts| Self { parts })
    }

    /// Returns the numeric components in order.
    #[must_use]
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slice ordering is lexicographic with a strict prefix sorting first,
        // which is exactly the shorter-is-earlier rule.
        self.parts.as_slice().cmp(other.parts.as_slice())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(&self.parts, f)
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A version prefix such as `0.3` used to filter candidate releases.
///
/// # Examples
/// ```
/// use reproto_launcher::{Constraint, Version};
///
/// let constraint = Constraint::parse("0.1")?;
/// assert!(constraint.matches(&Version::parse("0.1.99")?));
/// assert!(!constraint.matches(&Version::parse("0.2.99")?));
/// # Ok::<(), reproto_launcher::ParseError>(())
/// ```
///
/// The empty constraint, written `*`, matches every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Constraint {
    parts: Vec<u32>,
}

impl Constraint {
    /// Parses a dotted constraint string using the same grammar as [`Version`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when any component is malformed.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim() == ANY {
            return Ok(Self::any());
        }
        parse_components(text).map(|parts| Self { parts })
    }

    /// A constraint satisfied by every version.
    #[must_use]
    pub const fn any() -> Self {
        Self { parts: Vec::new() }
    }

    /// Returns `true` when `version` starts with every component of this
    /// constraint. A version shorter than the constraint never matches.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        version.parts().starts_with(&self.parts)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str(ANY);
        }
        write_components(&self.parts, f)
    }
}

impl FromStr for Constraint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Picks the highest version from `candidates` that satisfies `constraint`.
///
/// Each candidate is parsed on the fly; entries that fail to parse are
/// reported through `on_invalid` and skipped rather than aborting the scan.
pub(crate) fn latest_matching<'a, I, F>(
    candidates: I,
    constraint: &Constraint,
    mut on_invalid: F,
) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&'a str, &ParseError),
{
    candidates
        .into_iter()
        .filter_map(|raw| match Version::parse(raw) {
            Ok(version) => Some(version),
            Err(err) => {
                on_invalid(raw, &err);
                None
            }
        })
        .filter(|version| constraint.matches(version))
        .max()
}
