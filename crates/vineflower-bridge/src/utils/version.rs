use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch[-pre][+build]` engine version.
///
/// Snapshot builds carry their timestamped build identifier as the
/// pre-release part, e.g. `1.10.0-20240505.053810-63`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Option<String>,
    build: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid version: {0}")]
pub struct VersionParseError(String);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
            build: None,
        }
    }

    /// Parse a version string, returning `None` when it isn't a three-part version.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (rest, build) = match text.split_once('+') {
            Some((r, b)) if !b.is_empty() => (r, Some(b.to_string())),
            Some(_) => return None,
            None => (text, None),
        };
        let (core, pre_release) = match rest.split_once('-') {
            Some((c, p)) if !p.is_empty() => (c, Some(p.to_string())),
            Some(_) => return None,
            None => (rest, None),
        };

        let mut numbers = core.split('.');
        let major = parse_number(numbers.next()?)?;
        let minor = parse_number(numbers.next()?)?;
        let patch = parse_number(numbers.next()?)?;
        if numbers.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            pre_release,
            build,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }

    pub fn is_snapshot(&self) -> bool {
        self.pre_release.is_some()
    }

    /// The repository directory a snapshot build lives under, e.g. `1.10.0-SNAPSHOT`.
    pub fn snapshot_line(&self) -> String {
        format!("{}.{}.{}-SNAPSHOT", self.major, self.minor, self.patch)
    }

    fn split_parts(s: &str) -> Vec<Part> {
        let mut parts = Vec::new();
        let mut current_numeric = true;
        let mut current_start = 0;

        let chars: Vec<char> = s.chars().collect();
        for i in 0..chars.len() {
            let c = chars[i];
            let is_digit = c.is_ascii_digit();

            if i == 0 {
                current_numeric = is_digit;
            } else if is_digit != current_numeric || c == '.' || c == '-' {
                let part_str: String = chars[current_start..i].iter().collect();
                push_part(&mut parts, part_str, current_numeric);

                if c == '.' || c == '-' {
                    current_start = i + 1;
                    if i + 1 < chars.len() {
                        current_numeric = chars[i + 1].is_ascii_digit();
                    }
                } else {
                    current_start = i;
                    current_numeric = is_digit;
                }
            }
        }

        if current_start < chars.len() {
            let part_str: String = chars[current_start..].iter().collect();
            push_part(&mut parts, part_str, current_numeric);
        }

        parts
    }
}

fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn push_part(parts: &mut Vec<Part>, part_str: String, numeric: bool) {
    if part_str.is_empty() || part_str == "." || part_str == "-" {
        return;
    }
    if numeric {
        parts.push(Part::Numeric(part_str.parse().unwrap_or(0)));
    } else {
        parts.push(Part::String(part_str));
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Numeric(u64),
    String(String),
}

fn compare_tags(a: &str, b: &str) -> Ordering {
    let a_parts = Version::split_parts(a);
    let b_parts = Version::split_parts(b);
    for (ap, bp) in a_parts.iter().zip(b_parts.iter()) {
        match ap.cmp(bp) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a_parts.len().cmp(&b_parts.len())
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                // pre-release builds sort before the release they lead up to
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_tags(a, b),
            })
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or_else(|| VersionParseError(s.to_string()))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(Version::parse(a)?.cmp(&Version::parse(b)?))
}
