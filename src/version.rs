use crate::error::{MvxError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Parsed tool version: `major[.minor[.patch]][-pre][+build]`, optionally
/// prefixed with `v`. Only the major component is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl Version {
    pub fn new(major: u64) -> Self {
        Self {
            major,
            minor: None,
            patch: None,
            pre: None,
            build: None,
        }
    }

    pub fn with_minor(major: u64, minor: u64) -> Self {
        let mut version = Self::new(major);
        version.minor = Some(minor);
        version
    }

    pub fn with_patch(major: u64, minor: u64, patch: u64) -> Self {
        let mut version = Self::with_minor(major, minor);
        version.patch = Some(patch);
        version
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Total order over versions. Missing minor/patch compare as zero, a
    /// pre-release sorts below the corresponding release, and pre-release
    /// strings compare lexically. Build metadata does not participate.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.unwrap_or(0).cmp(&other.minor.unwrap_or(0)))
            .then(self.patch.unwrap_or(0).cmp(&other.patch.unwrap_or(0)))
            .then(match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl FromStr for Version {
    type Err = MvxError;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if stripped.is_empty() {
            return Err(MvxError::InvalidVersion(input.to_string()));
        }

        let (rest, build) = match stripped.split_once('+') {
            Some((head, tail)) if !tail.is_empty() => (head, Some(tail.to_string())),
            Some(_) => return Err(MvxError::InvalidVersion(input.to_string())),
            None => (stripped, None),
        };

        let (numbers, pre) = match rest.split_once('-') {
            Some((head, tail)) if !tail.is_empty() => (head, Some(tail.to_string())),
            Some(_) => return Err(MvxError::InvalidVersion(input.to_string())),
            None => (rest, None),
        };

        if let Some(pre) = &pre {
            if !pre
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            {
                return Err(MvxError::InvalidVersion(input.to_string()));
            }
        }

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(MvxError::InvalidVersion(input.to_string()));
        }

        let parse_component = |s: &str| -> Result<u64> {
            s.parse::<u64>()
                .map_err(|_| MvxError::InvalidVersion(input.to_string()))
        };

        Ok(Version {
            major: parse_component(parts[0])?,
            minor: parts.get(1).map(|s| parse_component(s)).transpose()?,
            patch: parts.get(2).map(|s| parse_component(s)).transpose()?,
            pre,
            build,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// User-visible version constraint, inferred from the number of literal dots
/// in the raw text: none for a major constraint, one for major.minor, two for
/// an exact version. Empty or `latest` matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    Major(u64),
    Minor(u64, u64),
    Exact(Version),
}

impl VersionSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(VersionSpec::Latest);
        }

        let version: Version = trimmed.parse()?;
        let numeric = trimmed
            .trim_start_matches('v')
            .split(['-', '+'])
            .next()
            .unwrap_or("");

        match numeric.matches('.').count() {
            0 => Ok(VersionSpec::Major(version.major)),
            1 => Ok(VersionSpec::Minor(version.major, version.minor.unwrap_or(0))),
            2 => Ok(VersionSpec::Exact(version)),
            _ => Err(MvxError::InvalidVersion(raw.to_string())),
        }
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            VersionSpec::Latest => true,
            VersionSpec::Major(major) => candidate.major == *major,
            VersionSpec::Minor(major, minor) => {
                candidate.major == *major && candidate.minor.unwrap_or(0) == *minor
            }
            VersionSpec::Exact(version) => {
                candidate.major == version.major
                    && candidate.minor.unwrap_or(0) == version.minor.unwrap_or(0)
                    && candidate.patch.unwrap_or(0) == version.patch.unwrap_or(0)
                    && candidate.pre == version.pre
            }
        }
    }

    /// True when an exact constraint can skip the remote index entirely.
    pub fn is_exact(&self) -> bool {
        matches!(self, VersionSpec::Exact(_))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Major(major) => write!(f, "{}", major),
            VersionSpec::Minor(major, minor) => write!(f, "{}.{}", major, minor),
            VersionSpec::Exact(version) => write!(f, "{}", version),
        }
    }
}

/// Resolve a spec against a candidate list, returning the winning candidate
/// in its original textual form. Callers rely on the exact string to build
/// download URLs, so the parsed form is never echoed back.
///
/// Unparseable candidates are skipped silently; vendors sometimes ship build
/// tags alongside plain versions in the same index.
pub fn resolve(spec: &VersionSpec, candidates: &[String]) -> Result<String> {
    if candidates.is_empty() {
        return Err(MvxError::EmptyVersionList(spec.to_string()));
    }

    let mut matched: Vec<(&String, Version)> = candidates
        .iter()
        .filter_map(|raw| raw.parse::<Version>().ok().map(|v| (raw, v)))
        .filter(|(_, version)| spec.matches(version))
        .collect();

    // A bare `latest` prefers stable releases; pre-releases are only
    // eligible when nothing stable matches.
    if matches!(spec, VersionSpec::Latest) && matched.iter().any(|(_, v)| !v.is_prerelease()) {
        matched.retain(|(_, v)| !v.is_prerelease());
    }

    matched.sort_by(|(raw_a, a), (raw_b, b)| b.compare(a).then_with(|| raw_b.cmp(raw_a)));

    matched
        .first()
        .map(|(raw, _)| (*raw).clone())
        .ok_or_else(|| MvxError::NoMatchingVersion {
            spec: spec.to_string(),
            candidates: candidates.to_vec(),
        })
}
