//! Dotted version numbers as reported by `apparmor_parser --version` and by the kernel's
//! `features/domain/version` file.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::error::ProfileError;

fn version_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)*)").expect("version prefix regex must compile")
    })
}

/// A version made of numeric components, compared component-wise.
///
/// Missing trailing components compare as zero, so `2.10` equals `2.10.0` and
/// `2.9` sorts before `2.10`.
#[derive(Debug, Clone)]
pub struct DottedVersion {
    components: Vec<u64>,
}

impl DottedVersion {
    pub fn new(components: Vec<u64>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    fn component(&self, idx: usize) -> u64 {
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl FromStr for DottedVersion {
    type Err = ProfileError;

    /// Parses the leading numeric part of `s`. A vendor suffix after the last numeric
    /// component (`3.0.4~0ubuntu1`) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let prefix = version_prefix()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .ok_or_else(|| ProfileError::VersionParse {
                input: s.to_string(),
                reason: "expected a numeric component".to_string(),
            })?;

        let components = prefix
            .as_str()
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|e| ProfileError::VersionParse {
                    input: s.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> DottedVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_unix_threshold() {
        let min = v("2.10.95");
        assert!(v("2.10.94") < min);
        assert!(v("2.10.95") >= min);
        assert!(v("2.11.0") >= min);
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert!(v("2.9") < v("2.10"));
        assert!(v("2.13") > v("2.9.99"));
    }

    #[test]
    fn test_missing_components_are_zero() {
        assert_eq!(v("2.13"), v("2.13.0"));
        assert!(v("2.13") >= v("2.13.0.0"));
        assert!(v("3") > v("2.99.99"));
    }

    #[test]
    fn test_vendor_suffix_ignored() {
        assert_eq!(v("3.0.4~0ubuntu1"), v("3.0.4"));
        assert_eq!(v("2.13.3-beta").to_string(), "2.13.3");
    }

    #[test]
    fn test_malformed_versions() {
        for input in ["", "abc", "v2.13", ".1"] {
            let err = input.parse::<DottedVersion>().unwrap_err();
            assert!(matches!(err, ProfileError::VersionParse { .. }), "{input}");
        }
    }

    #[test]
    fn test_overflowing_component() {
        let err = "99999999999999999999999.1".parse::<DottedVersion>().unwrap_err();
        assert!(matches!(err, ProfileError::VersionParse { .. }));
    }
}
