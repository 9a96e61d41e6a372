// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! Versions are dotted sequences of non-negative integers (`1.2.3.4`).
//! Trailing zero parts are insignificant: `1.2` and `1.2.0` compare equal,
//! hash equal and share the same normalized form, which is what the
//! inventory uses for its storage keys.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A dotted numeric package version
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Create a version from its numeric parts
    ///
    /// An empty slice is treated as `0`.
    pub fn new(parts: &[u64]) -> Self {
        if parts.is_empty() {
            return Self { parts: vec![0] };
        }
        Self {
            parts: parts.to_vec(),
        }
    }

    /// Parse a version string
    ///
    /// Examples:
    /// - "1" → [1]
    /// - "1.2.3" → [1, 2, 3]
    /// - "2.0.0.0" → [2, 0, 0, 0] (normalizes to "2")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ValidationError("Empty version".to_string()));
        }

        let mut parts = Vec::new();
        for part in s.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::ValidationError(format!(
                    "Invalid version '{}': '{}' is not a number",
                    s, part
                )));
            }
            let n = part.parse::<u64>().map_err(|e| {
                Error::ValidationError(format!("Invalid version '{}': {}", s, e))
            })?;
            parts.push(n);
        }

        Ok(Self { parts })
    }

    /// Extract a version from a foreign version string
    ///
    /// System package managers report versions like `2:1.2.3-4.el8` or
    /// `1.0rc1`. The epoch is dropped and the leading dotted numeric run is
    /// kept. Strings without any leading digits become `1`.
    pub fn parse_lenient(s: &str) -> Self {
        let s = s.trim();
        let s = match s.split_once(':') {
            Some((epoch, rest)) if epoch.bytes().all(|b| b.is_ascii_digit()) => rest,
            _ => s,
        };

        let numeric: String = s
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let numeric = numeric.trim_matches('.');

        // "1..2" survives the filter above but is rejected by parse()
        Self::parse(numeric).unwrap_or_else(|_| Self::new(&[1]))
    }

    /// Numeric parts as given
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Copy of this version with trailing zero parts removed
    pub fn normalized(&self) -> Self {
        let mut parts = self.parts.clone();
        while parts.len() > 1 && parts.last() == Some(&0) {
            parts.pop();
        }
        Self { parts }
    }

    /// Normalized form as a string, used in storage keys
    pub fn normalized_string(&self) -> String {
        self.normalized().to_string()
    }

    /// Compare two versions, padding the shorter one with zeros
    pub fn compare(&self, other: &Version) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(&[0])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().parts.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::str::FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(Version),
    /// Greater than
    GreaterThan(Version),
    /// Greater than or equal
    GreaterOrEqual(Version),
    /// Less than
    LessThan(Version),
    /// Less than or equal
    LessOrEqual(Version),
    /// Not equal
    NotEqual(Version),
    /// Both constraints must be satisfied (for ranges like ">= 1.0, < 2.0")
    And(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "< 2" → LessThan(2)
    /// - "1.5" → Exact(1.5)
    /// - ">= 1.0, < 2.0" → And(GreaterOrEqual(1.0), LessThan(2.0))
    /// - "[1.0, 2.0)" → And(GreaterOrEqual(1.0), LessThan(2.0))
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if s.starts_with('[') || s.starts_with('(') {
            return Self::parse_interval(s);
        }

        // Check for compound constraints (e.g., ">= 1.0, < 2.0")
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
            if parts.len() == 2 {
                let left = Self::parse(parts[0])?;
                let right = Self::parse(parts[1])?;
                return Ok(VersionConstraint::And(Box::new(left), Box::new(right)));
            }
            return Err(Error::ValidationError(format!(
                "Too many clauses in version constraint '{}'",
                s
            )));
        }

        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionConstraint::NotEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionConstraint::Exact(Version::parse(rest)?))
        } else {
            // No operator means exact match
            Ok(VersionConstraint::Exact(Version::parse(s)?))
        }
    }

    /// Parse interval notation: `[min, max]`, `(min, max)` and mixes
    fn parse_interval(s: &str) -> Result<Self> {
        let invalid = || Error::ValidationError(format!("Invalid version interval '{}'", s));

        let min_included = s.starts_with('[');
        let max_included = if s.ends_with(']') {
            true
        } else if s.ends_with(')') {
            false
        } else {
            return Err(invalid());
        };

        let inner = &s[1..s.len() - 1];
        let (min, max) = inner.split_once(',').ok_or_else(invalid)?;
        let min = Version::parse(min)?;
        let max = Version::parse(max)?;

        let lower = if min_included {
            VersionConstraint::GreaterOrEqual(min)
        } else {
            VersionConstraint::GreaterThan(min)
        };
        let upper = if max_included {
            VersionConstraint::LessOrEqual(max)
        } else {
            VersionConstraint::LessThan(max)
        };

        Ok(VersionConstraint::And(Box::new(lower), Box::new(upper)))
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::And(left, right) => {
                left.satisfies(version) && right.satisfies(version)
            }
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
            VersionConstraint::And(left, right) => write!(f, "{}, {}", left, right),
        }
    }
}

/// A dependency on some version range of another package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub package: String,
    pub constraint: VersionConstraint,
}

impl Dependency {
    pub fn new(package: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            package: package.into(),
            constraint,
        }
    }

    /// Build a dependency from a package identity and a constraint string
    pub fn parse(package: impl Into<String>, constraint: &str) -> Result<Self> {
        Ok(Self::new(package, VersionConstraint::parse(constraint)?))
    }

    /// Check whether `version` of this dependency's package satisfies it
    pub fn test(&self, version: &Version) -> bool {
        self.constraint.satisfies(version)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.package),
            ref c => write!(f, "{} {}", self.package, c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_simple() {
        assert_eq!(v("1.2.3").parts(), &[1, 2, 3]);
        assert_eq!(v(" 7 ").parts(), &[7]);
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.2a").is_err());
        assert!(Version::parse("-1").is_err());
    }

    #[test]
    fn test_version_trailing_zeros_are_insignificant() {
        assert_eq!(v("1.2"), v("1.2.0.0"));
        assert_eq!(v("2.0.0").normalized_string(), "2");
        assert_eq!(v("0.0").normalized_string(), "0");
        assert_eq!(v("1.0.1").normalized_string(), "1.0.1");
    }

    #[test]
    fn test_version_hash_matches_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("3.1"));
        assert!(set.contains(&v("3.1.0")));
    }

    #[test]
    fn test_version_compare() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("2") > v("1.99.99"));
        assert!(v("1.0.1") > v("1"));
    }

    #[test]
    fn test_version_parse_lenient() {
        assert_eq!(Version::parse_lenient("2:1.2.3-4.el8"), v("1.2.3"));
        assert_eq!(Version::parse_lenient("1.0rc1"), v("1.0"));
        assert_eq!(Version::parse_lenient("5.36.0-7+deb12u1"), v("5.36"));
        assert_eq!(Version::parse_lenient("unknown"), v("1"));
        assert_eq!(Version::parse_lenient("1..2"), v("1"));
    }

    #[test]
    fn test_version_display_keeps_given_form() {
        assert_eq!(v("1.2.0").to_string(), "1.2.0");
    }

    #[test]
    fn test_version_constraint_parse_exact() {
        let c = VersionConstraint::parse("1.2.3").unwrap();
        assert!(c.satisfies(&v("1.2.3")));
        assert!(c.satisfies(&v("1.2.3.0")));
        assert!(!c.satisfies(&v("1.2.4")));
    }

    #[test]
    fn test_version_constraint_parse_greater_or_equal() {
        let c = VersionConstraint::parse(">= 1.2").unwrap();
        assert!(c.satisfies(&v("1.2")));
        assert!(c.satisfies(&v("1.3")));
        assert!(!c.satisfies(&v("1.1.9")));
    }

    #[test]
    fn test_version_constraint_and() {
        let c = VersionConstraint::parse(">= 1.0, < 2.0").unwrap();
        assert!(c.satisfies(&v("1.5")));
        assert!(!c.satisfies(&v("2.0")));
        assert!(!c.satisfies(&v("0.9")));
    }

    #[test]
    fn test_version_constraint_interval() {
        let c = VersionConstraint::parse("[1.0, 2.0)").unwrap();
        assert!(c.satisfies(&v("1")));
        assert!(c.satisfies(&v("1.99")));
        assert!(!c.satisfies(&v("2")));

        let c = VersionConstraint::parse("(1, 2]").unwrap();
        assert!(!c.satisfies(&v("1")));
        assert!(c.satisfies(&v("2")));

        assert!(VersionConstraint::parse("[1, 2").is_err());
        assert!(VersionConstraint::parse("[1]").is_err());
    }

    #[test]
    fn test_version_constraint_any() {
        let c = VersionConstraint::parse("*").unwrap();
        assert!(c.satisfies(&v("99.99.99")));
    }

    #[test]
    fn test_version_constraint_display() {
        let c = VersionConstraint::parse(">= 1.2").unwrap();
        assert_eq!(c.to_string(), ">= 1.2");

        let c = VersionConstraint::parse("[1.0, 2.0)").unwrap();
        assert_eq!(c.to_string(), ">= 1.0, < 2.0");
    }

    #[test]
    fn test_dependency_test() {
        let dep = Dependency::parse("org.example.lib", "[1.0, 2.0)").unwrap();
        assert!(dep.test(&v("1.4")));
        assert!(!dep.test(&v("2.1")));
        assert_eq!(dep.to_string(), "org.example.lib >= 1.0, < 2.0");
    }
}
