//! Version constraint checks.
//!
//! stackpm does not solve version ranges. A dependency may carry a single
//! comparator constraint such as `>=18` or `<3.12.0`, checked against an
//! installed version with [`satisfies_version`].
//!
//! Both sides parse as up to three dot-separated integers, with missing
//! components treated as `0`. Comparison is component-wise.
//!
//! ```rust
//! use stackpm::version::satisfies_version;
//!
//! assert!(satisfies_version("20.11.0", ">=18"));
//! assert!(!satisfies_version("3.12.1", "<3.12"));
//! // Unrecognised constraints never block an install
//! assert!(satisfies_version("1.0.0", "^1.0"));
//! ```

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static CONSTRAINT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(>=|<=|>|<|=)?v?(\d+)(?:\.(\d+))?(?:\.(\d+))?$").ok());

static VERSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok());

/// A comparison operator in a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `=` or no operator
    Exact,
}

impl Comparator {
    fn parse(op: Option<&str>) -> Self {
        match op {
            Some(">=") => Self::GreaterOrEqual,
            Some("<=") => Self::LessOrEqual,
            Some(">") => Self::Greater,
            Some("<") => Self::Less,
            _ => Self::Exact,
        }
    }

    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::GreaterOrEqual => !matches!(ordering, Ordering::Less),
            Self::LessOrEqual => !matches!(ordering, Ordering::Greater),
            Self::Greater => matches!(ordering, Ordering::Greater),
            Self::Less => matches!(ordering, Ordering::Less),
            Self::Exact => matches!(ordering, Ordering::Equal),
        }
    }
}

/// A parsed single-comparator constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionConstraint {
    /// The operator
    pub comparator: Comparator,
    /// `[major, minor, patch]`
    pub version: [u64; 3],
}

impl VersionConstraint {
    /// Parses a constraint, returning `None` for anything outside the supported grammar.
    #[must_use]
    pub fn parse(constraint: &str) -> Option<Self> {
        let re = CONSTRAINT_RE.as_ref()?;
        let caps = re.captures(constraint.trim())?;
        Some(Self {
            comparator: Comparator::parse(caps.get(1).map(|m| m.as_str())),
            version: components(&caps)?,
        })
    }

    /// Whether `version` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, version: [u64; 3]) -> bool {
        self.comparator.accepts(version.cmp(&self.version))
    }
}

fn components(caps: &regex::Captures<'_>) -> Option<[u64; 3]> {
    let mut out = [0u64; 3];
    // Group 1 is the operator in constraints; versions have no operator group.
    let offset = caps.len() - 3;
    for (i, slot) in out.iter_mut().enumerate() {
        if let Some(m) = caps.get(offset + i) {
            *slot = m.as_str().parse().ok()?;
        }
    }
    Some(out)
}

/// Parses the leading `major.minor.patch` of a version string.
///
/// Trailing text such as `-beta.1` or `+build` is ignored.
#[must_use]
pub fn parse_version(version: &str) -> Option<[u64; 3]> {
    let re = VERSION_RE.as_ref()?;
    let caps = re.captures(version.trim())?;
    components(&caps)
}

/// Pulls the first `x.y[.z]` version out of free-form tool output such as
/// `SQLite version 3.45.0 2024-01-15`.
#[must_use]
pub fn extract_version(text: &str) -> Option<String> {
    static EMBEDDED_RE: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"\d+\.\d+(?:\.\d+)?").ok());
    let re = EMBEDDED_RE.as_ref()?;
    re.find(text).map(|m| m.as_str().to_string())
}

/// Checks whether `version` satisfies a single-comparator `constraint`.
///
/// A constraint outside the `{>=,<=,>,<,=}` + numeric grammar is treated as
/// satisfied, and so is a version that cannot be parsed.
#[must_use]
pub fn satisfies_version(version: &str, constraint: &str) -> bool {
    let Some(constraint) = VersionConstraint::parse(constraint) else {
        return true;
    };
    let Some(version) = parse_version(version) else {
        return true;
    };
    constraint.matches(version)
}
