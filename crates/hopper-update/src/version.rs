//! Release tag parsing and ordering
//!
//! Tags look like `v1.2.3` or `v1.2.3-pre4`; the leading `v` is optional.
//! A pre-release sorts before the final release of the same
//! `major.minor.patch`, and pre-releases of the same triple sort by their
//! numeric ordinal (so `pre5 < pre23`, unlike a lexical comparison).

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:-pre(\d+))?$").expect("tag regex is valid")
});

/// A parsed release tag
///
/// Parsing never fails; a tag that does not match the grammar yields a
/// value with `is_valid() == false`. Invalid versions have no meaningful
/// position in the ordering and must be filtered out before ranking.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Option<u64>,
    valid: bool,
    raw: String,
}

impl Version {
    /// Parse a tag such as `v1.2.0`, `1.2.0` or `v1.2.0-pre3`
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        TAG_RE
            .captures(tag)
            .and_then(|caps| {
                let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
                let pre_release = match caps.get(4) {
                    Some(m) => Some(m.as_str().parse::<u64>().ok()?),
                    None => None,
                };
                Some(Self {
                    major: number(1)?,
                    minor: number(2)?,
                    patch: number(3)?,
                    pre_release,
                    valid: true,
                    raw: tag.to_string(),
                })
            })
            .unwrap_or_else(|| Self::invalid(tag))
    }

    fn invalid(tag: &str) -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            pre_release: None,
            valid: false,
            raw: tag.to_string(),
        }
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

    /// Pre-release ordinal, if this is a pre-release
    pub fn pre_release(&self) -> Option<u64> {
        self.pre_release
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The tag exactly as it was parsed
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Version {
    /// Canonical `v{major}.{minor}.{patch}[-pre{n}]`; invalid versions print their raw tag
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str(&self.raw);
        }
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre_release {
            write!(f, "-pre{}", pre)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Invalid versions are grouped below every valid one so that the
        // ordering stays total; callers filter them before ranking anyway.
        self.valid
            .cmp(&other.valid)
            .then_with(|| {
                (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
            })
            .then_with(|| match (self.pre_release, other.pre_release) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(tag: &str) -> Version {
        Version::parse(tag)
    }

    #[test]
    fn test_parse_components() {
        let version = v("v1.2.3-pre4");
        assert!(version.is_valid());
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 3);
        assert_eq!(version.pre_release(), Some(4));
        assert!(version.is_pre_release());

        let stable = v("0.4.0");
        assert!(stable.is_valid());
        assert!(!stable.is_pre_release());
    }

    #[test]
    fn test_canonical_display_adds_prefix() {
        assert_eq!(v("1.2.0").to_string(), "v1.2.0");
        assert_eq!(v("v1.2.0-pre7").to_string(), "v1.2.0-pre7");
        assert_eq!(v("v01.002.3").to_string(), "v1.2.3");
    }

    #[test]
    fn test_invalid_shapes() {
        for tag in [
            "",
            "v1.2",
            "1.2.3.4",
            "v1.2.3-beta1",
            "v1.2.3-pre",
            "release-1.2.3",
            "v1.2.3 extra",
            "V1.2.3",
            "v-1.2.3",
            "v99999999999999999999999.0.0",
        ] {
            let version = v(tag);
            assert!(!version.is_valid(), "{tag:?} should be invalid");
            assert_eq!(version.raw(), tag);
        }
    }

    #[test]
    fn test_basic_comparisons() {
        let target = v("v0.4.0");
        assert_eq!(v("v0.3.5").cmp(&target), Ordering::Less);
        assert_eq!(v("v0.4.0").cmp(&target), Ordering::Equal);
        assert_eq!(v("v0.4.5").cmp(&target), Ordering::Greater);
        assert_eq!(v("0.4.0"), target);
    }

    #[test]
    fn test_pre_release_precedes_final() {
        assert_eq!(v("v1.2.0-pre1").cmp(&v("v1.2.0")), Ordering::Less);
        assert_eq!(v("v1.2.0").cmp(&v("v1.2.0-pre1")), Ordering::Greater);
        assert_eq!(v("v0.4.0-pre2").cmp(&v("v0.4.1")), Ordering::Less);
    }

    #[test]
    fn test_pre_release_ordinal_is_numeric() {
        assert_eq!(v("v1.2.0-pre4").cmp(&v("v1.2.0-pre5")), Ordering::Less);
        assert_eq!(v("v1.2.0-pre5").cmp(&v("v1.2.0-pre23")), Ordering::Less);
    }

    #[test]
    fn test_sorting_release_list() {
        let mut versions: Vec<Version> = [
            "v0.2.0",
            "v1.2.1",
            "v1.2.0",
            "v1.2.0-pre4",
            "v0.0.2-pre1",
            "v1.0.0",
            "v0.2.0-pre81",
            "v0.0.2",
            "v1.2.0-pre5",
            "v0.0.3",
            "v0.2.0-pre3",
            "v1.2.0-pre23",
        ]
        .iter()
        .map(|t| v(t))
        .collect();

        versions.sort();

        let sorted: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(
            sorted,
            vec![
                "v0.0.2-pre1",
                "v0.0.2",
                "v0.0.3",
                "v0.2.0-pre3",
                "v0.2.0-pre81",
                "v0.2.0",
                "v1.0.0",
                "v1.2.0-pre4",
                "v1.2.0-pre5",
                "v1.2.0-pre23",
                "v1.2.0",
                "v1.2.1",
            ]
        );
    }

    fn tag_strategy() -> impl Strategy<Value = String> {
        (
            0u64..4,
            0u64..4,
            0u64..4,
            proptest::option::of(0u64..30),
            any::<bool>(),
        )
            .prop_map(|(major, minor, patch, pre, prefix)| {
                let mut tag = format!(
                    "{}{}.{}.{}",
                    if prefix { "v" } else { "" },
                    major,
                    minor,
                    patch
                );
                if let Some(pre) = pre {
                    tag.push_str(&format!("-pre{}", pre));
                }
                tag
            })
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(tag in tag_strategy()) {
            let parsed = v(&tag);
            prop_assert!(parsed.is_valid());
            let canonical = parsed.to_string();
            prop_assert!(canonical.starts_with('v'));
            prop_assert_eq!(v(&canonical).to_string(), canonical.clone());
            prop_assert_eq!(canonical.trim_start_matches('v'), tag.trim_start_matches('v'));
        }

        #[test]
        fn prop_reflexive_and_antisymmetric(a in tag_strategy(), b in tag_strategy()) {
            let (a, b) = (v(&a), v(&b));
            prop_assert_eq!(a.cmp(&a), Ordering::Equal);
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn prop_transitive(a in tag_strategy(), b in tag_strategy(), c in tag_strategy()) {
            let (a, b, c) = (v(&a), v(&b), v(&c));
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }
    }
}
