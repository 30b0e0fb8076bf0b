//! Application version grammar: `major.minor.micro[-(rc|beta)N]`.
//!
//! Ordering compares the numeric triple first. For an equal triple a
//! pre-release sorts before the release, and `beta` sorts before `rc`; within
//! the same tag the trailing number decides (a missing number counts as 0).
//! Build metadata after `+` and vendor suffixes are only ever classified, never
//! ordered.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Latest release known to be good. Anything strictly older is reported.
pub const CURRENT_VERSION: &str = "26.1.0";

/// The release whose built-in updater is broken.
pub const BROKEN_UPDATE_VERSION: &str = "21.1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreKind { Beta, Rc }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub pre: Option<(PreKind, u32)>,
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro).cmp(&(other.major, other.minor, other.micro)).then_with(|| match (self.pre, other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        })
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

fn strict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?P<major>[0-9]+)\.(?P<minor>[0-9]+)\.(?P<micro>[0-9]+)(?:-(?P<kind>rc|beta)(?P<num>[0-9]*))?$").expect("static regex"))
}

/// Strict parse of the whole string.
pub fn parse(s: &str) -> Option<AppVersion> {
    let c = strict_re().captures(s.trim())?;
    let num = |n: &str| c.name(n).and_then(|m| m.as_str().parse::<u32>().ok());
    let pre = match c.name("kind").map(|m| m.as_str().to_lowercase()) {
        Some(k) => {
            let kind = if k == "rc" { PreKind::Rc } else { PreKind::Beta };
            Some((kind, num("num").unwrap_or(0)))
        }
        None => None,
    };
    Some(AppVersion { major: num("major")?, minor: num("minor")?, micro: num("micro")?, pre })
}

/// Parse after dropping a `-modified` marker, which locally patched builds carry.
pub fn parse_unmodified(s: &str) -> Option<AppVersion> { parse(&s.replace("-modified", "")) }

/// True when `s` parses and orders strictly before `bound`.
pub fn is_older_than(s: &str, bound: &str) -> bool {
    matches!((parse_unmodified(s), parse(bound)), (Some(a), Some(b)) if a < b)
}

/// True when `s` parses and orders at or before `bound`.
pub fn is_at_most(s: &str, bound: &str) -> bool {
    matches!((parse_unmodified(s), parse(bound)), (Some(a), Some(b)) if a <= b)
}

/// How a version string that failed the strict grammar looks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// `x.y.z+suffix`, typically a distro package.
    Unofficial,
    /// A fork carrying a known vendor token.
    ThirdParty,
    /// `x.y.z-something`, a self-built tree.
    Custom,
    Unparsable,
}

fn shape_res() -> &'static [(Shape, Regex); 3] {
    static RES: OnceLock<[(Shape, Regex); 3]> = OnceLock::new();
    RES.get_or_init(|| [
        (Shape::Unofficial, Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+\+[\w\-.~+]+").expect("static regex")),
        (Shape::ThirdParty, Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+\w*-caffeine").expect("static regex")),
        (Shape::Custom, Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+-[0-9-]*[a-z0-9]+").expect("static regex")),
    ])
}

pub fn classify_shape(s: &str) -> Shape {
    shape_res().iter().find(|(_, re)| re.is_match(s)).map(|(shape, _)| *shape).unwrap_or(Shape::Unparsable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_prerelease() {
        let v = parse("26.1.0").unwrap();
        assert_eq!((v.major, v.minor, v.micro, v.pre), (26, 1, 0, None));
        assert_eq!(parse("26.1.0-beta1").unwrap().pre, Some((PreKind::Beta, 1)));
        assert_eq!(parse("27.0.0-RC2").unwrap().pre, Some((PreKind::Rc, 2)));
        assert!(parse("26.1").is_none());
        assert!(parse("26.1.0+ppa").is_none());
    }

    #[test]
    fn prerelease_orders_before_release() {
        let beta = parse("26.1.0-beta3").unwrap();
        let rc = parse("26.1.0-rc1").unwrap();
        let rel = parse("26.1.0").unwrap();
        assert!(beta < rc);
        assert!(rc < rel);
        assert!(parse("26.0.9").unwrap() < beta);
    }

    #[test]
    fn modified_suffix_is_ignored_for_ordering() {
        assert!(is_older_than("25.0.8-modified", "26.1.0"));
        assert!(!is_older_than("999.0.0", CURRENT_VERSION));
        assert!(is_at_most("24.0.3", "24.0.3"));
        assert!(!is_older_than("garbage", "26.1.0"));
    }

    #[test]
    fn shapes_of_unparsable_versions() {
        assert_eq!(classify_shape("26.1.2+focal"), Shape::Unofficial);
        assert_eq!(classify_shape("24.0.3-caffeine"), Shape::ThirdParty);
        assert_eq!(classify_shape("27.0.0-58-gabcdef"), Shape::Custom);
        assert_eq!(classify_shape("unknown"), Shape::Unparsable);
    }
}
