use chrono::NaiveDate;

/// A known Windows release. `release` is the YYMM-style number used for
/// comparisons (`2004`, `2110`, ...); `0` for pre-Windows 10 versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowsRelease {
    pub name: &'static str,
    pub release: u32,
    pub eos: Option<NaiveDate>,
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> { NaiveDate::from_ymd_opt(y, m, d) }

/// Releases identified by their `major.minor` tag alone.
pub fn by_version_tag(tag: &str) -> Option<WindowsRelease> {
    match tag {
        "6.1" => Some(WindowsRelease { name: "Windows 7", release: 0, eos: date(2020, 1, 14) }),
        "6.2" => Some(WindowsRelease { name: "Windows 8", release: 0, eos: date(2016, 1, 12) }),
        "6.3" => Some(WindowsRelease { name: "Windows 8.1", release: 0, eos: date(2023, 1, 10) }),
        _ => None,
    }
}

/// Windows 10 and 11 both report `10.0`; the build number tells them apart.
pub fn by_win10_build(build: u32) -> Option<WindowsRelease> {
    let r = |name, release, eos| Some(WindowsRelease { name, release, eos });
    match build {
        10240 => r("Windows 10 1507", 1507, date(2017, 5, 9)),
        10586 => r("Windows 10 1511", 1511, date(2017, 10, 10)),
        14393 => r("Windows 10 1607", 1607, date(2018, 4, 10)),
        15063 => r("Windows 10 1703", 1703, date(2018, 10, 9)),
        16299 => r("Windows 10 1709", 1709, date(2019, 4, 9)),
        17134 => r("Windows 10 1803", 1803, date(2019, 11, 12)),
        17763 => r("Windows 10 1809", 1809, date(2020, 11, 10)),
        18362 => r("Windows 10 1903", 1903, date(2020, 12, 8)),
        18363 => r("Windows 10 1909", 1909, date(2021, 5, 11)),
        19041 => r("Windows 10 2004", 2004, date(2021, 12, 14)),
        19042 => r("Windows 10 20H2", 2009, date(2022, 5, 10)),
        19043 => r("Windows 10 21H1", 2104, date(2022, 12, 13)),
        19044 => r("Windows 10 21H2", 2110, date(2023, 6, 13)),
        19045 => r("Windows 10 22H2", 2210, date(2025, 10, 14)),
        22000 => r("Windows 11 21H2", 2110, date(2023, 10, 10)),
        22621 => r("Windows 11 22H2", 2210, date(2024, 10, 8)),
        22631 => r("Windows 11 23H2", 2310, date(2025, 11, 11)),
        26100 => r("Windows 11 24H2", 2410, date(2026, 10, 13)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_7_has_eos() {
        let w = by_version_tag("6.1").unwrap();
        assert_eq!(w.name, "Windows 7");
        assert_eq!(w.eos, NaiveDate::from_ymd_opt(2020, 1, 14));
    }

    #[test]
    fn build_19041_is_2004() {
        assert_eq!(by_win10_build(19041).unwrap().release, 2004);
        assert!(by_win10_build(99999).is_none());
        assert!(by_version_tag("10.0").is_none());
    }
}
