//! Facts derived from one log. Every accessor computes on first use and
//! returns the memoised value afterwards. A `FactStore` borrows the log it was
//! built for and lives exactly as long as one analysis.

use crate::loglines::LogText;
use crate::winver;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::cell::OnceCell;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Platform { Windows, Mac, Linux, Unknown }

/// Parsed `Windows Version:` line, enriched from the release table when the
/// version tag (or, on `10.0`, the build) is known.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowsVersion {
    pub version: String,
    pub build: u32,
    pub revision: u32,
    pub bits: u32,
    /// The `release:` token exactly as logged, if the line had one.
    pub reported_release: Option<String>,
    /// Table release number, `0` when the build is not in the table.
    pub release: u32,
    pub name: Option<String>,
    pub eos: Option<NaiveDate>,
}

impl WindowsVersion {
    pub fn is_win10(&self) -> bool { self.version == "10.0" }

    /// A `10.0` build missing from the release table, e.g. an Insider build.
    pub fn is_unidentified_win10(&self) -> bool { self.is_win10() && self.name.is_none() }
}

/// Name → value pairs in scan order. A repeated name keeps its first position
/// and takes the later value.
pub type OrderedMap<V> = Vec<(String, V)>;

fn upsert<V>(map: &mut OrderedMap<V>, key: String, val: V) {
    match map.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = val,
        None => map.push((key, val)),
    }
}

pub struct FactStore<'a> {
    log: &'a LogText,
    version_line: OnceCell<Option<&'a str>>,
    app_version: OnceCell<String>,
    platform: OnceCell<Platform>,
    windows_version: OnceCell<Option<WindowsVersion>>,
    refreshes: OnceCell<OrderedMap<f64>>,
    sample_rates: OnceCell<OrderedMap<u32>>,
    engine_sample_rate: OnceCell<Option<u32>>,
    render_lag: OnceCell<f64>,
}

impl<'a> FactStore<'a> {
    pub fn new(log: &'a LogText) -> Self {
        FactStore {
            log,
            version_line: OnceCell::new(),
            app_version: OnceCell::new(),
            platform: OnceCell::new(),
            windows_version: OnceCell::new(),
            refreshes: OnceCell::new(),
            sample_rates: OnceCell::new(),
            engine_sample_rate: OnceCell::new(),
            render_lag: OnceCell::new(),
        }
    }

    /// First line mentioning `OBS` that is not a duplicate-instance warning.
    pub fn version_line(&self) -> Option<&'a str> {
        *self.version_line.get_or_init(|| {
            let line = self.log.lines().iter()
                .find(|l| l.contains("OBS") && !l.contains("already running") && !l.contains("multiple instances"))
                .map(|l| l.as_str());
            if line.is_none() { log::debug!("no version line found"); }
            line
        })
    }

    /// Version token from the version line; empty when it cannot be located.
    pub fn app_version(&self) -> &str {
        self.app_version.get_or_init(|| {
            let Some(line) = self.version_line() else { return String::new() };
            let toks: Vec<&str> = line.split_whitespace().collect();
            let idx = if toks.first() == Some(&"OBS") { 1 } else if toks.get(2) == Some(&"OBS") { 3 } else { 2 };
            toks.get(idx).map(|s| s.to_string()).unwrap_or_default()
        })
    }

    pub fn platform(&self) -> Platform {
        *self.platform.get_or_init(|| {
            let line = self.version_line().unwrap_or("");
            if line.contains("linux") { Platform::Linux }
            else if line.contains("windows") { Platform::Windows }
            else if line.contains("mac") { Platform::Mac }
            else { Platform::Unknown }
        })
    }

    pub fn windows_version(&self) -> Option<&WindowsVersion> {
        self.windows_version.get_or_init(|| {
            let line = self.log.first("Windows Version:")?;
            let parsed = parse_windows_version(line);
            if parsed.is_none() { log::debug!("unrecognised Windows version line: {}", line); }
            parsed
        }).as_ref()
    }

    pub fn monitor_refresh_rates(&self) -> &OrderedMap<f64> {
        self.refreshes.get_or_init(|| {
            let mut out = OrderedMap::new();
            for line in self.log.search("refresh=") {
                let Some(c) = refresh_re().captures(line) else { continue };
                let Ok(num) = c["output"].parse::<u32>() else { continue };
                let Ok(hz) = c["refresh"].parse::<f64>() else { log::debug!("bad refresh value in: {}", line); continue };
                let name = c.name("name").map(|m| m.as_str().trim()).unwrap_or("");
                let key = if name.is_empty() { format!("Display {}", num) } else { format!("{} ({})", name, num + 1) };
                upsert(&mut out, key, hz);
            }
            out
        })
    }

    pub fn audio_sample_rates(&self) -> &OrderedMap<u32> {
        self.sample_rates.get_or_init(|| {
            let mut out = OrderedMap::new();
            for line in self.log.lines().iter().filter(|l| l.trim_end().ends_with("Hz] initialized")) {
                let Some(c) = device_rate_re().captures(line) else { continue };
                let Ok(rate) = c["rate"].parse::<u32>() else { continue };
                upsert(&mut out, c["device"].to_string(), rate);
            }
            out
        })
    }

    /// Sample rate the audio engine was configured with; the last such line wins.
    pub fn engine_sample_rate(&self) -> Option<u32> {
        *self.engine_sample_rate.get_or_init(|| {
            self.log.search("samples per sec:").iter()
                .filter_map(|l| engine_rate_re().captures(l).and_then(|c| c["rate"].parse::<u32>().ok()))
                .last()
        })
    }

    /// Largest `rendering lag` percentage reported, `0.0` when none.
    pub fn render_lag_percent(&self) -> f64 {
        *self.render_lag.get_or_init(|| {
            let mut max = 0.0_f64;
            for line in self.log.search("rendering lag") {
                match parse_paren_percent(line) {
                    Some(v) if v > max => max = v,
                    Some(_) => {}
                    None => log::debug!("skipping unparsable lag line: {}", line),
                }
            }
            max
        })
    }
}

fn winver_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Windows Version: (?P<version>[0-9]+\.[0-9]+) Build (?P<build>[0-9]+) \((?:release: (?P<release>[^;)]+); )?revision: (?P<revision>[0-9]+); (?P<bits>[0-9]+)-bit\)").expect("static regex"))
}

fn refresh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)output\s+(?P<output>[0-9]+):.*refresh=(?P<refresh>[0-9.]+),(?:.*name=(?P<name>.*))?").expect("static regex"))
}

fn device_rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'(?P<device>.*)'.*\[(?P<rate>[0-9]{2,12})\sHz\]").expect("static regex"))
}

fn engine_rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)samples\s+per\s+sec:\s*(?P<rate>[0-9]+)").expect("static regex"))
}

pub fn parse_windows_version(line: &str) -> Option<WindowsVersion> {
    let c = winver_re().captures(line)?;
    let mut ver = WindowsVersion {
        version: c["version"].to_string(),
        build: c["build"].parse().ok()?,
        revision: c["revision"].parse().ok()?,
        bits: c["bits"].parse().ok()?,
        reported_release: c.name("release").map(|m| m.as_str().trim().to_string()),
        release: 0,
        name: None,
        eos: None,
    };
    let known = if ver.is_win10() { winver::by_win10_build(ver.build) } else { Some(winver::by_version_tag(&ver.version)?) };
    if let Some(k) = known {
        ver.name = Some(k.name.to_string());
        ver.release = k.release;
        ver.eos = k.eos;
    }
    Some(ver)
}

/// `... (1.5%)` or `... (1,5 %)` → `1.5`.
fn parse_paren_percent(line: &str) -> Option<f64> {
    let open = line.find('(')?;
    let close = open + line[open..].find(')')?;
    line[open + 1..close].trim().trim_end_matches('%').trim().replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIN_LOG: &str = "\
19:39:17.395: CPU Name: Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
19:39:17.395: OBS 26.1.0 (64-bit, windows)
19:39:17.396: Windows Version: 10.0 Build 19041 (release: 2004; revision: 450; 64-bit)
19:39:17.500: \t  output 0: pos={0, 0}, size={1920, 1080}, attached=true, refresh=59.94, name=DELL U2415
19:39:17.500: \t  output 1: pos={1920, 0}, size={1920, 1080}, attached=true, refresh=144.0, name=
19:39:18.000: [WASAPISource::InitRender] Device 'Headset Microphone' [44100 Hz] initialized
19:39:18.000: [WASAPISource::InitRender] Device 'Speakers (Realtek)' [48000 Hz] initialized
19:39:18.001: \tsamples per sec: 48000
19:45:00.000: Number of lagged frames due to rendering lag/stalls: 12 (0.4%)
19:50:00.000: Number of lagged frames due to rendering lag/stalls: 90 (2,5%)
";

    #[test]
    fn extracts_version_and_platform() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        assert_eq!(f.app_version(), "26.1.0");
        assert_eq!(f.platform(), Platform::Windows);
    }

    #[test]
    fn skips_duplicate_instance_line_when_locating_version() {
        let log = LogText::new("12:00:00.000: Warning: OBS is already running!\n12:00:00.001: OBS 25.0.8 (64-bit, linux)");
        let f = FactStore::new(&log);
        assert_eq!(f.app_version(), "25.0.8");
        assert_eq!(f.platform(), Platform::Linux);
    }

    #[test]
    fn missing_facts_resolve_to_unknown() {
        let log = LogText::new("nothing useful\nat all");
        let f = FactStore::new(&log);
        assert_eq!(f.app_version(), "");
        assert_eq!(f.platform(), Platform::Unknown);
        assert!(f.windows_version().is_none());
        assert!(f.monitor_refresh_rates().is_empty());
        assert!(f.audio_sample_rates().is_empty());
        assert_eq!(f.engine_sample_rate(), None);
        assert_eq!(f.render_lag_percent(), 0.0);
    }

    #[test]
    fn windows_version_is_enriched_from_table() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        let w = f.windows_version().unwrap();
        assert_eq!(w.build, 19041);
        assert_eq!(w.release, 2004);
        assert_eq!(w.reported_release.as_deref(), Some("2004"));
        assert_eq!(w.name.as_deref(), Some("Windows 10 2004"));
        assert_eq!(w.bits, 64);
    }

    #[test]
    fn older_windows_line_without_release() {
        let w = parse_windows_version("19:39:17.395: Windows Version: 6.1 Build 7601 (revision: 24535; 64-bit)").unwrap();
        assert_eq!(w.name.as_deref(), Some("Windows 7"));
        assert_eq!(w.reported_release, None);
        assert!(parse_windows_version("Windows Version: 5.1 Build 2600 (revision: 1; 32-bit)").is_none());
    }

    #[test]
    fn unknown_win10_build_keeps_record() {
        let w = parse_windows_version("Windows Version: 10.0 Build 20201 (release: 2009; revision: 1; 64-bit)").unwrap();
        assert!(w.is_unidentified_win10());
        assert_eq!(w.release, 0);
    }

    #[test]
    fn refresh_rates_keyed_by_name_or_display() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        let r = f.monitor_refresh_rates();
        assert_eq!(r[0], ("DELL U2415 (1)".to_string(), 59.94));
        assert_eq!(r[1], ("Display 1".to_string(), 144.0));
    }

    #[test]
    fn sample_rates_per_device_and_engine() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        let s = f.audio_sample_rates();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0], ("Headset Microphone".to_string(), 44100));
        assert_eq!(f.engine_sample_rate(), Some(48000));
    }

    #[test]
    fn render_lag_takes_maximum_with_comma_decimal() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        assert_eq!(f.render_lag_percent(), 2.5);
    }

    #[test]
    fn malformed_lag_line_does_not_abort_others() {
        let log = LogText::new("rendering lag (oops)\nrendering lag/stalls: 3 (4.0%)\nrendering lag without parens");
        let f = FactStore::new(&log);
        assert_eq!(f.render_lag_percent(), 4.0);
    }

    #[test]
    fn facts_are_memoised() {
        let log = LogText::new(WIN_LOG);
        let f = FactStore::new(&log);
        let a = f.monitor_refresh_rates() as *const _;
        let b = f.monitor_refresh_rates() as *const _;
        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(f.app_version(), f.app_version()));
    }

    #[test]
    fn separate_stores_do_not_share_state() {
        let a = LogText::new("OBS 26.1.0 (64-bit, windows)");
        let b = LogText::new("OBS 25.0.0 (mac)");
        assert_eq!(FactStore::new(&a).app_version(), "26.1.0");
        let fb = FactStore::new(&b);
        assert_eq!(fb.app_version(), "25.0.0");
        assert_eq!(fb.platform(), Platform::Mac);
    }
}
