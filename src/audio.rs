use crate::facts::Platform;
use crate::finding::{html_escape, Finding};
use crate::rules::{Analysis, Category, Rule};

pub static AUDIO: Category = Category {
    name: "Audio",
    rules: &[Rule::one("sample-rates", check_sample_rates)],
};

fn check_sample_rates(a: &Analysis<'_>) -> Option<Finding> {
    if a.facts.platform() != Platform::Windows { return None; }
    let devices = a.facts.audio_sample_rates();
    if devices.is_empty() { return None; }
    let engine = a.facts.engine_sample_rate();
    let mut distinct: Vec<u32> = engine.into_iter().chain(devices.iter().map(|(_, hz)| *hz)).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() <= 1 { return None; }
    let mut breakdown = String::new();
    if let Some(hz) = engine { breakdown.push_str(&format!("<br>OBS Sample Rate: <strong>{}</strong> Hz", hz)); }
    for (device, hz) in devices { breakdown.push_str(&format!("<br>{}: <strong>{}</strong> Hz", html_escape(device), hz)); }
    Some(Finding::warning(
        "Mismatched Sample Rates",
        format!("At least one of your audio devices has a sample rate that doesn't match the rest. \
                 This can result in audio drift over time or sound distortion. Check your audio devices in \
                 Windows settings (both Playback and Recording) and ensure the Default Format (under Advanced) \
                 is consistent. 48000 Hz is recommended.{}", breakdown),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::AnalysisOptions;
    use crate::finding::Severity;
    use crate::loglines::LogText;
    use chrono::NaiveDate;

    fn run(log: &str) -> Vec<Finding> {
        let log = LogText::new(log);
        let opts = AnalysisOptions::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        let a = Analysis::new(&log, &opts);
        AUDIO.run(&a)
    }

    const HEAD: &str = "OBS 26.1.0 (64-bit, windows)\n\tsamples per sec: 48000\n";

    #[test]
    fn engine_rate_counts_toward_mismatch() {
        let log = format!("{}[WASAPISource::InitRender] Device 'Mic' [44100 Hz] initialized", HEAD);
        let out = run(&log);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Warning);
        assert!(out[0].body.contains("OBS Sample Rate: <strong>48000</strong> Hz"));
        assert!(out[0].body.contains("Mic: <strong>44100</strong> Hz"));
    }

    #[test]
    fn device_names_are_escaped() {
        let log = format!("{}[WASAPISource::InitRender] Device '<img src=x onerror=alert(2)>' [44100 Hz] initialized", HEAD);
        let out = run(&log);
        assert_eq!(out.len(), 1);
        assert!(out[0].body.contains("&lt;img src=x onerror=alert(2)&gt;: <strong>44100</strong> Hz"));
        assert!(!out[0].body.contains("<img"));
    }

    #[test]
    fn matching_rates_are_fine() {
        let log = format!("{}[WASAPISource::InitRender] Device 'Mic' [48000 Hz] initialized\n[WASAPISource::InitRender] Device 'Desktop' [48000 Hz] initialized", HEAD);
        assert!(run(&log).is_empty());
    }

    #[test]
    fn needs_devices_and_windows() {
        assert!(run(HEAD).is_empty());
        let mac = format!("{}Device 'Mic' [44100 Hz] initialized", HEAD.replace("windows", "mac"));
        assert!(run(&mac).is_empty());
    }
}
