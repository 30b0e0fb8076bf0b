use crate::finding::{html_escape, Finding};
use crate::rules::{Analysis, Category, Rule};
use crate::version::{self, PreKind, Shape};

pub static GENERAL: Category = Category {
    name: "Core",
    rules: &[
        Rule::one("obs-version", check_obs_version),
        Rule::one("cpu", check_cpu),
        Rule::one("dual-instances", check_dual_instances),
        Rule::one("autoconfig", check_autoconfig).off_by_default(),
    ],
};

pub(crate) const CLEAN_LOG: &str = "<br>To make a clean log file, please follow these steps: <br><br>\
1) Restart OBS. <br>\
2) Start your stream/recording for about 30 seconds. Make sure you replicate any issues as best you can, \
which means having any games/apps open and captured, etc. <br>\
3) Stop your stream/recording. <br>\
4) Select Help > Log Files > Upload Current Log File. \
Send that link via this troubleshooting tool or whichever support chat you are using.";

const UPDATE_LINK: &str = "<a href=\"https://obsproject.com/download\">downloads page</a>";

fn check_obs_version(a: &Analysis<'_>) -> Option<Finding> {
    let ver = a.facts.app_version();
    if ver == version::BROKEN_UPDATE_VERSION {
        return Some(Finding::warning(
            "Broken Auto-Update",
            format!("You are not running the latest version of OBS Studio. Automatic updates in version {} are broken due to a bug. \
                     <br>Please update by downloading the latest installer from the {} and running it.", version::BROKEN_UPDATE_VERSION, UPDATE_LINK),
        ));
    }
    let esc = html_escape(ver);
    let Some(parsed) = version::parse_unmodified(ver) else {
        log::debug!("version {:?} failed strict parse", ver);
        return Some(match version::classify_shape(ver) {
            Shape::Unofficial => Finding::info(
                format!("Unofficial OBS Build ({})", esc),
                format!("Your OBS version identifies itself as '{}', which is not an official build.<br>\
                         If you are on Linux, ensure you're using the PPA. \
                         If you cannot switch to the PPA, contact the maintainer of the package for any support issues.", esc),
            ),
            Shape::ThirdParty => Finding::info(
                format!("Third party OBS Version ({})", esc),
                format!("Your OBS version identifies itself as '{}', which is made by a third party. Contact them for any support issues.", esc),
            ),
            Shape::Custom => Finding::info(
                format!("Custom OBS Build ({})", esc),
                format!("Your OBS version identifies itself as '{}', which is not a released OBS version.", esc),
            ),
            Shape::Unparsable => Finding::info(
                format!("Unparseable OBS Version ({})", esc),
                format!("Your OBS version identifies itself as '{}', which cannot be parsed as a valid OBS version number.", esc),
            ),
        });
    };
    let caveat = "There is nothing wrong with this, but you may experience problems that you may not experience \
                  with fully released OBS versions. You are encouraged to upgrade to a released version of OBS as \
                  soon as one is available.";
    match parsed.pre {
        Some((PreKind::Beta, _)) => return Some(Finding::info(format!("Beta OBS Version ({})", esc), format!("You are running a beta version of OBS. {}", caveat))),
        Some((PreKind::Rc, _)) => return Some(Finding::info(format!("Release Candidate OBS Version ({})", esc), format!("You are running a release candidate version of OBS. {}", caveat))),
        None => {}
    }
    if version::is_older_than(ver, &a.opts.current_version) {
        return Some(Finding::warning(
            "Old Version",
            format!("You are not running the latest version of OBS Studio. Please update by downloading the latest installer from the {} and running it.", UPDATE_LINK),
        ));
    }
    None
}

fn check_cpu(a: &Analysis<'_>) -> Option<Finding> {
    let cpu = a.log.first("CPU Name")?;
    if ["APU", "Pentium", "Celeron"].iter().any(|t| cpu.contains(t)) {
        return Some(Finding::critical(
            "Insufficient Hardware",
            "Your system is below minimum specs for OBS to run and may be too underpowered to livestream. \
             There are no recommended settings we can suggest, but try the Auto-Config Wizard in the Tools menu. \
             You may need to upgrade or replace your computer for a better experience.",
        ));
    }
    if cpu.contains("i3") {
        return Some(Finding::info(
            "Insufficient Hardware",
            "Your system is below minimum specs for OBS to run and is too underpowered to livestream using software encoding. \
             Livestreams and recordings will only run smoothly if you are using the hardware QuickSync encoder (via Settings -> Output).",
        ));
    }
    None
}

fn check_dual_instances(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Warning: OBS is already running!") { return None; }
    Some(Finding::critical(
        "Two Instances",
        "Two instances of OBS are running. If you are not intentionally running two instances, \
         they will likely interfere with each other and consume excessive resources. Stop one of them. \
         Check Task Manager for stray OBS processes if you can't find the other one.",
    ))
}

fn check_autoconfig(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Auto-config wizard") { return None; }
    Some(Finding::critical(
        "Auto-Config Wizard",
        format!("The log contains an Auto-Config Wizard run. Results of this analysis are therefore inaccurate. \
                 Please post a link to a clean log file.{}", CLEAN_LOG),
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
        run_with(log, AnalysisOptions::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()))
    }

    fn run_with(log: &str, opts: AnalysisOptions) -> Vec<Finding> {
        let log = LogText::new(log);
        let a = Analysis::new(&log, &opts);
        GENERAL.run(&a)
    }

    fn version_finding(ver: &str) -> Option<Finding> {
        let log = LogText::new(&format!("10:00:00.000: OBS {} (64-bit, windows)", ver));
        let opts = AnalysisOptions::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        let a = Analysis::new(&log, &opts);
        check_obs_version(&a)
    }

    #[test]
    fn version_classification_table() {
        let f = version_finding("21.1.0").unwrap();
        assert_eq!((f.severity, f.title.as_str()), (Severity::Warning, "Broken Auto-Update"));
        let f = version_finding("26.0.0").unwrap();
        assert_eq!((f.severity, f.title.as_str()), (Severity::Warning, "Old Version"));
        let f = version_finding("26.1.0-beta1").unwrap();
        assert_eq!(f.severity, Severity::Info);
        assert!(f.title.starts_with("Beta OBS Version"));
        let f = version_finding("27.0.0-rc2").unwrap();
        assert!(f.title.starts_with("Release Candidate OBS Version"));
        assert!(version_finding("999.0.0").is_none());
        assert!(version_finding("26.1.0").is_none());
    }

    #[test]
    fn unparsable_shapes_are_informational() {
        assert!(version_finding("26.1.2+focal").unwrap().title.starts_with("Unofficial OBS Build"));
        assert!(version_finding("24.0.3-caffeine").unwrap().title.starts_with("Third party OBS Version"));
        assert!(version_finding("27.0.0-58-gabc123").unwrap().title.starts_with("Custom OBS Build"));
        let f = version_finding("<weird>").unwrap();
        assert_eq!(f.title, "Unparseable OBS Version (&lt;weird&gt;)");
        assert_eq!(f.severity, Severity::Info);
    }

    #[test]
    fn modified_builds_compare_numerically() {
        assert_eq!(version_finding("25.0.8-modified").unwrap().title, "Old Version");
        assert!(version_finding("26.1.0-modified").is_none());
    }

    #[test]
    fn current_version_is_configurable() {
        let mut o = AnalysisOptions::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        o.current_version = "27.0.0".to_string();
        let out = run_with("OBS 26.1.0 (64-bit, windows)", o);
        assert_eq!(out[0].title, "Old Version");
    }

    #[test]
    fn cpu_first_match_wins() {
        let out = run("OBS 26.1.0 (64-bit, windows)\nCPU Name: Intel(R) Pentium(R) CPU G4560 @ 3.50GHz");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Critical);
        let out = run("OBS 26.1.0 (64-bit, windows)\nCPU Name: Intel(R) Core(TM) i3-8100 CPU");
        assert_eq!(out[0].severity, Severity::Info);
        assert!(run("OBS 26.1.0 (64-bit, windows)\nCPU Name: AMD Ryzen 7 3700X").is_empty());
    }

    #[test]
    fn dual_instance_is_critical() {
        let out = run("Warning: OBS is already running!\nOBS 26.1.0 (64-bit, windows)");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Two Instances");
    }

    #[test]
    fn autoconfig_is_opt_in() {
        let log = "OBS 26.1.0 (64-bit, windows)\n==== Auto-config wizard testing commencing ======";
        assert!(run(log).is_empty());
        let mut o = AnalysisOptions::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        o.enabled_rules.push("autoconfig".to_string());
        let out = run_with(log, o);
        assert_eq!(out[0].title, "Auto-Config Wizard");
    }
}
