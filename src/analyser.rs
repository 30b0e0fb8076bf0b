use crate::audio::AUDIO;
use crate::error::AnalyseError;
use crate::facts::Platform;
use crate::finding::Finding;
use crate::general::GENERAL;
use crate::graphics::GRAPHICS;
use crate::loglines::LogText;
use crate::rules::{apply_custom_rules, Analysis, Category, RulesConfig};
use crate::version::CURRENT_VERSION;
use crate::windows::WINDOWS;
use chrono::NaiveDate;

const CLASSIC_SIGNATURE: &str = ": Open Broadcaster Software v0.";

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    /// Reference date for end-of-support checks.
    pub today: NaiveDate,
    pub current_version: String,
    /// Names of rules that are off by default but requested by the caller.
    pub enabled_rules: Vec<String>,
    pub custom_rules: Option<RulesConfig>,
}

impl AnalysisOptions {
    pub fn new(today: NaiveDate) -> Self {
        AnalysisOptions { today, current_version: CURRENT_VERSION.to_string(), enabled_rules: vec![], custom_rules: None }
    }
}

/// Built-in categories in output order, each with the platform it requires.
pub fn categories() -> [(&'static Category, Option<Platform>); 4] {
    [(&GENERAL, None), (&GRAPHICS, None), (&WINDOWS, Some(Platform::Windows)), (&AUDIO, None)]
}

fn check_classic(log: &LogText) -> Option<Finding> {
    if !log.contains(CLASSIC_SIGNATURE) { return None; }
    Some(Finding::critical(
        "OBS Classic",
        "You are still using OBS Classic. This version is no longer supported. \
         While we cannot and will not do anything to prevent you from using it, we cannot help with any issues that may come up. \
         <br>It is recommended that you update to OBS Studio.<br><br>Further information on why you should update (and how): \
         <a href=\"https://obsproject.com/forum/threads/how-to-easily-switch-to-obs-studio.55820/\">OBS Classic to OBS Studio</a>.",
    ))
}

/// Runs every category over one log. A fresh fact store is built for each call.
pub fn analyse(log: &LogText, opts: &AnalysisOptions) -> Vec<Finding> {
    if let Some(classic) = check_classic(log) {
        log::info!("legacy log format detected, skipping all other checks");
        return vec![classic];
    }
    let a = Analysis::new(log, opts);
    let mut out = Vec::new();
    for (cat, platform) in categories() {
        if let Some(p) = platform && a.facts.platform() != p {
            log::debug!("skipping {} checks on {:?} log", cat.name, a.facts.platform());
            continue;
        }
        out.extend(cat.run(&a));
    }
    if let Some(cfg) = opts.custom_rules.as_ref() { out.extend(apply_custom_rules(&a, cfg)); }
    log::info!("{} finding(s) from {} line(s)", out.len(), log.len());
    out
}

/// Refuses to analyse when nothing was retrieved.
pub fn analyse_contents(contents: Option<&str>, opts: &AnalysisOptions) -> Result<Vec<Finding>, AnalyseError> {
    let text = contents.filter(|c| !c.trim().is_empty()).ok_or(AnalyseError::NoContent)?;
    Ok(analyse(&LogText::new(text), opts))
}
