use crate::analyser::AnalysisOptions;
use crate::facts::{FactStore, Platform};
use crate::finding::{Finding, Severity};
use crate::loglines::LogText;
use serde::{Deserialize, Serialize};

/// Everything a rule may read: the raw lines, the facts of this analysis and
/// the caller's options (which carry "today").
pub struct Analysis<'a> {
    pub log: &'a LogText,
    pub facts: FactStore<'a>,
    pub opts: &'a AnalysisOptions,
}

impl<'a> Analysis<'a> {
    pub fn new(log: &'a LogText, opts: &'a AnalysisOptions) -> Self {
        Analysis { log, facts: FactStore::new(log), opts }
    }
}

#[derive(Clone, Copy)]
pub enum Check {
    One(fn(&Analysis<'_>) -> Option<Finding>),
    Many(fn(&Analysis<'_>) -> Vec<Finding>),
}

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub check: Check,
    pub enabled_by_default: bool,
}

impl Rule {
    pub const fn one(name: &'static str, f: fn(&Analysis<'_>) -> Option<Finding>) -> Self {
        Rule { name, check: Check::One(f), enabled_by_default: true }
    }

    pub const fn many(name: &'static str, f: fn(&Analysis<'_>) -> Vec<Finding>) -> Self {
        Rule { name, check: Check::Many(f), enabled_by_default: true }
    }

    /// Kept in the list but skipped unless the caller opts in by name.
    pub const fn off_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    pub fn is_enabled(&self, opts: &AnalysisOptions) -> bool {
        self.enabled_by_default || opts.enabled_rules.iter().any(|n| n == self.name)
    }

    pub fn evaluate(&self, a: &Analysis<'_>) -> Vec<Finding> {
        match self.check {
            Check::One(f) => f(a).into_iter().collect(),
            Check::Many(f) => f(a),
        }
    }
}

pub struct Category {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

impl Category {
    /// Runs every enabled rule in list order and concatenates what they yield.
    pub fn run(&self, a: &Analysis<'_>) -> Vec<Finding> {
        let mut out = Vec::new();
        for r in self.rules.iter().filter(|r| r.is_enabled(a.opts)) {
            let found = r.evaluate(a);
            log::trace!("{}/{}: {} finding(s)", self.name, r.name, found.len());
            out.extend(found);
        }
        out
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ { self.rules.iter().map(|r| r.name) }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    pub rules: Option<Vec<CustomRule>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: Option<String>,
    pub contains_any: Option<Vec<String>>, // case-insensitive substring match against each line
    pub regex: Option<String>,
    pub platform: Option<String>,          // "windows" | "mac" | "linux"
    pub severity: Option<String>,          // "info" | "warning" | "critical"
    pub title: String,
    pub body: Option<String>,
}

pub fn load_rules(path_opt: Option<&str>) -> Option<RulesConfig> {
    let path = path_opt
        .map(|s| s.to_string())
        .or_else(|| std::env::var("OBSDOCTOR_RULES_PATH").ok())
        .unwrap_or_else(|| "rules.json".to_string());
    let p = std::path::PathBuf::from(&path);
    let data = match std::fs::read(&p) {
        Ok(d) => d,
        Err(e) => {
            if path_opt.is_some() { log::warn!("Failed to read rules file {}: {}", p.to_string_lossy(), e); } else { log::debug!("No rules file at {}: {}", p.to_string_lossy(), e); }
            return None;
        }
    };
    let cfg: RulesConfig = match serde_json::from_slice(&data) { Ok(c) => c, Err(e) => { log::warn!("Failed to parse rules file {}: {}", p.to_string_lossy(), e); return None } };
    Some(cfg)
}

fn platform_matches(want: &str, have: Platform) -> bool {
    match want.to_lowercase().as_str() {
        "windows" => have == Platform::Windows,
        "mac" | "macos" => have == Platform::Mac,
        "linux" => have == Platform::Linux,
        _ => false,
    }
}

/// Each user rule yields at most one finding, in file order.
pub fn apply_custom_rules(a: &Analysis<'_>, cfg: &RulesConfig) -> Vec<Finding> {
    let mut out: Vec<Finding> = vec![];
    let rules = match &cfg.rules { Some(r) => r, None => return out };
    for r in rules {
        if let Some(p) = r.platform.as_ref() && !platform_matches(p, a.facts.platform()) { continue; }
        let mut matched = false;
        if let Some(list) = r.contains_any.as_ref() {
            let terms: Vec<String> = list.iter().map(|k| k.to_lowercase()).collect();
            matched = a.log.lines().iter().any(|l| { let ll = l.to_lowercase(); terms.iter().any(|t| ll.contains(t)) });
        }
        if !matched && let Some(rx) = r.regex.as_ref() {
            match regex::Regex::new(rx) {
                Ok(re) => matched = a.log.lines().iter().any(|l| re.is_match(l)),
                Err(e) => log::warn!("Skipping rule {}: invalid regex: {}", r.name.as_deref().unwrap_or(&r.title), e),
            }
        }
        if matched {
            let sev = r.severity.as_deref().and_then(Severity::parse).unwrap_or(Severity::Warning);
            out.push(Finding::new(sev, r.title.clone(), r.body.clone().unwrap_or_default()));
        }
    }
    out
}
