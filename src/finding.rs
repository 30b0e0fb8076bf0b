use serde::{Deserialize, Serialize};

/// Ordered scale used by callers for filtering and sorting. The analyser itself
/// never reorders findings by severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self { Severity::None => "None", Severity::Info => "Info", Severity::Warning => "Warning", Severity::Critical => "Critical" }
    }

    pub fn parse(s: &str) -> Option<Severity> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Severity::None),
            "info" | "low" => Some(Severity::Info),
            "warning" | "warn" | "medium" => Some(Severity::Warning),
            "critical" | "high" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.label()) }
}

/// One diagnostic result. The body may carry `<br>`/`<a>` markup which is left
/// for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

impl Finding {
    pub fn new(severity: Severity, title: impl Into<String>, body: impl Into<String>) -> Self {
        Finding { severity, title: title.into(), body: body.into() }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self { Finding::new(Severity::Info, title, body) }
    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self { Finding::new(Severity::Warning, title, body) }
    pub fn critical(title: impl Into<String>, body: impl Into<String>) -> Self { Finding::new(Severity::Critical, title, body) }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#x27;")
}
