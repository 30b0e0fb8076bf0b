use crate::finding::{html_escape, Finding, Severity};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme { Dark, Light }

/// What gets printed or written after an analysis: the findings in analyser
/// order plus per-severity counts.
#[derive(Clone, Debug, Serialize)]
pub struct ReportSummary {
    pub source: String,
    pub generated: String,
    pub today: NaiveDate,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    pub findings: Vec<Finding>,
}

impl ReportSummary {
    /// Findings below `min` are dropped; the rest keep their order.
    pub fn new(source: &str, today: NaiveDate, findings: Vec<Finding>, min: Severity) -> Self {
        let findings: Vec<Finding> = findings.into_iter().filter(|f| f.severity >= min).collect();
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        ReportSummary {
            source: source.to_string(),
            generated: chrono::Local::now().to_rfc3339(),
            today,
            critical: count(Severity::Critical),
            warnings: count(Severity::Warning),
            info: count(Severity::Info),
            findings,
        }
    }

    pub fn is_clean(&self) -> bool { self.critical == 0 && self.warnings == 0 }

    pub fn risk_grade(&self) -> &'static str {
        if self.critical > 0 { "Critical" } else if self.warnings > 0 { "Needs Attention" } else { "Healthy" }
    }
}

fn br_re() -> &'static Regex { static RE: OnceLock<Regex> = OnceLock::new(); RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br pattern")) }
fn strong_re() -> &'static Regex { static RE: OnceLock<Regex> = OnceLock::new(); RE.get_or_init(|| Regex::new(r"(?is)<strong>(.*?)</strong>").expect("valid strong pattern")) }
fn link_re() -> &'static Regex { static RE: OnceLock<Regex> = OnceLock::new(); RE.get_or_init(|| Regex::new(r#"(?is)<a\s+href="([^"]*)"\s*>(.*?)</a>"#).expect("valid link pattern")) }
fn tag_re() -> &'static Regex { static RE: OnceLock<Regex> = OnceLock::new(); RE.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid tag pattern")) }

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"").replace("&#x27;", "'").replace("&#39;", "'").replace("&amp;", "&")
}

/// Finding markup rendered for a terminal: line breaks become newlines,
/// links become "text (url)".
pub fn to_plain(markup: &str) -> String {
    let s = br_re().replace_all(markup, "\n");
    let s = strong_re().replace_all(&s, "$1");
    let s = link_re().replace_all(&s, "$2 ($1)");
    let s = tag_re().replace_all(&s, "");
    unescape(&s)
}

pub fn to_markdown(markup: &str) -> String {
    let s = br_re().replace_all(markup, "  \n");
    let s = strong_re().replace_all(&s, "**$1**");
    let s = link_re().replace_all(&s, "[$2]($1)");
    unescape(&s)
}

pub fn render_markdown(rep: &ReportSummary) -> String {
    let mut s = String::new();
    s.push_str("# ObsDoctor Report\n\n");
    s.push_str(&format!("Source: {}\n\n", rep.source));
    s.push_str(&format!("Risk: {}\n\n", rep.risk_grade()));
    s.push_str("## Summary\n");
    s.push_str(&format!("- Critical: {}\n", rep.critical));
    s.push_str(&format!("- Warnings: {}\n", rep.warnings));
    s.push_str(&format!("- Info: {}\n\n", rep.info));
    s.push_str("## Findings\n");
    if rep.findings.is_empty() { s.push_str("None\n"); return s; }
    for f in &rep.findings {
        s.push_str(&format!("\n### [{}] {}\n\n{}\n", f.severity, unescape(&f.title), to_markdown(&f.body)));
    }
    s
}

fn sev_class(s: Severity) -> &'static str {
    match s { Severity::Critical => "sev-high", Severity::Warning => "sev-medium", _ => "sev-low" }
}

pub fn render_html(rep: &ReportSummary, theme: Theme) -> String {
    let mut s = String::new();
    s.push_str("<html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>ObsDoctor Report</title><style>");
    match theme {
        Theme::Dark => s.push_str(":root{--bg:#0a0e13;--fg:#ffffff;--muted:#c0c4cc;--card:#0d131a;--border:#243041;--accent:#3b82f6;--ok:#22c55e;--warn:#f59e0b;--err:#ef4444} .sev-high{background:#3a0f12;border-color:#7f1d1d} .sev-medium{background:#3a2b0d;border-color:#854d0e} .sev-low{background:#0f1a2b;border-color:#1e3a8a}"),
        Theme::Light => s.push_str(":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb;--accent:#2563eb;--ok:#16a34a;--warn:#d97706;--err:#dc2626} .sev-high{background:#fee2e2;border-color:#fecaca} .sev-medium{background:#fde68a;border-color:#fef3c7} .sev-low{background:#dbeafe;border-color:#bfdbfe}"),
    }
    s.push_str(" body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} a{color:var(--accent)} .container{max-width:1000px;margin:0 auto;padding:24px} .header{display:flex;align-items:center;justify-content:space-between;gap:12px;margin-bottom:16px} .title{font-size:20px;font-weight:600} .sub{color:var(--muted);font-size:13px} .grid{display:grid;grid-template-columns:repeat(3,minmax(0,1fr));gap:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px;margin-top:12px} .metric{display:flex;align-items:center;justify-content:space-between} .metric .label{color:var(--muted);font-size:12px} .metric .value{font-size:22px;font-weight:700} .value.err{color:var(--err)} .value.warn{color:var(--warn)} .value.ok{color:var(--ok)} .chip{display:inline-block;border:1px solid var(--border);border-radius:999px;padding:4px 10px;font-size:12px;margin-right:8px} .finding h3{margin:0 0 8px 0;font-size:16px} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:600px){.grid{grid-template-columns:1fr}}");
    s.push_str("</style></head><body><div class=\"container\">");
    s.push_str(&format!("<div class=\"header\"><div class=\"title\">ObsDoctor Report</div><div class=\"sub\">{}</div></div>", html_escape(&rep.source)));
    s.push_str("<div class=\"grid\">");
    s.push_str(&format!("<div class=\"card metric\"><div class=\"label\">Critical</div><div class=\"value err\">{}</div></div>", rep.critical));
    s.push_str(&format!("<div class=\"card metric\"><div class=\"label\">Warnings</div><div class=\"value warn\">{}</div></div>", rep.warnings));
    s.push_str(&format!("<div class=\"card metric\"><div class=\"label\">Info</div><div class=\"value ok\">{}</div></div>", rep.info));
    s.push_str("</div>");
    if rep.findings.is_empty() {
        s.push_str("<div class=\"card\">No issues found.</div>");
    }
    for f in &rep.findings {
        s.push_str(&format!("<div class=\"card finding\"><h3><span class=\"chip {}\">{}</span>{}</h3><div>{}</div></div>", sev_class(f.severity), f.severity, f.title, f.body));
    }
    s.push_str(&format!("<div class=\"footer\">Generated {} · reference date {}</div>", html_escape(&rep.generated), rep.today));
    s.push_str("</div></body></html>");
    s
}

pub fn write_csv(path: &str, rep: &ReportSummary) -> Result<(), std::io::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["severity", "title", "body"])?;
    for f in &rep.findings {
        wtr.write_record([f.severity.label().to_string(), unescape(&f.title), to_plain(&f.body).replace('\n', " ")])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2021, 6, 1).unwrap() }

    fn sample() -> Vec<Finding> {
        vec![
            Finding::info("Windows 10 2004 (OK)", "You are running Windows 10 2004, which is supported."),
            Finding::critical("Insufficient Hardware", "Too slow.<br>See <a href=\"https://obsproject.com/wiki\">the wiki</a>."),
            Finding::warning("Mismatched Sample Rates", "Rates differ.<br>Mic: <strong>44100</strong> Hz"),
        ]
    }

    #[test]
    fn plain_text_drops_markup() {
        assert_eq!(to_plain("a<br>b <strong>48000</strong> Hz"), "a\nb 48000 Hz");
        assert_eq!(to_plain("see <a href=\"https://x.y/z\">docs</a>"), "see docs (https://x.y/z)");
        assert_eq!(to_plain("Custom OBS Build (26.1.0-&lt;x&gt;)"), "Custom OBS Build (26.1.0-<x>)");
        assert_eq!(to_plain("<em>really</em> slow"), "really slow");
    }

    #[test]
    fn min_severity_filters_without_reordering() {
        let rep = ReportSummary::new("obs.txt", today(), sample(), Severity::Warning);
        let titles: Vec<&str> = rep.findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Insufficient Hardware", "Mismatched Sample Rates"]);
        assert_eq!((rep.critical, rep.warnings, rep.info), (1, 1, 0));
        assert_eq!(rep.risk_grade(), "Critical");
        assert!(!rep.is_clean());
    }

    #[test]
    fn markdown_lists_findings() {
        let rep = ReportSummary::new("obs.txt", today(), sample(), Severity::None);
        let md = render_markdown(&rep);
        assert!(md.contains("### [Critical] Insufficient Hardware"));
        assert!(md.contains("[the wiki](https://obsproject.com/wiki)"));
        assert!(md.contains("Mic: **44100** Hz"));
        assert!(md.contains("- Info: 1"));
    }

    #[test]
    fn html_keeps_body_markup_and_escapes_source() {
        let rep = ReportSummary::new("<obs>.txt", today(), sample(), Severity::None);
        let html = render_html(&rep, Theme::Light);
        assert!(html.contains("&lt;obs&gt;.txt"));
        assert!(html.contains("<strong>44100</strong>"));
        assert!(html.contains("sev-high"));
        let empty = render_html(&ReportSummary::new("x", today(), vec![], Severity::None), Theme::Dark);
        assert!(empty.contains("No issues found."));
    }

    #[test]
    fn csv_has_one_row_per_finding() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.csv");
        let rep = ReportSummary::new("obs.txt", today(), sample(), Severity::None);
        write_csv(p.to_str().unwrap(), &rep).unwrap();
        let text = std::fs::read_to_string(&p).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "severity,title,body");
        assert!(lines[2].starts_with("Critical,Insufficient Hardware,"));
    }
}
