use std::sync::OnceLock;
use std::time::Duration;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, ArgGroup, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use comfy_table::{ContentArrangement, Table};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
mod analyser;
mod audio;
mod error;
mod facts;
mod fetch;
mod finding;
mod general;
mod graphics;
mod loglines;
mod report;
mod rules;
mod version;
mod windows;
mod winver;

use crate::analyser::AnalysisOptions;
use crate::finding::Severity;
use crate::report::{ReportSummary, Theme};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TextFormat { Lines, Table }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MinSeverity { Info, Warning, Critical }

impl From<MinSeverity> for Severity {
    fn from(m: MinSeverity) -> Self {
        match m { MinSeverity::Info => Severity::Info, MinSeverity::Warning => Severity::Warning, MinSeverity::Critical => Severity::Critical }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ObsDoctor",
    about = "OBS Studio log analyser",
    long_about = "Reads an OBS Studio log from a paste service or a local file and reports known configuration and system problems, most important first within each area.",
    after_long_help = "Examples:\n  ObsDoctor --url https://obsproject.com/logs/AbCdEfGhIjKlMnOp\n  ObsDoctor --file 2021-01-05_19-39-17.txt --text-format table\n  ObsDoctor -f obs.txt --min-severity warning --html report.html\n  ObsDoctor -f obs.txt --today 2021-06-01 --enable-rule game-mode --output json",
    color = ColorChoice::Auto,
    group(ArgGroup::new("source").args(["url", "file"]).multiple(false))
)]
struct Args {
    #[arg(long, short = 'u', required_unless_present_any = ["file", "completions", "list_rules"], help = "Log URL (obsproject.com, Discord, pastebin, hastebin, gist)")]
    url: Option<String>,
    #[arg(long, short = 'f', help = "Local log file")]
    file: Option<String>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, value_enum, default_value = "lines")]
    text_format: TextFormat,
    #[arg(long, value_enum)]
    min_severity: Option<MinSeverity>,
    #[arg(long)]
    json_path: Option<String>,
    #[arg(long)]
    md_path: Option<String>,
    #[arg(long)]
    html: Option<String>,
    #[arg(long, value_enum, default_value = "dark")]
    theme: Theme,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, help = "Reference date for end-of-support checks (YYYY-MM-DD)")]
    today: Option<String>,
    #[arg(long = "enable-rule", action = ArgAction::Append, help = "Enable a rule that is off by default (repeatable)")]
    enable_rule: Vec<String>,
    #[arg(long, help = "JSON file with additional rules")]
    rules: Option<String>,
    #[arg(long, help = "Override the newest released OBS version")]
    current_version: Option<String>,
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
    #[arg(long, default_value_t = false)]
    list_rules: bool,
    #[arg(long, default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, default_value_t = false)]
    warnings_as_errors: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            output: OutputFmt::Text,
            text_format: TextFormat::Lines,
            min_severity: None,
            json_path: None,
            md_path: None,
            html: None,
            theme: Theme::Dark,
            csv_path: None,
            today: None,
            enable_rule: vec![],
            rules: None,
            current_version: None,
            timeout_secs: 15,
            list_rules: false,
            no_color: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            progress: false,
            warnings_as_errors: false,
            completions: None,
            config: None,
        }
    }
}

#[derive(Deserialize)]
struct AppConfig {
    output: Option<OutputFmt>,
    text_format: Option<TextFormat>,
    min_severity: Option<MinSeverity>,
    theme: Option<Theme>,
    json_path: Option<String>,
    md_path: Option<String>,
    html: Option<String>,
    csv_path: Option<String>,
    enable_rules: Option<Vec<String>>,
    rules: Option<String>,
    current_version: Option<String>,
    timeout_secs: Option<u64>,
    progress: Option<bool>,
    warnings_as_errors: Option<bool>,
    force_color: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(sh, &mut cmd, "ObsDoctor", &mut std::io::stdout());
        return;
    }
    let cfg_path = args.config.clone().unwrap_or_else(|| "ObsDoctor.toml".to_string());
    match std::fs::read_to_string(&cfg_path) {
        Ok(s) => match toml::from_str::<AppConfig>(&s) {
            Ok(cfg) => apply_config(&mut args, cfg),
            Err(e) => eprintln!("Ignoring config {}: {}", cfg_path, e),
        },
        Err(e) if args.config.is_some() => eprintln!("Failed to read config {}: {}", cfg_path, e),
        Err(_) => {}
    }
    init_logger(&args);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);
    if args.list_rules { print_rules(); return; }
    match run(&args) {
        Ok(rep) => {
            if args.warnings_as_errors && !rep.is_clean() { std::process::exit(1); }
        }
        Err(e) => {
            log::debug!("run failed: {:?}", e);
            if !args.quiet { eprintln!("{}", paint(&format!("Error: {:#}", e), "1;31")); }
            std::process::exit(1);
        }
    }
}

fn init_logger(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let obj = serde_json::json!({
                        "ts": chrono::Local::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
        }
    }
    builder.init();
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.output == OutputFmt::Text && let Some(v) = cfg.output { args.output = v; }
    if args.text_format == TextFormat::Lines && let Some(v) = cfg.text_format { args.text_format = v; }
    if args.min_severity.is_none() && let Some(v) = cfg.min_severity { args.min_severity = Some(v); }
    if args.theme == Theme::Dark && let Some(v) = cfg.theme { args.theme = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if let Some(v) = cfg.enable_rules {
        for name in v { if !args.enable_rule.contains(&name) { args.enable_rule.push(name); } }
    }
    if args.rules.is_none() && let Some(v) = cfg.rules { args.rules = Some(v); }
    if args.current_version.is_none() && let Some(v) = cfg.current_version { args.current_version = Some(v); }
    if args.timeout_secs == 15 && let Some(v) = cfg.timeout_secs { args.timeout_secs = v; }
    if let Some(v) = cfg.progress { args.progress |= v; }
    if let Some(v) = cfg.warnings_as_errors { args.warnings_as_errors |= v; }
    if let Some(v) = cfg.force_color { args.force_color |= v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

fn parse_today(arg: Option<&str>) -> Result<NaiveDate> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").with_context(|| format!("invalid --today value {:?}, expected YYYY-MM-DD", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn build_options(args: &Args, today: NaiveDate) -> AnalysisOptions {
    let mut opts = AnalysisOptions::new(today);
    let known: Vec<&str> = analyser::categories().into_iter().flat_map(|(c, _)| c.rule_names()).collect();
    for name in &args.enable_rule {
        if !known.contains(&name.as_str()) { log::warn!("Unknown rule {:?} in --enable-rule", name); }
    }
    opts.enabled_rules = args.enable_rule.clone();
    if let Some(v) = args.current_version.as_ref() { opts.current_version = v.clone(); }
    opts.custom_rules = rules::load_rules(args.rules.as_deref());
    opts
}

fn retrieve(args: &Args) -> (String, Option<String>) {
    if let Some(path) = args.file.as_ref() { return (path.clone(), fetch::file(path)); }
    let location = args.url.clone().unwrap_or_default();
    let cfg = fetch::FetchConfig { timeout: Duration::from_secs(args.timeout_secs), ..Default::default() };
    let pb = if args.progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    if let Some(ref pb) = pb { pb.set_message(format!("Fetching {}", location)); pb.enable_steady_tick(Duration::from_millis(120)); }
    let text = fetch::url(&location, &cfg);
    if let Some(pb) = pb { pb.finish_and_clear(); }
    (location, text)
}

fn run(args: &Args) -> Result<ReportSummary> {
    let today = parse_today(args.today.as_deref())?;
    let opts = build_options(args, today);
    let (source, contents) = retrieve(args);
    let findings = analyser::analyse_contents(contents.as_deref(), &opts).with_context(|| format!("could not analyse {}", source))?;
    let min = args.min_severity.map(Severity::from).unwrap_or(Severity::None);
    let rep = ReportSummary::new(&source, today, findings, min);
    emit(args, &rep)?;
    Ok(rep)
}

/// Findings go to stdout unless quiet, or JSON is headed for a file instead.
fn prints_findings(args: &Args) -> bool {
    !args.quiet && !(args.output == OutputFmt::Json && args.json_path.is_some())
}

fn emit(args: &Args, rep: &ReportSummary) -> Result<()> {
    if prints_findings(args) {
        match args.output {
            OutputFmt::Text => match args.text_format {
                TextFormat::Lines => print_text(rep),
                TextFormat::Table => print_text_table(rep),
            },
            OutputFmt::Json => println!("{}", serde_json::to_string_pretty(&rep.findings).context("serialising findings")?),
        }
    }
    if let Some(p) = args.json_path.as_ref() {
        let data = serde_json::to_vec_pretty(&rep.findings).context("serialising findings")?;
        match std::fs::write(p, data) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
            Err(e) => log::error!("JSON write failed for {}: {}", p, e),
        }
    }
    if let Some(p) = args.html.as_ref() {
        match std::fs::write(p, report::render_html(rep, args.theme)) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("HTML generated: {}", p), "1;36")); } }
            Err(e) => log::error!("HTML write failed for {}: {}", p, e),
        }
    }
    if let Some(p) = args.md_path.as_ref() {
        match std::fs::write(p, report::render_markdown(rep)) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", p), "1;36")); } }
            Err(e) => log::error!("Markdown write failed for {}: {}", p, e),
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = report::write_csv(p, rep) { log::error!("CSV write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); }
    }
    Ok(())
}

fn print_text(rep: &ReportSummary) {
    if rep.findings.is_empty() { println!("{}", paint("No issues found.", "1;32")); return; }
    println!("{}", paint(&format!("Status: {} critical, {} warnings, {} info.", rep.critical, rep.warnings, rep.info), if rep.is_clean() { "1;32" } else { "1;33" }));
    println!("{} {}", paint("Risk:", "1"), rep.risk_grade());
    for f in &rep.findings {
        println!();
        println!("{} {}", paint(&format!("[{}]", f.severity), sev_code(f.severity)), paint(&report::to_plain(&f.title), "1"));
        for line in report::to_plain(&f.body).lines() { println!("    {}", line.trim()); }
    }
}

fn print_text_table(rep: &ReportSummary) {
    if rep.findings.is_empty() { println!("{}", paint("No issues found.", "1;32")); return; }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![paint("Severity", "1"), paint("Title", "1"), paint("Details", "1")]);
    for f in &rep.findings {
        table.add_row(vec![paint(f.severity.label(), sev_code(f.severity)), report::to_plain(&f.title), report::to_plain(&f.body)]);
    }
    println!("{}", table);
}

fn print_rules() {
    for (cat, platform) in analyser::categories() {
        let scope = match platform { Some(p) => format!(" ({:?} only)", p), None => String::new() };
        println!("{}", paint(&format!("{}{}", cat.name, scope), "1;36"));
        for r in cat.rules {
            if r.enabled_by_default { println!("  {}", r.name); } else { println!("  {} {}", r.name, paint("(off by default)", "2")); }
        }
    }
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

fn sev_code(s: Severity) -> &'static str { match s { Severity::Critical => "1;31", Severity::Warning => "33", Severity::Info => "34", Severity::None => "37" } }

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args { file: Some("obs.txt".into()), ..Default::default() }
    }

    #[test]
    fn cli_requires_exactly_one_source() {
        assert!(Args::try_parse_from(["ObsDoctor"]).is_err());
        assert!(Args::try_parse_from(["ObsDoctor", "-u", "https://pastebin.com/aB3dE5gH", "-f", "obs.txt"]).is_err());
        let a = Args::try_parse_from(["ObsDoctor", "-f", "obs.txt", "--enable-rule", "game-mode", "--enable-rule", "autoconfig"]).unwrap();
        assert_eq!(a.enable_rule, vec!["game-mode", "autoconfig"]);
        assert!(Args::try_parse_from(["ObsDoctor", "--list-rules"]).is_ok());
    }

    #[test]
    fn config_fills_only_unset_values() {
        let mut args = base_args();
        args.html = Some("mine.html".into());
        let cfg: AppConfig = toml::from_str(r#"
            output = "json"
            min_severity = "warning"
            html = "theirs.html"
            enable_rules = ["game-mode"]
            timeout_secs = 30
        "#).unwrap();
        apply_config(&mut args, cfg);
        assert_eq!(args.output, OutputFmt::Json);
        assert_eq!(args.min_severity, Some(MinSeverity::Warning));
        assert_eq!(args.html.as_deref(), Some("mine.html"));
        assert_eq!(args.enable_rule, vec!["game-mode"]);
        assert_eq!(args.timeout_secs, 30);
    }

    #[test]
    fn today_is_parsed_strictly() {
        assert_eq!(parse_today(Some("2021-06-01")).unwrap(), NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert!(parse_today(Some("01/06/2021")).is_err());
        assert!(parse_today(None).is_ok());
    }

    #[test]
    fn run_reads_file_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("obs.txt");
        std::fs::write(&p, "CPU Name: Intel(R) Pentium(R) CPU G4560\nOBS 26.1.0 (64-bit, windows)\nWindows Version: 10.0 Build 19041 (release: 2004; revision: 450; 64-bit)\n").unwrap();
        let args = Args {
            file: Some(p.to_string_lossy().into_owned()),
            today: Some("2021-06-01".into()),
            min_severity: Some(MinSeverity::Critical),
            rules: Some(dir.path().join("none.json").to_string_lossy().into_owned()),
            quiet: true,
            ..Default::default()
        };
        let rep = run(&args).unwrap();
        assert_eq!(rep.findings.len(), 1);
        assert_eq!(rep.findings[0].title, "Insufficient Hardware");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args { file: Some(dir.path().join("gone.txt").to_string_lossy().into_owned()), today: Some("2021-06-01".into()), ..Default::default() };
        assert!(run(&args).is_err());
    }

    #[test]
    fn quiet_silences_every_stdout_format() {
        let mut args = base_args();
        assert!(prints_findings(&args));
        args.quiet = true;
        assert!(!prints_findings(&args));
        args.text_format = TextFormat::Table;
        assert!(!prints_findings(&args));
        args.output = OutputFmt::Json;
        assert!(!prints_findings(&args));
        args.quiet = false;
        assert!(prints_findings(&args));
        args.json_path = Some("out.json".into());
        assert!(!prints_findings(&args));
    }

    #[test]
    fn config_option_conversion() {
        assert_eq!(Severity::from(MinSeverity::Info), Severity::Info);
        assert_eq!(sev_code(Severity::Critical), "1;31");
    }
}
