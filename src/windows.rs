use crate::finding::{html_escape, Finding};
use crate::rules::{Analysis, Category, Rule};
use crate::version;

pub static WINDOWS: Category = Category {
    name: "Windows",
    rules: &[
        Rule::one("windows-version", check_windows_ver),
        Rule::one("admin", check_admin),
        Rule::one("32bit-on-64bit", check_32bit_on_64bit),
        Rule::one("gpu", check_gpu),
        Rule::one("software-gpu", check_microsoft_software_gpu),
        Rule::one("opengl", check_open_gl_on_windows),
        Rule::one("game-dvr", check_game_dvr),
        Rule::one("hags", check_win10_hags),
        Rule::one("game-mode", check_game_mode).off_by_default(),
    ],
};

/// Builds before this numbered adapters from 1 instead of 0.
const ZERO_BASED_ADAPTERS_SINCE: &str = "23.2.1";
/// Up to this build, Windows 10 1909 was reported as 1903.
const MISREPORTS_1909_UNTIL: &str = "24.0.3";

const LAPTOP_GUIDE: &str = "<a href=\"https://obsproject.com/wiki/Laptop-Troubleshooting\">Laptop Troubleshooting Guide</a>";

fn check_windows_ver(a: &Analysis<'_>) -> Option<Finding> {
    let ver = a.facts.windows_version()?;
    if ver.is_unidentified_win10() {
        return Some(Finding::warning(
            "Windows 10 Version Unknown",
            format!("You are running an unknown Windows 10 release (build {}), which means you are probably using an Insider build. \
                     Some checks that are applicable only to specific Windows versions will not be performed. Also, because Insider builds \
                     are test versions, you may have problems that would not happen with release versions of Windows.", ver.build),
        ));
    }
    let name = html_escape(ver.name.as_deref()?);
    if let Some(eos) = ver.eos && a.opts.today > eos {
        return Some(Finding::warning(
            format!("{} (EOL)", name),
            format!("You are running {}, which has not been supported by Microsoft since <strong>{}</strong>. \
                     We recommend updating to the latest Windows release to ensure continued security, functionality, and compatibility.",
                    name, eos.format("%B %Y")),
        ));
    }
    if ver.is_win10() && ver.release == 1903 && version::is_at_most(a.facts.app_version(), MISREPORTS_1909_UNTIL) {
        return Some(Finding::info(
            "Windows 10 1903/1909",
            "Due to a bug in OBS versions 24.0.3 and earlier, the exact release of Windows 10 you are using cannot be determined. \
             You are using either release 1903, or release 1909. Fortunately, there were no major changes in behavior between \
             Windows 10 release 1903 and Windows 10 release 1909, and instructions given here for release 1903 can also be used \
             for release 1909, and vice versa.",
        ));
    }
    let msg = match ver.eos {
        Some(eos) => format!("You are running {}, which will be supported by Microsoft until <strong>{}</strong>.", name, eos.format("%B %Y")),
        None => format!("You are running {}, for which Microsoft has not yet announced an end of life date.", name),
    };
    Some(Finding::info(format!("{} (OK)", name), msg))
}

fn check_admin(a: &Analysis<'_>) -> Option<Finding> {
    let line = a.log.first("Running as administrator")?;
    if line.split_whitespace().last() != Some("false") { return None; }
    if a.facts.render_lag_percent() >= 3.0 {
        return Some(Finding::warning(
            "Not Admin",
            "OBS is not running as Administrator. Because of this, OBS will not be able to Game Capture certain games, \
             and it will not be able to request a higher GPU priority for itself -- which is the likely cause of the render lag \
             you are currently experiencing. Run OBS as Administrator to help alleviate this problem.",
        ));
    }
    Some(Finding::info(
        "Not Admin",
        "OBS is not running as Administrator. This can lead to OBS not being able to Game Capture certain games. \
         If you are not running into issues, you can ignore this.",
    ))
}

fn check_32bit_on_64bit(a: &Analysis<'_>) -> Option<Finding> {
    let win = a.log.first("Windows Version")?;
    let obs = a.facts.version_line().unwrap_or("");
    if !win.contains("64-bit") || obs.contains("64-bit") { return None; }
    Some(Finding::warning(
        "32-bit OBS on 64-bit Windows",
        "You are running the 32 bit version of OBS on a 64 bit system. This will reduce performance and greatly increase the risk \
         of crashes due to memory limitations. You should only use the 32 bit version if you have a capture device that lacks \
         64 bit drivers. Please run OBS using the 64-bit shortcut.",
    ))
}

fn check_gpu(a: &Analysis<'_>) -> Option<Finding> {
    let (first, second) = if version::is_older_than(a.facts.app_version(), ZERO_BASED_ADAPTERS_SINCE) { ("Adapter 1", "Adapter 2") } else { ("Adapter 0", "Adapter 1") };
    let mut adapters = a.log.search(first);
    if let Some(l) = a.log.first(second) { adapters.push(l); }
    let d3d = a.log.first("Loading up D3D11")?;
    let wrong_gpu = |kind: &str| Finding::critical(
        "Wrong GPU",
        format!("Your Laptop has two GPUs. OBS is running on the weak integrated {} GPU. \
                 For better performance as well as game capture being available you should run OBS on the dedicated GPU. \
                 Check the {}.", kind, LAPTOP_GUIDE),
    );
    match adapters.len() {
        2 if d3d.contains("Intel") => Some(wrong_gpu("Intel")),
        2 if d3d.contains("Vega") => Some(wrong_gpu("AMD Vega")),
        1 if adapters[0].contains("Intel") => Some(Finding::warning(
            "Integrated GPU",
            "OBS is running on an Intel iGPU. This hardware is generally not powerful enough to be used for both gaming and running OBS. \
             Situations where only sources from e.g. cameras and capture cards are used might work.",
        )),
        _ => None,
    }
}

fn check_microsoft_software_gpu(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Microsoft Basic Render Driver") { return None; }
    Some(Finding::critical(
        "No GPU driver available",
        "Your GPU is using the Microsoft Basic Render Driver, which is a pure software render. \
         This will cause very high CPU load when used with OBS. Make sure to install proper drivers for your GPU. \
         To use OBS in a virtual machine, you need to enable GPU passthrough.",
    ))
}

fn check_open_gl_on_windows(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Warning: The OpenGL renderer is currently in use.") { return None; }
    Some(Finding::critical(
        "OpenGL Renderer",
        "The OpenGL renderer should not be used on Windows, as it is not well optimized and can have visual artifacting. \
         Switch back to the Direct3D renderer in Settings > Advanced.",
    ))
}

fn check_game_dvr(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Game DVR Background Recording: On") { return None; }
    Some(Finding::warning(
        "Windows 10 Game DVR",
        "To ensure that OBS Studio has the hardware resources it needs for realtime streaming and recording, \
         we recommend disabling the \"Game DVR Background Recording\" feature via \
         <a href=\"https://obsproject.com/wiki/How-to-disable-Windows-10-Gaming-Features#game-dvrcaptures\">these instructions</a>.",
    ))
}

fn check_win10_hags(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Hardware GPU Scheduler: On") { return None; }
    Some(Finding::critical(
        "Hardware-accelerated GPU Scheduler",
        "The new Windows 10 Hardware-accelerated GPU scheduling (\"HAGS\") added with version 2004 is currently known to cause \
         performance and capture issues with OBS, games and overlay tools. It's a new and experimental feature and we recommend \
         disabling it via <a href=\"ms-settings:display-advancedgraphics\">this screen</a> or \
         <a href=\"https://obsproject.com/wiki/How-to-disable-Windows-10-Hardware-GPU-Scheduler\">these instructions</a>.",
    ))
}

fn check_game_mode(a: &Analysis<'_>) -> Option<Finding> {
    let ver = a.facts.windows_version()?;
    if !ver.is_win10() || ver.is_unidentified_win10() { return None; }
    if a.log.contains("Game Mode: On") && ver.release < 1809 {
        return Some(Finding::warning(
            "Windows 10 Game Mode",
            "In some versions of Windows 10 (prior to version 1809), the \"Game Mode\" feature interferes with OBS Studio's normal \
             functionality by starving it of CPU and GPU resources. We recommend disabling it via \
             <a href=\"https://obsproject.com/wiki/How-to-disable-Windows-10-Gaming-Features#game-mode\">these instructions</a>.",
        ));
    }
    if a.log.contains("Game Mode: Off") {
        return Some(Finding::info(
            "Windows 10 Game Mode",
            "In Windows 10 versions 1809 and newer, we recommend that \"Game Mode\" be enabled for maximum gaming performance. \
             Game Mode can be enabled via the Windows 10 \"Settings\" app, under Gaming > <a href=\"ms-settings:gaming-gamemode\">Game Mode</a>.",
        ));
    }
    None
}
