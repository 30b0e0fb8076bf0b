use crate::facts::Platform;
use crate::finding::{html_escape, Finding};
use crate::rules::{Analysis, Category, Rule};

pub static GRAPHICS: Category = Category {
    name: "Graphics",
    rules: &[
        Rule::one("video-init", check_video_init),
        Rule::many("video-settings", check_video_settings),
        Rule::one("refresh-rates", check_refreshes),
        Rule::one("render-lag", check_render_lag),
        Rule::one("amd-drivers", check_amd_drivers),
        Rule::one("nvidia-drivers", check_nvidia_drivers),
        Rule::one("geforce-940", check_geforce_940),
    ],
};

/// Refresh-rate mixing stopped hurting with this Windows 10 release.
const MIXED_REFRESH_FIXED_RELEASE: u32 = 2004;
const STREAM_PIXEL_FORMAT: &str = "NV12";

fn check_video_init(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("Failed to initialize video") { return None; }
    Some(Finding::critical(
        "Initialize Failed",
        "Failed to initialize video. Your GPU may not be supported, or your graphics drivers may need to be updated.",
    ))
}

fn check_refreshes(a: &Analysis<'_>) -> Option<Finding> {
    if a.facts.platform() != Platform::Windows { return None; }
    let refreshes = a.facts.monitor_refresh_rates();
    if refreshes.is_empty() { return None; }
    let ver = a.facts.windows_version()?;
    // 6.1 is unaffected; an unknown 10.0 build is assumed to be fine
    if ver.version == "6.1" || ver.is_unidentified_win10() { return None; }
    if ver.release >= MIXED_REFRESH_FIXED_RELEASE { return None; }
    let mut distinct: Vec<i64> = refreshes.iter().map(|(_, hz)| hz.round_ties_even() as i64).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() <= 1 { return None; }
    let mut breakdown = String::from("<br>");
    for (output, hz) in refreshes {
        breakdown.push_str(&format!("<br>{}: <strong>{}</strong>Hz", html_escape(output), hz.trunc() as i64));
    }
    Some(Finding::warning(
        "Mismatched Refresh Rates",
        format!("The version of Windows you are running has a limitation which causes performance issues \
                 in hardware accelerated applications (such as games) if multiple monitors with different \
                 refresh rates are present. Your system's monitors have {} different refresh rates, so you are affected by this limitation. \
                 <br><br>To fix this issue, we recommend updating to the Windows 10 May 2020 Update. Follow \
                 <a href=\"https://blogs.windows.com/windowsexperience/2020/05/27/how-to-get-the-windows-10-may-2020-update/\">these instructions</a> \
                 if you're not sure how to update.{}", distinct.len(), breakdown),
    ))
}

/// Whole percentages keep one decimal place, so 2 reads as "2.0".
fn lag_display(val: f64) -> String {
    if val.fract() == 0.0 { format!("{:.1}", val) } else { val.to_string() }
}

fn check_render_lag(a: &Analysis<'_>) -> Option<Finding> {
    let pct = a.facts.render_lag_percent();
    if pct == 0.0 { return None; }
    let val = lag_display(pct);
    let title = format!("{}% Rendering Lag", val);
    let body = format!("Your GPU is maxed out and OBS can't render scenes fast enough ({}% of frames lagged). \
                        Running a game without vertical sync or a frame rate limiter will frequently cause performance \
                        issues with OBS because your GPU will be maxed out. OBS requires a little GPU to render your scene. \
                        <br><br>Enable Vsync or set a reasonable frame rate limit that your GPU can handle without hitting \
                        100% usage. <br><br>If that's not enough you may also need to turn down some of the video quality \
                        options in the game. If you are experiencing issues in general while using OBS, your GPU may be \
                        overloaded for the settings you are trying to use.<br><br>Please check our guide for ideas why this \
                        may be happening, and steps you can take to correct it: \
                        <a href=\"https://obsproject.com/wiki/GPU-overload-issues\">GPU Overload Issues</a>.", val);
    Some(if pct >= 10.0 { Finding::critical(title, body) } else if pct >= 3.0 { Finding::warning(title, body) } else { Finding::info(title, body) })
}

fn check_amd_drivers(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("The AMF Runtime is very old and unsupported") { return None; }
    Some(Finding::warning(
        "AMD Drivers",
        "The AMF Runtime is very old and unsupported. The AMF Encoder will not work properly or not show up at all. \
         Consider updating your drivers by downloading the newest installer from \
         <a href=\"https://support.amd.com/en-us/download\">AMD's website</a>.",
    ))
}

fn check_nvidia_drivers(a: &Analysis<'_>) -> Option<Finding> {
    if !a.log.contains("[jim-nvenc] Current driver version does not support this NVENC version, please upgrade your driver") { return None; }
    Some(Finding::warning(
        "Old NVIDIA Drivers",
        "The installed NVIDIA driver does not support NVENC features needed for optimized encoders. \
         Consider updating your drivers by downloading the newest installer from \
         <a href=\"https://www.nvidia.de/Download/index.aspx\">NVIDIA's website</a>.",
    ))
}

fn check_geforce_940(a: &Analysis<'_>) -> Option<Finding> {
    if !(a.log.contains("NVIDIA GeForce 940") && a.log.contains("NVENC encoder")) { return None; }
    Some(Finding::critical(
        "NVENC Not Supported",
        "The NVENC Encoder is not supported on the NVIDIA 940 and 940MX. Recording fails to start because of this. \
         Please select \"Software (x264)\" or \"Hardware (QSV)\" as encoder instead in Settings > Output.",
    ))
}

/// The block printed after `video settings reset:`.
#[derive(Clone, Debug, PartialEq)]
struct VideoSettings {
    base: (f64, f64),
    output: (f64, f64),
    fps: f64,
    format: String,
    color_range: String,
}

fn last_token(line: &str) -> Option<&str> { line.split_whitespace().last() }

fn pair(tok: &str, sep: char) -> Option<(f64, f64)> {
    let (l, r) = tok.split_once(sep)?;
    Some((l.parse().ok()?, r.parse().ok()?))
}

fn read_video_settings(a: &Analysis<'_>) -> Option<VideoSettings> {
    let (idx, _) = a.log.search_with_index("video settings reset:").into_iter().last()?;
    let at = |off: usize| a.log.get(idx + off).and_then(last_token);
    let (fps_num, fps_den) = pair(at(4)?, '/')?;
    if fps_den == 0.0 { return None; }
    Some(VideoSettings {
        base: pair(at(1)?, 'x')?,
        output: pair(at(2)?, 'x')?,
        fps: fps_num / fps_den,
        format: at(5)?.to_string(),
        color_range: at(6)?.to_string(),
    })
}

fn is_16_9((w, h): (f64, f64)) -> bool {
    if h == 0.0 { return false; }
    let r = w / h;
    1.77 < r && r < 1.7787
}

fn check_video_settings(a: &Analysis<'_>) -> Vec<Finding> {
    let Some(vs) = read_video_settings(a) else { return vec![] };
    let mut res = vec![];
    if !is_16_9(vs.base) || !is_16_9(vs.output) {
        res.push(Finding::warning(
            "Non-Standard Aspect Ratio",
            "Almost all modern streaming services and video platforms expect video in 16:9 aspect ratio. \
             OBS is currently configured to record in an aspect ratio that differs from that. \
             You (or your viewers) will see black bars during playback. \
             Go to Settings -> Video and change your Canvas Resolution to one that is 16:9.",
        ));
    }
    if vs.format != STREAM_PIXEL_FORMAT {
        res.push(Finding::critical(
            "Wrong Color Format",
            "Color Formats other than NV12 are primarily intended for recording, and are not recommended \
             when streaming. Streaming may incur increased CPU usage due to color format conversion. \
             You can change your Color Format in Settings -> Advanced.",
        ));
    }
    if vs.fps != 60.0 && vs.fps != 30.0 {
        res.push(Finding::warning(
            "Non-Standard Framerate",
            "Framerates other than 30fps or 60fps may lead to playback issues like stuttering or screen tearing. \
             Stick to either of these for better compatibility with video players. \
             You can change your OBS frame rate in Settings -> Video.",
        ));
    }
    if vs.fps >= 144.0 {
        res.push(Finding::warning(
            "Excessively High Framerate",
            "Recording at a tremendously high framerate will not give you higher quality recordings. \
             Usually quite the opposite. Most computers cannot handle encoding at high framerates. \
             You can change your OBS frame rate in Settings -> Video.",
        ));
    }
    if vs.color_range.contains("Full") {
        res.push(Finding::warning(
            "Wrong YUV Color Range",
            "Having the YUV Color range set to \"Full\" will cause playback issues in certain browsers and \
             on various video platforms. Shadows, highlights and color will look off. \
             In OBS, go to \"Settings -> Advanced\" and set \"YUV Color Range\" back to \"Partial\".",
        ));
    }
    res
}
