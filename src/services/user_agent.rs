//! User-agent sniffing.
//!
//! Classification is heuristic: the first matching rule wins, and anything
//! unrecognized comes back as `None`.

use once_cell::sync::Lazy;
use regex::Regex;

/// An operating system family recognized from a user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    WindowsPhone,
    Windows,
    ChromeOs,
    Mac,
    Linux,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::WindowsPhone => "windows_phone",
            Platform::Windows => "windows",
            Platform::ChromeOs => "chrome_os",
            Platform::Mac => "mac",
            Platform::Linux => "linux",
        }
    }

    fn is_desktop(&self) -> bool {
        matches!(
            self,
            Platform::Windows | Platform::ChromeOs | Platform::Mac | Platform::Linux
        )
    }
}

/// The result of classifying a user-agent string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub platform: Option<Platform>,
    pub device_type: Option<String>,
}

static BOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)bot\b|bot/|crawl|spider|slurp|mediapartners|facebookexternalhit|bingpreview|headlesschrome|lighthouse|curl/|wget/|python-requests",
    )
    .expect("valid bot regex")
});

/// Browser rules in match order. Order matters: Edge and Opera also claim
/// Chrome, and Chrome also claims Safari.
static BROWSERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Edge", r"Edg(?:e|A|iOS)?/(\d+(?:\.\d+)*)"),
        ("Opera", r"(?:OPR|Opera)/(\d+(?:\.\d+)*)"),
        ("Samsung Browser", r"SamsungBrowser/(\d+(?:\.\d+)*)"),
        ("Firefox", r"(?:Firefox|FxiOS)/(\d+(?:\.\d+)*)"),
        ("Chrome", r"(?:Chrome|CriOS)/(\d+(?:\.\d+)*)"),
        ("Safari", r"Version/(\d+(?:\.\d+)*).*Safari/"),
        ("Internet Explorer", r"(?:MSIE |Trident/.*rv:)(\d+(?:\.\d+)*)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid browser regex")))
    .collect()
});

static PLATFORMS: Lazy<Vec<(Platform, Regex)>> = Lazy::new(|| {
    [
        (Platform::Ios, r"iPhone|iPad|iPod"),
        (Platform::WindowsPhone, r"Windows Phone"),
        (Platform::Android, r"Android"),
        (Platform::Windows, r"Windows"),
        (Platform::ChromeOs, r"CrOS"),
        (Platform::Mac, r"Macintosh|Mac OS X"),
        (Platform::Linux, r"Linux|X11"),
    ]
    .into_iter()
    .map(|(platform, pattern)| (platform, Regex::new(pattern).expect("valid platform regex")))
    .collect()
});

static TABLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"iPad|Tablet|PlayBook|Kindle|Silk/").expect("valid tablet regex"));

static MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Mobi|iPhone|iPod|Windows Phone|BlackBerry|Opera Mini").expect("valid mobile regex")
});

static MAC_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Mac OS X (\d+(?:[_.]\d+)*)").expect("valid mac version regex"));

static IOS_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"OS (\d+(?:_\d+)*) like Mac OS X").expect("valid ios version regex"));

static ANDROID_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Android (\d+(?:\.\d+)*)").expect("valid android version regex"));

static WINDOWS_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Windows NT (\d+\.\d+)").expect("valid windows version regex"));

/// Returns whether the user agent belongs to a crawler or scripted client.
pub fn is_bot(user_agent: &str) -> bool {
    BOT.is_match(user_agent)
}

fn detect_browser(user_agent: &str) -> (Option<String>, Option<String>) {
    BROWSERS
        .iter()
        .find_map(|(name, re)| {
            re.captures(user_agent).map(|caps| {
                let version = caps.get(1).map(|m| m.as_str().to_string());
                (Some(name.to_string()), version)
            })
        })
        .unwrap_or((None, None))
}

fn detect_platform(user_agent: &str) -> Option<Platform> {
    PLATFORMS
        .iter()
        .find(|(_, re)| re.is_match(user_agent))
        .map(|(platform, _)| *platform)
}

fn detect_device_type(user_agent: &str, platform: Option<Platform>) -> Option<String> {
    let device = if is_bot(user_agent) {
        "bot"
    } else if TABLET.is_match(user_agent)
        || (platform == Some(Platform::Android) && !user_agent.contains("Mobile"))
    {
        "tablet"
    } else if MOBILE.is_match(user_agent) {
        "mobile"
    } else if platform.is_some_and(|p| p.is_desktop()) {
        "desktop"
    } else {
        return None;
    };
    Some(device.to_string())
}

/// Classifies a user-agent string.
pub fn classify(user_agent: &str) -> UserAgentInfo {
    let (browser, browser_version) = detect_browser(user_agent);
    let platform = detect_platform(user_agent);
    let device_type = detect_device_type(user_agent, platform);

    UserAgentInfo {
        browser,
        browser_version,
        platform,
        device_type,
    }
}

fn mac_version(user_agent: &str) -> Option<String> {
    MAC_VERSION
        .captures(user_agent)
        .map(|caps| caps[1].replace('_', "."))
}

fn ios_version(user_agent: &str) -> Option<String> {
    IOS_VERSION
        .captures(user_agent)
        .map(|caps| caps[1].replace('_', "."))
}

fn android_version(user_agent: &str) -> Option<String> {
    ANDROID_VERSION
        .captures(user_agent)
        .map(|caps| caps[1].to_string())
}

fn windows_version(user_agent: &str) -> Option<String> {
    let nt = WINDOWS_VERSION.captures(user_agent)?;
    let name = match &nt[1] {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.1" | "5.2" => "XP",
        _ => return None,
    };
    Some(name.to_string())
}

/// Extracts the OS version for the platforms that have an extractor.
pub fn os_version(platform: Platform, user_agent: &str) -> Option<String> {
    match platform {
        Platform::Mac => mac_version(user_agent),
        Platform::Ios => ios_version(user_agent),
        Platform::Android => android_version(user_agent),
        Platform::Windows => windows_version(user_agent),
        _ => None,
    }
}
