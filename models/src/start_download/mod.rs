//! The `udemy.start` payload and the caller-side request it is built from.

pub mod builder;

use common::RedactedSecret;
use common::redacted_secret::serialize_exposed;

use serde::Serialize;

/// `browser` value telling the companion to read the attached cookie file.
pub const COOKIE_FILE_BROWSER: &str = "file";

/// Caption language used when the caller leaves it blank.
pub const DEFAULT_CAPTION_LANG: &str = "en";

/// Cookies exported from the user's browser, already rendered in Netscape
/// cookie-file format by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieJar {
    netscape_text: RedactedSecret,
    cookie_count: usize,
}

impl CookieJar {
    pub fn new(netscape_text: impl Into<String>, cookie_count: usize) -> Self {
        Self {
            netscape_text: RedactedSecret::new(netscape_text),
            cookie_count,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), 0)
    }

    pub fn cookie_count(&self) -> usize {
        self.cookie_count
    }

    pub fn netscape_text(&self) -> &RedactedSecret {
        &self.netscape_text
    }

    /// At least one cookie and a non-blank body.
    pub fn is_usable(&self) -> bool {
        self.cookie_count > 0 && !self.netscape_text.expose().trim().is_empty()
    }
}

/// How the companion should authenticate the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChoice {
    /// Use the attached cookie file; cookies are preferred.
    CookieFile { cookies: RedactedSecret },
    /// Let the downloader read cookies from a local browser profile.
    BrowserProfile(String),
}

impl AuthChoice {
    /// Value of the `browser` payload field.
    pub fn browser(&self) -> &str {
        match self {
            AuthChoice::CookieFile { .. } => COOKIE_FILE_BROWSER,
            AuthChoice::BrowserProfile(profile) => profile,
        }
    }

    pub fn uses_cookie_file(&self) -> bool {
        matches!(self, AuthChoice::CookieFile { .. })
    }
}

/// What a caller asks for when starting a download.
#[derive(Debug, Clone)]
pub struct StartJobRequest {
    pub course_url: String,
    pub download_assets: bool,
    pub download_captions: bool,
    pub caption_lang: Option<String>,
    pub quality: Option<u32>,
    pub out_dir: Option<String>,
    /// `None` when the user opted out of sending browser cookies.
    pub cookies: Option<CookieJar>,
    pub bearer: Option<RedactedSecret>,
    pub skip_hls: bool,
    pub keep_vtt: bool,
    pub continue_lecture_numbers: bool,
    pub concurrent_downloads: Option<u32>,
    pub log_level: Option<String>,
}

impl StartJobRequest {
    pub fn new(course_url: impl Into<String>) -> Self {
        Self {
            course_url: course_url.into(),
            download_assets: false,
            download_captions: false,
            caption_lang: None,
            quality: None,
            out_dir: None,
            cookies: None,
            bearer: None,
            skip_hls: false,
            keep_vtt: false,
            continue_lecture_numbers: false,
            concurrent_downloads: None,
            log_level: None,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Validated `udemy.start` payload, serialized with the companion's camelCase keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDownloadPayload {
    pub course_url: String,
    pub download_assets: bool,
    pub download_captions: bool,
    pub caption_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    #[serde(
        serialize_with = "serialize_exposed",
        skip_serializing_if = "Option::is_none"
    )]
    pub cookies_txt: Option<RedactedSecret>,
    pub browser: String,
    #[serde(
        serialize_with = "serialize_exposed",
        skip_serializing_if = "Option::is_none"
    )]
    pub bearer: Option<RedactedSecret>,
    pub prefer_cookies: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub skip_hls: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub keep_vtt: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub continue_lecture_numbers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_downloads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}
