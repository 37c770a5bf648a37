use crate::error::model_error::ModelError;
use crate::start_download::{
    AuthChoice, DEFAULT_CAPTION_LANG, StartDownloadPayload, StartJobRequest,
};

use common::{ErrorLocation, RedactedSecret};

use std::panic::Location;

/// Builder for validated `udemy.start` payloads.
///
/// The auth choice is supplied separately because the cookie/browser
/// fallback policy belongs to the caller, not to the wire model.
#[derive(Debug, Default)]
pub struct StartDownloadPayloadBuilder {
    course_url: Option<String>,
    download_assets: bool,
    download_captions: bool,
    caption_lang: Option<String>,
    quality: Option<u32>,
    out_dir: Option<String>,
    auth: Option<AuthChoice>,
    bearer: Option<RedactedSecret>,
    skip_hls: bool,
    keep_vtt: bool,
    continue_lecture_numbers: bool,
    concurrent_downloads: Option<u32>,
    log_level: Option<String>,
}

impl StartDownloadPayloadBuilder {
    /// Seed every field except the auth choice from a caller request.
    pub fn from_request(request: &StartJobRequest) -> Self {
        Self {
            course_url: Some(request.course_url.clone()),
            download_assets: request.download_assets,
            download_captions: request.download_captions,
            caption_lang: request.caption_lang.clone(),
            quality: request.quality,
            out_dir: request.out_dir.clone(),
            auth: None,
            bearer: request.bearer.clone(),
            skip_hls: request.skip_hls,
            keep_vtt: request.keep_vtt,
            continue_lecture_numbers: request.continue_lecture_numbers,
            concurrent_downloads: request.concurrent_downloads,
            log_level: request.log_level.clone(),
        }
    }

    pub fn with_course_url(mut self, url: impl Into<String>) -> Self {
        self.course_url = Some(url.into());
        self
    }

    pub fn with_assets(mut self, download_assets: bool) -> Self {
        self.download_assets = download_assets;
        self
    }

    pub fn with_captions(mut self, download_captions: bool, lang: Option<String>) -> Self {
        self.download_captions = download_captions;
        self.caption_lang = lang;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<String>) -> Self {
        self.out_dir = Some(out_dir.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthChoice) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_bearer(mut self, bearer: RedactedSecret) -> Self {
        self.bearer = Some(bearer);
        self
    }

    pub fn with_concurrent_downloads(mut self, count: u32) -> Self {
        self.concurrent_downloads = Some(count);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Build the payload with validation.
    #[track_caller]
    pub fn build(self) -> Result<StartDownloadPayload, ModelError> {
        let course_url = self
            .course_url
            .map(|url| url.trim().to_string())
            .ok_or_else(|| ModelError::Validation {
                message: String::from("Course URL is required"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if course_url.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Course URL cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !course_url.starts_with("http://") && !course_url.starts_with("https://") {
            return Err(ModelError::Validation {
                message: format!("Invalid course URL format: {course_url}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let auth = self.auth.ok_or_else(|| ModelError::Validation {
            message: String::from("Auth choice is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if auth.browser().trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Browser profile cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.quality == Some(0) {
            return Err(ModelError::Validation {
                message: String::from("Quality must be positive"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.concurrent_downloads == Some(0) {
            return Err(ModelError::Validation {
                message: String::from("Concurrent downloads must be positive"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.bearer.as_ref().is_some_and(RedactedSecret::is_empty) {
            return Err(ModelError::Validation {
                message: String::from("Bearer credential cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let caption_lang = self
            .caption_lang
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_CAPTION_LANG.to_string());

        let out_dir = self
            .out_dir
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());

        let browser = auth.browser().to_string();
        let (cookies_txt, prefer_cookies) = match auth {
            AuthChoice::CookieFile { cookies } => (Some(cookies), true),
            AuthChoice::BrowserProfile(_) => (None, false),
        };

        Ok(StartDownloadPayload {
            course_url,
            download_assets: self.download_assets,
            download_captions: self.download_captions,
            caption_lang,
            quality: self.quality,
            out_dir,
            cookies_txt,
            browser,
            bearer: self.bearer,
            prefer_cookies,
            skip_hls: self.skip_hls,
            keep_vtt: self.keep_vtt,
            continue_lecture_numbers: self.continue_lecture_numbers,
            concurrent_downloads: self.concurrent_downloads,
            log_level: self.log_level,
        })
    }
}
