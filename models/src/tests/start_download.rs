use crate::start_download::COOKIE_FILE_BROWSER;
use crate::{AuthChoice, ModelError, StartDownloadPayloadBuilder, StartJobRequest};

use common::RedactedSecret;

use serde_json::json;

fn browser_profile() -> AuthChoice {
    AuthChoice::BrowserProfile(String::from("chrome"))
}

/// **VALUE**: Verifies that builder validation rejects non-http course URLs.
///
/// **WHY THIS MATTERS**: The companion passes the URL straight to the downloader command line.
///
/// **BUG THIS CATCHES**: Would catch the scheme check being removed.
#[test]
fn given_non_http_course_url_when_building_then_returns_validation_error() {
    // GIVEN: A builder with a file URL
    let builder = StartDownloadPayloadBuilder::default()
        .with_course_url("file:///etc/passwd")
        .with_auth(browser_profile());

    // WHEN
    let result = builder.build();

    // THEN
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert!(message.contains("Invalid course URL format"));
        }
        Ok(payload) => panic!("Expected validation error, got {payload:?}"),
    }
}

#[test]
fn given_missing_auth_when_building_then_returns_validation_error() {
    let result = StartDownloadPayloadBuilder::default()
        .with_course_url("https://www.udemy.com/course/rust/")
        .build();

    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Auth choice is required");
        }
        Ok(payload) => panic!("Expected validation error, got {payload:?}"),
    }
}

#[test]
fn given_zero_quality_when_building_then_returns_validation_error() {
    let result = StartDownloadPayloadBuilder::default()
        .with_course_url("https://www.udemy.com/course/rust/")
        .with_auth(browser_profile())
        .with_quality(0)
        .build();

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

/// **VALUE**: Verifies the cookie-file auth path on the wire.
///
/// **WHY THIS MATTERS**: With cookies attached the companion must be told `browser=file` and
/// that cookies are preferred, otherwise it ignores the file.
///
/// **BUG THIS CATCHES**: Would catch `preferCookies` or `cookiesTxt` missing from the JSON.
#[test]
fn given_cookie_file_auth_when_serialized_then_carries_cookies_and_preference() {
    // GIVEN: A payload with a cookie file
    let payload = StartDownloadPayloadBuilder::default()
        .with_course_url("https://www.udemy.com/course/rust/")
        .with_auth(AuthChoice::CookieFile {
            cookies: RedactedSecret::new("# Netscape HTTP Cookie File\n"),
        })
        .build()
        .expect("valid payload");

    // WHEN
    let value = serde_json::to_value(&payload).expect("serializable");

    // THEN
    assert_eq!(value["browser"], json!(COOKIE_FILE_BROWSER));
    assert_eq!(value["preferCookies"], json!(true));
    assert_eq!(value["cookiesTxt"], json!("# Netscape HTTP Cookie File\n"));
    assert_eq!(value["captionLang"], json!("en"));
    assert!(value.get("bearer").is_none());
    assert!(value.get("skipHls").is_none());
}

/// **VALUE**: Verifies that a request's options all land in the payload, bearer included.
///
/// **WHY THIS MATTERS**: The companion retries with the bearer when cookies fail; if the
/// bearer is not on the wire that retry cannot happen.
///
/// **BUG THIS CATCHES**: Would catch `from_request` forgetting a field.
#[test]
fn given_full_request_when_built_from_request_then_payload_mirrors_it() {
    // GIVEN: A request using every option
    let mut request = StartJobRequest::new("  https://www.udemy.com/course/rust/  ");
    request.download_assets = true;
    request.download_captions = true;
    request.caption_lang = Some(String::from("de"));
    request.quality = Some(720);
    request.out_dir = Some(String::from("/tmp/out"));
    request.bearer = Some(RedactedSecret::new("tok"));
    request.skip_hls = true;
    request.concurrent_downloads = Some(4);
    request.log_level = Some(String::from("DEBUG"));

    // WHEN
    let payload = StartDownloadPayloadBuilder::from_request(&request)
        .with_auth(browser_profile())
        .build()
        .expect("valid payload");
    let value = serde_json::to_value(&payload).expect("serializable");

    // THEN
    assert_eq!(
        value,
        json!({
            "courseUrl": "https://www.udemy.com/course/rust/",
            "downloadAssets": true,
            "downloadCaptions": true,
            "captionLang": "de",
            "quality": 720,
            "outDir": "/tmp/out",
            "browser": "chrome",
            "bearer": "tok",
            "preferCookies": false,
            "skipHls": true,
            "concurrentDownloads": 4,
            "logLevel": "DEBUG"
        })
    );
}

#[test]
fn given_payload_with_bearer_when_debug_formatted_then_bearer_is_redacted() {
    let payload = StartDownloadPayloadBuilder::default()
        .with_course_url("https://www.udemy.com/course/rust/")
        .with_auth(browser_profile())
        .with_bearer(RedactedSecret::new("super-secret-token"))
        .build()
        .expect("valid payload");

    assert!(!format!("{payload:?}").contains("super-secret-token"));
}
