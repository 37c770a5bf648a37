use crate::job::choose_auth;

use models::{AuthChoice, CookieJar};

const NETSCAPE_LINE: &str = ".udemy.com\tTRUE\t/\tTRUE\t0\taccess_token\tabc";

/// **VALUE**: Verifies that a jar with at least one cookie selects cookie-file auth.
///
/// **WHY THIS MATTERS**: Cookie auth is the preferred path and the only one that works
/// for users whose browser profile is locked.
///
/// **BUG THIS CATCHES**: Would catch the fallback being chosen even when cookies exist.
#[test]
fn given_usable_jar_when_choosing_auth_then_uses_cookie_file() {
    let jar = CookieJar::new(NETSCAPE_LINE, 1);

    let choice = choose_auth(Some(&jar), "chrome");

    assert!(choice.uses_cookie_file());
    assert_eq!(choice.browser(), "file");
    match choice {
        AuthChoice::CookieFile { cookies } => assert_eq!(cookies.expose(), NETSCAPE_LINE),
        other => panic!("Expected CookieFile, got {other:?}"),
    }
}

/// **VALUE**: Verifies that an empty jar falls back to the browser profile.
///
/// **WHY THIS MATTERS**: An empty cookie file makes the downloader fail authentication
/// outright, while the browser profile may still work.
///
/// **BUG THIS CATCHES**: Would catch a check on `Some(jar)` alone instead of usability.
#[test]
fn given_empty_jar_when_choosing_auth_then_falls_back_to_browser_profile() {
    let jar = CookieJar::empty();

    let choice = choose_auth(Some(&jar), "chrome");

    assert_eq!(choice, AuthChoice::BrowserProfile(String::from("chrome")));
}

#[test]
fn given_no_jar_when_choosing_auth_then_uses_configured_profile() {
    let choice = choose_auth(None, "firefox");
    assert_eq!(choice.browser(), "firefox");
}

/// **VALUE**: Verifies that a jar claiming cookies but holding only whitespace is not usable.
///
/// **BUG THIS CATCHES**: Would catch trusting the cookie count without looking at the text.
#[test]
fn given_blank_text_with_count_when_choosing_auth_then_falls_back() {
    let jar = CookieJar::new("   \n", 3);
    assert!(!choose_auth(Some(&jar), "chrome").uses_cookie_file());
}
