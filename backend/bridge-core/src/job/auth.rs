use models::{AuthChoice, CookieJar};

use log::debug;

/// Cookie file when the jar holds at least one usable cookie, otherwise the
/// fallback browser profile.
pub fn choose_auth(cookies: Option<&CookieJar>, fallback_profile: &str) -> AuthChoice {
    match cookies {
        Some(jar) if jar.is_usable() => {
            debug!("Using cookie file with {} cookie(s)", jar.cookie_count());
            AuthChoice::CookieFile {
                cookies: jar.netscape_text().clone(),
            }
        }
        _ => {
            debug!("No usable cookies, falling back to browser profile {fallback_profile}");
            AuthChoice::BrowserProfile(fallback_profile.to_string())
        }
    }
}
