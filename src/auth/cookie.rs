/// Refresh token cookie handling
///
/// The refresh token only ever travels in an HttpOnly cookie scoped to the
/// auth routes. Its lifetime matches the refresh token's.

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponseBuilder};

use crate::configuration::CookieSettings;

#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    path: String,
    secure: bool,
    same_site: SameSite,
    max_age_seconds: i64,
}

fn parse_same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

impl SessionCookies {
    pub fn new(settings: &CookieSettings, max_age_seconds: i64) -> Self {
        if !settings.secure {
            tracing::warn!("Refresh token cookie is not marked Secure; do not use in production");
        }
        Self {
            name: settings.name.clone(),
            path: settings.path.clone(),
            secure: settings.secure,
            same_site: parse_same_site(&settings.same_site),
            max_age_seconds,
        }
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(self.name.clone(), token.to_string())
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(Duration::seconds(self.max_age_seconds))
            .finish()
    }

    /// Empty value, Max-Age=0 and an expiry in the past
    pub fn expired_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.name.clone(), String::new())
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .finish();
        cookie.make_removal();
        cookie
    }

    pub fn set_refresh_cookie(&self, response: &mut HttpResponseBuilder, token: &str) {
        response.cookie(self.refresh_cookie(token));
    }

    pub fn clear_refresh_cookie(&self, response: &mut HttpResponseBuilder) {
        response.cookie(self.expired_cookie());
    }

    /// The refresh token sent by the client, if any. An empty value counts as absent.
    pub fn read_refresh_cookie(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}
