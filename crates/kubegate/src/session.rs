//! Cookie-backed session store.
//!
//! Three encrypted fragments ride in the browser: the login state (CSRF
//! nonce plus selected cluster), the ID token, and the refresh token. The
//! jar's AEAD makes tampered or undecryptable cookies read as absent, so
//! there is no third "invalid" state; any missing fragment downstream means
//! "not authenticated".

use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

pub const SESSION_COOKIE: &str = "kubegate";
pub const ID_TOKEN_COOKIE: &str = "kubegate_id_token";
pub const REFRESH_TOKEN_COOKIE: &str = "kubegate_refresh_token";

/// Derive the cookie encryption key from the configured secret and salt.
/// SHA-512 yields exactly the 64 bytes `Key` requires.
pub fn derive_key(security_key: &str, salt: &str) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(security_key.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    Key::from(digest.as_slice())
}

/// Pending login: the CSRF nonce and which cluster it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    pub state: String,
    pub cluster: String,
}

fn session_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), "")).path("/").build()
}

pub fn store_login_state(
    jar: PrivateCookieJar,
    login: &LoginState,
    secure: bool,
) -> PrivateCookieJar {
    // LoginState has no non-serializable fields; to_string cannot fail.
    let value = serde_json::to_string(login).unwrap_or_default();
    jar.add(session_cookie(SESSION_COOKIE, value, secure))
}

/// `None` on absence or any parse failure.
pub fn read_login_state(jar: &PrivateCookieJar) -> Option<LoginState> {
    let cookie = jar.get(SESSION_COOKIE)?;
    serde_json::from_str(cookie.value()).ok()
}

pub fn remove_login_state(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(removal_cookie(SESSION_COOKIE))
}

/// Both token fragments are always written together; a provider that issued
/// no refresh token gets an empty fragment. A fragment missing downstream
/// therefore always means the session is broken.
pub fn store_tokens(
    jar: PrivateCookieJar,
    id_token: &str,
    refresh_token: Option<&str>,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(session_cookie(ID_TOKEN_COOKIE, id_token.to_string(), secure))
        .add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh_token.unwrap_or_default().to_string(),
            secure,
        ))
}

pub fn read_id_token(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(ID_TOKEN_COOKIE).map(|c| c.value().to_string())
}

pub fn read_refresh_token(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string())
}

/// Immediate-expiry removals for all three fragments. Idempotent.
pub fn clear_all(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(ID_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE))
}
