//! Login, callback, and logout handlers.
//!
//! The callback rejects before doing anything else: a mismatched or missing
//! state returns 403 with no cookie writes and no code exchange, and token
//! cookies are only written after the ID token fully verifies.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum_extra::extract::PrivateCookieJar;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::session::{self, LoginState};

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub cluster: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// 256-bit URL-safe CSRF nonce.
fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `GET /login?cluster=` — start the authorization-code flow.
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<ClusterQuery>,
    jar: PrivateCookieJar,
) -> ApiResult<(PrivateCookieJar, Redirect)> {
    let name = params.cluster.ok_or(ApiError::MissingCluster)?;
    let cluster = state
        .registry
        .lookup(&name)
        .ok_or_else(|| ApiError::UnknownCluster(name.clone()))?;

    let provider = state.resolver.resolve(cluster).await?;

    let nonce = random_state();
    let url = provider.authorization_url(&nonce)?;
    let jar = session::store_login_state(
        jar,
        &LoginState {
            state: nonce,
            cluster: name.clone(),
        },
        state.secure_cookies,
    );

    info!(cluster = %name, "redirecting to authorization endpoint");
    Ok((jar, Redirect::to(&url)))
}

/// `GET /callback?state=&code=` — finish the flow.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
    jar: PrivateCookieJar,
) -> ApiResult<(PrivateCookieJar, Redirect)> {
    // No pending login means no state to match against.
    let login = session::read_login_state(&jar).ok_or(ApiError::CsrfMismatch)?;
    let returned_state = params.state.ok_or(ApiError::CsrfMismatch)?;
    if returned_state.as_bytes() != login.state.as_bytes() {
        return Err(ApiError::CsrfMismatch);
    }
    let code = params.code.ok_or(ApiError::MissingCode)?;

    let cluster = state
        .registry
        .lookup(&login.cluster)
        .ok_or_else(|| {
            ApiError::internal(format!(
                "session references unconfigured cluster {:?}",
                login.cluster
            ))
        })?;

    let provider = state.resolver.resolve(cluster).await?;
    let tokens = provider.exchange_code(&code).await?;

    // Verify before any token cookie is written.
    provider.verifier.verify(&tokens.id_token).await?;

    let jar = session::remove_login_state(jar);
    let jar = session::store_tokens(
        jar,
        &tokens.id_token,
        tokens.refresh_token.as_deref(),
        state.secure_cookies,
    );

    info!(cluster = %login.cluster, "login completed");
    let target = format!(
        "{}/commandline?cluster={}",
        state.root_path,
        urlencoding::encode(&login.cluster)
    );
    Ok((jar, Redirect::to(&target)))
}

/// `GET /logout` — drop every session fragment. Idempotent.
pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let jar = session::clear_all(jar);
    (jar, Redirect::to(&state.home_url()))
}
