//! Protected pages: landing, commandline instructions, kubeconfig download.
//!
//! Every protected request re-verifies the stored ID token. Missing or
//! unverifiable fragments are not errors: the session is force-cleared and
//! the browser is sent back to the landing page.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::handlers::auth::ClusterQuery;
use crate::api::state::AppState;
use crate::kubeconfig::{self, UserInfo};
use crate::oidc::OidcError;
use crate::session;
use crate::templates;

/// Outcome of the per-request auth check.
enum AuthCheck {
    User(Box<UserInfo>),
    /// Session fragments were missing or no longer verify; the returned jar
    /// carries removals for all of them.
    NotAuthenticated(PrivateCookieJar),
}

/// `GET /` — cluster picker.
pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(templates::render_home(
        &state.root_path,
        &state.registry.names(),
    ))
}

/// `GET /commandline?cluster=` — setup instructions for kubectl.
pub async fn commandline(
    State(state): State<AppState>,
    Query(params): Query<ClusterQuery>,
    jar: PrivateCookieJar,
) -> ApiResult<Response> {
    match generate_info(&state, jar, params.cluster.as_deref()).await? {
        AuthCheck::User(info) => {
            Ok(Html(templates::render_commandline(&state.root_path, &info)).into_response())
        }
        AuthCheck::NotAuthenticated(jar) => {
            Ok((jar, Redirect::to(&state.home_url())).into_response())
        }
    }
}

/// `GET /kubeconf?cluster=` — download the assembled kubeconfig.
pub async fn kubeconf(
    State(state): State<AppState>,
    Query(params): Query<ClusterQuery>,
    jar: PrivateCookieJar,
) -> ApiResult<Response> {
    match generate_info(&state, jar, params.cluster.as_deref()).await? {
        AuthCheck::User(info) => {
            let yaml = kubeconfig::to_yaml(&kubeconfig::assemble(&info))
                .map_err(|e| ApiError::internal(format!("kubeconfig serialization: {e}")))?;
            Ok((
                [
                    (header::CONTENT_TYPE, "application/yaml"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"kubeconfig\"",
                    ),
                ],
                yaml,
            )
                .into_response())
        }
        AuthCheck::NotAuthenticated(jar) => {
            Ok((jar, Redirect::to(&state.home_url())).into_response())
        }
    }
}

/// Re-verify the session against the cluster's provider and assemble the
/// user identity. Central auth gate for every protected route.
async fn generate_info(
    state: &AppState,
    jar: PrivateCookieJar,
    cluster_name: Option<&str>,
) -> ApiResult<AuthCheck> {
    let name = cluster_name.ok_or(ApiError::MissingCluster)?;
    let cluster = state
        .registry
        .lookup(name)
        .ok_or_else(|| ApiError::UnknownCluster(name.to_string()))?;

    let Some(id_token) = session::read_id_token(&jar) else {
        debug!(cluster = %name, "no ID token in session");
        return Ok(AuthCheck::NotAuthenticated(session::clear_all(jar)));
    };
    // Fragments travel as a set; either one missing breaks the session.
    let Some(refresh_token) = session::read_refresh_token(&jar) else {
        debug!(cluster = %name, "no refresh token in session");
        return Ok(AuthCheck::NotAuthenticated(session::clear_all(jar)));
    };

    let provider = state.resolver.resolve(cluster).await?;
    let claims = match provider.verifier.verify(&id_token).await {
        Ok(claims) => claims,
        // A stale session is not an error: clear it and start over.
        Err(
            e @ (OidcError::Expired
            | OidcError::Verification(_)
            | OidcError::MissingKeyId
            | OidcError::KeyNotFound(_)),
        ) => {
            debug!(cluster = %name, error = %e, "session token no longer verifies");
            return Ok(AuthCheck::NotAuthenticated(session::clear_all(jar)));
        }
        Err(e) => return Err(e.into()),
    };

    let username = claims
        .required_str(&cluster.username_claim)
        .map_err(|_| ApiError::ClaimMissing(cluster.username_claim.clone()))?
        .to_string();
    let issuer = claims
        .required_str("iss")
        .map_err(|_| ApiError::ClaimMissing("iss".to_string()))?
        .to_string();
    if !cluster.email_claim.is_empty() {
        warn!(
            cluster = %name,
            "email_claim is deprecated and ignored; use username_claim"
        );
    }

    let info = UserInfo {
        cluster_name: cluster.name.clone(),
        kube_cfg_user: format!("{username}@{}", cluster.name),
        username,
        claims,
        id_token,
        refresh_token: (!refresh_token.is_empty()).then_some(refresh_token),
        client_id: cluster.client_id.clone(),
        client_secret: cluster.client_secret.clone(),
        issuer_url: issuer,
        api_server_url: cluster.api_server_url.clone(),
        cluster_ca: cluster.cluster_ca.clone(),
        trusted_ca: cluster.trusted_ca.clone(),
        show_claims: cluster.show_claims,
    };
    Ok(AuthCheck::User(Box::new(info)))
}
