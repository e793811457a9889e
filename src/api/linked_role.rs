use super::ApiState;
use crate::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

/// Session key of the OAuth state
const CSRF_TOKEN: &str = "linked-role:csrf_token";

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

pub async fn login(State(state): State<ApiState>, session: Session) -> Result<Redirect> {
    let (url, csrf_token) = state.oauth.login_url();
    session.insert(CSRF_TOKEN, csrf_token.secret()).await?;

    Ok(Redirect::temporary(url.as_str()))
}

/// Stores the user's tokens and pushes their current link status
pub async fn callback(
    State(state): State<ApiState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let expected = session.remove::<String>(CSRF_TOKEN).await?;
    if expected.as_deref() != Some(params.state.as_str()) {
        tracing::debug!("Linked role callback with mismatched state");
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let tokens = match state.oauth.exchange_code(params.code).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!("Could not exchange linked role code: {err}");
            return Ok(StatusCode::FORBIDDEN.into_response());
        }
    };

    let user = match state.oauth.fetch_user(&tokens.access_token).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!("Could not fetch linked role user: {err}");
            return Ok(StatusCode::FORBIDDEN.into_response());
        }
    };

    state.storage.user_settings.upsert_tokens(user.id, tokens).await?;

    let username = state.storage.users.get(user.id).map(|user| user.username);
    if let Err(err) = state
        .oauth
        .update_role_connection(&state.storage.user_settings, user.id, username.as_deref())
        .await
    {
        tracing::warn!("Could not update role connection of {}: {err}", user.id);
    }

    Ok(format!(
        "You have been authorized as {}! You can now close this window and go back to Discord.",
        user.tag()
    )
    .into_response())
}

#[cfg(test)]
mod tests {
    use crate::api::{router, testing};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn rejects_callbacks_without_a_session() {
        let (state, _rx) = testing::state().await;

        let response = router(state)
            .oneshot(
                Request::get("/linked-role/callback?code=abc&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejects_mismatched_state() {
        let (state, _rx) = testing::state().await;
        let app = router(state);

        let login = app
            .clone()
            .oneshot(Request::get("/linked-role").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = login.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::get("/linked-role/callback?code=abc&state=not-the-state")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
