use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, CreateAccessTokenRequest, CreateAccessTokenResponse, Credentials,
            PublicUser,
        },
        extractors::AuthUser,
        services::{TokenService, UserService},
        session,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/token", post(create_access_token))
        .route("/api/me", get(get_me))
}

/// Cookie-session routes for form clients.
pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup_form))
        .route("/login", post(login_form))
        .route("/logout", get(logout))
}

#[instrument(skip(users, payload))]
pub async fn signup(
    State(users): State<UserService>,
    Json(payload): Json<Credentials>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = users.signup(&payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            email: user.email,
        }),
    ))
}

#[instrument(skip(users, tokens, payload))]
pub async fn login(
    State(users): State<UserService>,
    State(tokens): State<TokenService>,
    Json(payload): Json<Credentials>,
) -> AppResult<Json<AuthResponse>> {
    let user = users.authenticate(&payload.email, &payload.password).await?;
    let pair = tokens.issue_pair(&user).await?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

#[instrument(skip(tokens, payload))]
pub async fn create_access_token(
    State(tokens): State<TokenService>,
    Json(payload): Json<CreateAccessTokenRequest>,
) -> AppResult<(StatusCode, Json<CreateAccessTokenResponse>)> {
    let access_token = tokens.refresh(&payload.refresh_token).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateAccessTokenResponse { access_token }),
    ))
}

#[instrument(skip(users))]
pub async fn get_me(
    State(users): State<UserService>,
    principal: AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = users.find_by_id(principal.id).await?;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}

#[instrument(skip(users, payload))]
pub async fn signup_form(
    State(users): State<UserService>,
    Form(payload): Form<Credentials>,
) -> AppResult<Redirect> {
    match users.signup(&payload.email, &payload.password).await {
        Ok(_) => Ok(Redirect::to("/login")),
        Err(AppError::Validation(_) | AppError::EmailTaken) => Ok(Redirect::to("/signup?error")),
        Err(e) => Err(e),
    }
}

#[instrument(skip(state, users, payload))]
pub async fn login_form(
    State(state): State<AppState>,
    State(users): State<UserService>,
    Form(payload): Form<Credentials>,
) -> AppResult<Response> {
    let user = match users.authenticate(&payload.email, &payload.password).await {
        Ok(u) => u,
        Err(AppError::InvalidCredentials) => return Ok(Redirect::to("/login?error").into_response()),
        Err(e) => return Err(e),
    };
    let id = state.sessions.create(user.id, &user.email).await;
    info!(user_id = user.id, "session login");
    Ok((
        [(header::SET_COOKIE, state.sessions.set_cookie(id))],
        Redirect::to("/articles"),
    )
        .into_response())
}

/// Ends the session and drops the user's refresh token.
#[instrument(skip(state, tokens, headers))]
pub async fn logout(
    State(state): State<AppState>,
    State(tokens): State<TokenService>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(id) = session::session_id(&headers) {
        if let Some(s) = state.sessions.remove(id).await {
            tokens.revoke(s.user_id).await?;
            info!(user_id = s.user_id, "session logout");
        }
    }
    Ok((
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Redirect::to("/login"),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::app::build_app;

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn location(resp: &Response) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn login_json(app: &axum::Router) -> serde_json::Value {
        let creds = json!({"email": "user@email.com", "password": "password1"});
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/signup", creds.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/login", creds))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await
    }

    #[tokio::test]
    async fn create_new_access_token() {
        let app = build_app(AppState::fake());
        let login = login_json(&app).await;
        assert_eq!(login["user"]["email"], "user@email.com");
        let refresh = login["refreshToken"].as_str().unwrap();

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/token",
                json!({ "refreshToken": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert!(!body["accessToken"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_rejected() {
        let app = build_app(AppState::fake());
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/token",
                json!({ "refreshToken": "not-a-token" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn me_requires_and_resolves_bearer_token() {
        let app = build_app(AppState::fake());
        let resp = app
            .clone()
            .oneshot(Request::get("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let login = login_json(&app).await;
        let access = login["accessToken"].as_str().unwrap();
        let resp = app
            .oneshot(
                Request::get("/api/me")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["email"], "user@email.com");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = build_app(AppState::fake());
        login_json(&app).await;
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({"email": "user@email.com", "password": "wrong-pass"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn form_signup_login_logout() {
        let app = build_app(AppState::fake());

        let resp = app
            .clone()
            .oneshot(form_request("/signup", "email=user%40email.com&password=password1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/login");

        let resp = app
            .clone()
            .oneshot(form_request("/login", "email=user%40email.com&password=bad-pass1"))
            .await
            .unwrap();
        assert_eq!(location(&resp), "/login?error");

        let resp = app
            .clone()
            .oneshot(form_request("/login", "email=user%40email.com&password=password1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/articles");
        let set_cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_owned();

        let me = |cookie: String| {
            Request::get("/api/me")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap()
        };
        let resp = app.clone().oneshot(me(cookie.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(
                Request::get("/logout")
                    .header(header::COOKIE, cookie.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(location(&resp), "/login");

        let resp = app.oneshot(me(cookie)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_cookie_authorizes_article_creation_until_logout() {
        let app = build_app(AppState::fake());
        let creds = "email=writer%40email.com&password=password1";
        app.clone()
            .oneshot(form_request("/signup", creds))
            .await
            .unwrap();
        let resp = app
            .clone()
            .oneshot(form_request("/login", creds))
            .await
            .unwrap();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_owned();

        let create = |cookie: &str| {
            Request::post("/api/articles")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"title": "title", "content": "content"}).to_string(),
                ))
                .unwrap()
        };

        let resp = app.clone().oneshot(create(&cookie)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await["author"], "writer@email.com");

        let resp = app
            .clone()
            .oneshot(
                Request::get("/logout")
                    .header(header::COOKIE, cookie.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(location(&resp), "/login");

        let resp = app.oneshot(create(&cookie)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"]["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn form_signup_with_bad_input_redirects_back() {
        let app = build_app(AppState::fake());
        let resp = app
            .oneshot(form_request("/signup", "email=nope&password=password1"))
            .await
            .unwrap();
        assert_eq!(location(&resp), "/signup?error");
    }
}
