//! Login form page.

use askama::Template;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use lidp_idp::LOGIN_PATH;

/// Login page template.
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    /// Pending request the form answers.
    pub request_id: String,
    /// Error from a previous attempt.
    pub error: Option<String>,
    /// Form action URL.
    pub action: String,
}

/// Query parameters of the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Pending request ID.
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    /// Error message.
    pub error: Option<String>,
}

/// Shows the login form.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Response {
    let template = LoginTemplate {
        request_id: query.request_id,
        error: query.error.filter(|e| !e.is_empty()),
        action: LOGIN_PATH.to_string(),
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
