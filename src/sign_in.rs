//! This file defines the routes for displaying the sign-in page and handling sign-in requests.
//! The auth module handles the session cookie and the guard on protected pages.

use std::sync::Arc;

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    AppState, Error, IdentityGateway,
    auth::{normalize_redirect_url, set_session_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, auth_layout, base, loading_spinner, password_input, text_input},
};

fn sign_in_form(email: &str, error_message: Option<&str>, redirect_url: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::SIGN_IN_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            (text_input("email", "Email", "email", "name@example.com", email))

            (password_input("", 0, error_message))

            button
                type="submit" id="submit-button" tabindex="0"
                class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Sign in"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400" {
                "Don't have an account? "
                a
                    href=(endpoints::SIGN_UP_VIEW) tabindex="0"
                    class="font-semibold leading-6 text-blue-600 hover:text-blue-500 dark:text-blue-500 dark:hover:text-blue-400"
                {
                  "Sign up"
                }
            }
        }
    }
}

fn parse_redirect_url(raw_url: Option<&str>, source: &str) -> Option<String> {
    match raw_url.and_then(normalize_redirect_url) {
        Some(redirect_url) => Some(redirect_url),
        None => {
            if let Some(redirect_url) = raw_url {
                tracing::warn!("Invalid redirect URL from {source}: {redirect_url}");
            }
            None
        }
    }
}

/// The query string of the sign-in page.
#[derive(Deserialize)]
pub struct RedirectQuery {
    /// The page to return to after signing in.
    pub redirect_url: Option<String>,
}

/// Display the sign-in page.
pub async fn get_sign_in_page(Query(query): Query<RedirectQuery>) -> Response {
    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "sign-in query");
    let sign_in_form = sign_in_form("", None, redirect_url.as_deref());
    let content = auth_layout(
        "Sign in",
        "Please enter your details.",
        &sign_in_form,
    );

    base("Sign In", &[], &content).into_response()
}

/// The state needed to sign in.
#[derive(Clone)]
pub struct SignInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The identity service that issues sessions.
    pub identity: Arc<dyn IdentityGateway>,
}

impl FromRef<AppState> for SignInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            identity: state.identity.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SignInState> for Key {
    fn from_ref(state: &SignInState) -> Self {
        state.cookie_key.clone()
    }
}

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect email or password.";

/// The data entered by the user in the sign-in form.
#[derive(Clone, Deserialize)]
pub struct SignInData {
    /// Email entered during sign-in.
    pub email: String,

    /// Password entered during sign-in.
    pub password: String,

    /// Optional URL to redirect to after signing in.
    /// Only accepted from the sign-in form submission.
    pub redirect_url: Option<String>,
}

/// Handler for sign-in requests via the POST method.
///
/// On a successful sign-in request, the session cookie is set and the client is redirected to the dashboard page
/// (or the page they were headed to before signing in).
/// Otherwise, the form is returned with an error message explaining the problem.
pub async fn post_sign_in(
    State(state): State<SignInState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<SignInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "sign-in form");
    let redirect_url = redirect_url.as_deref();

    let session = match state
        .identity
        .create_session(&user_data.email, &user_data.password)
        .await
    {
        Ok(session) => session,
        Err(Error::InvalidCredentials) => {
            return sign_in_form(
                &user_data.email,
                Some(INVALID_CREDENTIALS_ERROR_MSG),
                redirect_url,
            )
            .into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while signing in: {error}");
            return sign_in_form(
                &user_data.email,
                Some("An internal error occurred. Please try again later."),
                redirect_url,
            )
            .into_response();
        }
    };

    tracing::info!("user {} signed in", session.user_id);

    let redirect_url = redirect_url.unwrap_or(endpoints::ROOT);

    (
        StatusCode::OK,
        HxRedirect(redirect_url.to_owned()),
        set_session_cookie(jar, &session),
    )
        .into_response()
}

#[cfg(test)]
mod sign_in_page_tests {
    use axum::{extract::Query, http::StatusCode};
    use scraper::Selector;

    use crate::{
        endpoints,
        sign_in::{RedirectQuery, get_sign_in_page},
        test_utils::{
            assert_form_input, assert_form_submit_button_with_text, assert_hx_endpoint,
            assert_valid_html, must_get_form, parse_html_document,
        },
    };

    #[tokio::test]
    async fn sign_in_page_displays_form() {
        let response = get_sign_in_page(Query(RedirectQuery { redirect_url: None })).await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let form = must_get_form(&document);
        assert_hx_endpoint(&form, endpoints::SIGN_IN_API, "hx-post");
        assert_form_input(&form, "email", "email");
        assert_form_input(&form, "password", "password");
        assert_form_submit_button_with_text(&form, "Sign in");
    }

    #[tokio::test]
    async fn sign_in_page_keeps_safe_redirect_url() {
        let response = get_sign_in_page(Query(RedirectQuery {
            redirect_url: Some("/my-banks".to_owned()),
        }))
        .await;

        let document = parse_html_document(response).await;
        let hidden = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .next()
            .expect("No redirect URL input");
        assert_eq!(hidden.value().attr("value"), Some("/my-banks"));
    }

    #[tokio::test]
    async fn sign_in_page_drops_external_redirect_url() {
        let response = get_sign_in_page(Query(RedirectQuery {
            redirect_url: Some("https://evil.example".to_owned()),
        }))
        .await;

        let document = parse_html_document(response).await;
        let hidden = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .count();
        assert_eq!(hidden, 0);
    }
}
