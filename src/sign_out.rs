//! Sign-out route handler that ends the session and clears the session cookie.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    auth::{AuthState, get_session_secret, invalidate_session_cookie},
    endpoints,
};

/// End the session, invalidate the session cookie and redirect the client to
/// the sign-in page.
///
/// The cookie is cleared even if the identity service could not end the
/// session.
pub async fn get_sign_out(State(state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    if let Ok(session_secret) = get_session_secret(&jar) {
        if let Err(error) = state.identity.destroy_session(&session_secret).await {
            tracing::error!("could not end session while signing out: {error}");
        }
    }

    let jar = invalidate_session_cookie(jar);

    (jar, Redirect::to(endpoints::SIGN_IN_VIEW)).into_response()
}
