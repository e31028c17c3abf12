//! Session cookies and the middleware that guards the pages of signed-in users.

mod middleware;
mod redirect;
mod session;

pub use middleware::{AuthState, auth_guard, auth_guard_hx};
pub(crate) use redirect::{build_sign_in_redirect_url, normalize_redirect_url};
pub(crate) use session::{get_session_secret, invalidate_session_cookie, set_session_cookie};

#[cfg(test)]
pub(crate) use session::COOKIE_SESSION;
