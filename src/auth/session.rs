//! Stores the identity service's session secret in a private cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, Session};

pub(crate) const COOKIE_SESSION: &str = "banking-core-session";

/// Add the secret of `session` to the cookie jar.
///
/// The cookie expires when the session does.
pub(crate) fn set_session_cookie(jar: PrivateCookieJar, session: &Session) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, session.secret.clone()))
            .path("/")
            .expires(session.expires)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Get the session secret from the cookie jar.
///
/// # Errors
///
/// Returns [Error::SessionMissing] if there is no session cookie.
pub(crate) fn get_session_secret(jar: &PrivateCookieJar) -> Result<String, Error> {
    jar.get(COOKIE_SESSION)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .ok_or(Error::SessionMissing)
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

#[cfg(test)]
mod session_cookie_tests {
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Key, SameSite},
    };
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        Error, Session, UserId,
        auth::session::{
            COOKIE_SESSION, get_session_secret, invalidate_session_cookie, set_session_cookie,
        },
    };

    fn get_jar() -> PrivateCookieJar {
        let hash = Sha512::digest(b"foobar");
        let key = Key::from(&hash);

        PrivateCookieJar::new(key)
    }

    fn session(expires: OffsetDateTime) -> Session {
        Session {
            id: "session-1".to_owned(),
            user_id: UserId::new("U1"),
            secret: "s3cr3t".to_owned(),
            expires,
        }
    }

    #[test]
    fn set_session_cookie_stores_secret_until_session_expires() {
        let expires = datetime!(2030-01-01 12:00:00 UTC);

        let jar = set_session_cookie(get_jar(), &session(expires));

        let cookie = jar.get(COOKIE_SESSION).unwrap();
        assert_eq!(cookie.value(), "s3cr3t");
        assert_eq!(cookie.expires_datetime(), Some(expires));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn get_session_secret_reads_cookie() {
        let jar = set_session_cookie(
            get_jar(),
            &session(OffsetDateTime::now_utc() + Duration::days(1)),
        );

        assert_eq!(get_session_secret(&jar), Ok("s3cr3t".to_owned()));
    }

    #[test]
    fn get_session_secret_fails_without_cookie() {
        assert_eq!(get_session_secret(&get_jar()), Err(Error::SessionMissing));
    }

    #[test]
    fn invalidate_session_cookie_expires_cookie() {
        let jar = set_session_cookie(
            get_jar(),
            &session(OffsetDateTime::now_utc() + Duration::days(1)),
        );

        let jar = invalidate_session_cookie(jar);

        let cookie = jar.get(COOKIE_SESSION).unwrap();
        assert_eq!(cookie.value(), "deleted");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
    }
}
