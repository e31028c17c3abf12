//! The sign-up page and the handler that creates a new user.
//!
//! Signing up touches three services in order: the identity service creates
//! the login, the payment rail registers the user as a customer, and the
//! record store keeps the user's profile. The user is then signed in.

use std::sync::Arc;

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    AppState, CustomerProfile, Error, IdentityGateway, NewUser, PaymentRail, RecordStore,
    Service, User, UserId, auth::set_session_cookie, customer_id_from_url, endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, auth_layout, base, loading_spinner, password_input, text_input,
    },
    password::ValidatedPassword,
};

/// The data entered by the user in the sign-up form.
#[derive(Clone, Default, Deserialize)]
pub struct SignUpData {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// The date of birth as `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// The last four digits of the user's social security number.
    pub ssn: String,
    pub email: String,
    pub password: String,
}

#[derive(Default)]
struct SignUpErrors<'a> {
    password: Option<&'a str>,
    form: Option<&'a str>,
}

fn sign_up_form(data: &SignUpData, errors: SignUpErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::SIGN_UP_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            div class="grid grid-cols-2 gap-4"
            {
                (text_input("first_name", "First Name", "text", "Jane", &data.first_name))
                (text_input("last_name", "Last Name", "text", "Doe", &data.last_name))
            }

            (text_input("address1", "Address", "text", "Enter your specific address", &data.address1))
            (text_input("city", "City", "text", "Enter your city", &data.city))

            div class="grid grid-cols-2 gap-4"
            {
                (text_input("state", "State", "text", "Example: NY", &data.state))
                (text_input("postal_code", "Postal Code", "text", "Example: 11101", &data.postal_code))
            }

            div class="grid grid-cols-2 gap-4"
            {
                (text_input("date_of_birth", "Date of Birth", "date", "YYYY-MM-DD", &data.date_of_birth))
                (text_input("ssn", "SSN", "text", "Example: 1234", ""))
            }

            (text_input("email", "Email", "email", "name@example.com", &data.email))

            (password_input("", 8, errors.password))

            @if let Some(message) = errors.form {
                p class="text-red-500 text-base" { (message) }
            }

            button
                type="submit" id="submit-button" tabindex="0"
                class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Sign up"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400" {
                "Already have an account? "
                a
                    href=(endpoints::SIGN_IN_VIEW) tabindex="0"
                    class="font-semibold leading-6 text-blue-600 hover:text-blue-500 dark:text-blue-500 dark:hover:text-blue-400"
                {
                  "Sign in"
                }
            }
        }
    }
}

/// Display the sign-up page.
pub async fn get_sign_up_page() -> Response {
    let form = sign_up_form(&SignUpData::default(), SignUpErrors::default());
    let content = auth_layout("Sign up", "Please enter your details.", &form);

    base("Sign Up", &[], &content).into_response()
}

/// The state needed to sign up a new user.
#[derive(Clone)]
pub struct SignUpState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    pub identity: Arc<dyn IdentityGateway>,
    pub payment_rail: Arc<dyn PaymentRail>,
    pub record_store: Arc<dyn RecordStore>,
}

impl FromRef<AppState> for SignUpState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            identity: state.identity.clone(),
            payment_rail: state.payment_rail.clone(),
            record_store: state.record_store.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SignUpState> for Key {
    fn from_ref(state: &SignUpState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create the login for `data` and return its user ID.
///
/// An existing login for the email is reused when `password` opens a session
/// for it and it has no user record yet.
async fn create_login(
    state: &SignUpState,
    data: &SignUpData,
    password: &ValidatedPassword,
) -> Result<UserId, Error> {
    let full_name = format!("{} {}", data.first_name, data.last_name);
    let message = match state
        .identity
        .create_account(&data.email, password.as_str(), &full_name)
        .await
    {
        Ok(identity) => return Ok(identity.id),
        Err(Error::InvalidInput(message)) => message,
        Err(error) => return Err(error),
    };

    let Ok(session) = state
        .identity
        .create_session(&data.email, password.as_str())
        .await
    else {
        return Err(Error::InvalidInput(message));
    };

    let user_record = state.record_store.get_user_record(&session.user_id).await;

    if let Err(error) = state.identity.destroy_session(&session.secret).await {
        tracing::error!(
            "could not end session {} for user {}: {error}",
            session.id,
            session.user_id
        );
    }

    match user_record {
        Err(Error::NotFound) => {
            tracing::info!(
                "finishing sign-up for user {} that has no user record",
                session.user_id
            );
            Ok(session.user_id)
        }
        Ok(_) => Err(Error::InvalidInput(message)),
        Err(error) => Err(error),
    }
}

/// Create the login, the payment-rail customer and the user record for `data`.
async fn create_user(
    state: &SignUpState,
    data: &SignUpData,
    password: &ValidatedPassword,
) -> Result<User, Error> {
    let user_id = create_login(state, data, password).await?;

    let customer_url = state
        .payment_rail
        .create_customer(&CustomerProfile {
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            email: data.email.clone(),
            address1: data.address1.clone(),
            city: data.city.clone(),
            state: data.state.clone(),
            postal_code: data.postal_code.clone(),
            date_of_birth: data.date_of_birth.clone(),
            ssn: data.ssn.clone(),
        })
        .await
        .inspect_err(|error| {
            tracing::error!("could not create customer for user {user_id}: {error}")
        })?
        .ok_or_else(|| {
            tracing::error!("payment rail did not return a customer for user {user_id}");
            Error::MissingResourceLocation(Service::PaymentRail)
        })?;

    state
        .record_store
        .create_user_record(NewUser {
            user_id,
            email: data.email.clone(),
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            customer_id: customer_id_from_url(&customer_url).to_owned(),
            customer_url,
        })
        .await
}

/// Handler for sign-up requests via the POST method.
///
/// On success the new user is signed in and redirected to the dashboard.
/// Otherwise the form is returned with an error message explaining the problem.
pub async fn post_sign_up(
    State(state): State<SignUpState>,
    jar: PrivateCookieJar,
    Form(data): Form<SignUpData>,
) -> Response {
    let password = match ValidatedPassword::new(
        &data.password,
        &[&data.email, &data.first_name, &data.last_name],
    ) {
        Ok(password) => password,
        Err(Error::TooWeak(feedback)) => {
            return sign_up_form(
                &data,
                SignUpErrors {
                    password: Some(&format!("Password is too weak. {feedback}")),
                    form: None,
                },
            )
            .into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while validating password: {error}");
            return sign_up_form(
                &data,
                SignUpErrors {
                    form: Some("An internal error occurred. Please try again later."),
                    ..Default::default()
                },
            )
            .into_response();
        }
    };

    let user = match create_user(&state, &data, &password).await {
        Ok(user) => user,
        Err(Error::InvalidInput(message)) => {
            return sign_up_form(
                &data,
                SignUpErrors {
                    form: Some(&message),
                    ..Default::default()
                },
            )
            .into_response();
        }
        Err(error) => {
            tracing::error!("could not sign up {}: {error}", data.email);
            return sign_up_form(
                &data,
                SignUpErrors {
                    form: Some("We could not create your account. Please try again later."),
                    ..Default::default()
                },
            )
            .into_response();
        }
    };

    tracing::info!("signed up user {}", user.user_id);

    let session = match state
        .identity
        .create_session(&data.email, password.as_str())
        .await
    {
        Ok(session) => session,
        Err(error) => {
            tracing::error!("could not start session for new user {}: {error}", user.user_id);
            return (HxRedirect(endpoints::SIGN_IN_VIEW.to_owned()), StatusCode::OK)
                .into_response();
        }
    };

    (
        StatusCode::OK,
        HxRedirect(endpoints::ROOT.to_owned()),
        set_session_cookie(jar, &session),
    )
        .into_response()
}


#[cfg(test)]
mod post_sign_up_tests {
    use axum::{
        Form,
        extract::{FromRef, State},
        http::StatusCode,
        response::Response,
    };
    use axum_extra::extract::PrivateCookieJar;

    use crate::{
        IdentityGateway, RecordStore, User, UserId,
        auth::COOKIE_SESSION,
        endpoints,
        sign_up::{SignUpData, SignUpState, post_sign_up},
        test_utils::{
            FakePaymentRail, TestApp, assert_form_error_message, assert_hx_redirect,
            must_get_form, parse_html_fragment,
        },
    };

    fn sign_up_data(password: &str) -> SignUpData {
        SignUpData {
            first_name: "Jane".to_owned(),
            last_name: "Doe".to_owned(),
            address1: "1 Main St".to_owned(),
            city: "New York".to_owned(),
            state: "NY".to_owned(),
            postal_code: "11101".to_owned(),
            date_of_birth: "1990-01-31".to_owned(),
            ssn: "1234".to_owned(),
            email: "jane@example.com".to_owned(),
            password: password.to_owned(),
        }
    }

    const STRONG_PASSWORD: &str = "x7Kq!pL9#vRm2@wZ";

    async fn sign_up(app: &TestApp, data: SignUpData) -> Response {
        let state = SignUpState::from_ref(&app.state);
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_sign_up(State(state), jar, Form(data)).await
    }

    #[tokio::test]
    async fn sign_up_creates_identity_customer_record_and_session() {
        let app = TestApp::default();

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_hx_redirect(&response, endpoints::ROOT);
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .expect("No session cookie set")
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with(&format!("{COOKIE_SESSION}=")));

        let customers = app.payment_rail.customers_created();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].ssn, "1234");
        assert_eq!(customers[0].date_of_birth, "1990-01-31");

        let user = app
            .record_store
            .get_user_record(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(
            user,
            User {
                user_id: UserId::new("user-1"),
                email: "jane@example.com".to_owned(),
                first_name: "Jane".to_owned(),
                last_name: "Doe".to_owned(),
                customer_id: "c-1".to_owned(),
                customer_url: "https://rail/customers/c-1".to_owned(),
            }
        );
        assert_eq!(app.identity.active_sessions(), 1);
    }

    #[tokio::test]
    async fn weak_password_is_rejected_before_anything_is_created() {
        let app = TestApp::default();

        let response = sign_up(&app, sign_up_data("password")).await;

        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        let error = html
            .select(&scraper::Selector::parse("p.text-red-500").unwrap())
            .next()
            .expect("No error message")
            .text()
            .collect::<String>();
        assert!(error.starts_with("Password is too weak."), "got {error}");
        assert!(form.value().attr("hx-post").is_some());
        assert!(app.payment_rail.customers_created().is_empty());
        assert_eq!(app.identity.active_sessions(), 0);
    }

    #[tokio::test]
    async fn duplicate_email_shows_error() {
        let app = TestApp::default();
        app.identity
            .create_account("jane@example.com", "something else", "Jane Doe")
            .await
            .unwrap();

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "An account with this email address already exists.");
        assert!(app.payment_rail.customers_created().is_empty());
    }

    #[tokio::test]
    async fn missing_customer_location_creates_no_user_record() {
        let app = TestApp::new(
            Default::default(),
            FakePaymentRail::default().without_customer_location(),
        );

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        assert!(response.headers().get("hx-redirect").is_none());
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(
            &form,
            "We could not create your account. Please try again later.",
        );
        assert!(
            app.record_store
                .get_user_record(&UserId::new("user-1"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn retry_finishes_sign_up_for_login_without_user_record() {
        let app = TestApp::new(
            Default::default(),
            FakePaymentRail::default().without_customer_location(),
        );
        sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;
        app.payment_rail.restore_customer_location();

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_hx_redirect(&response, endpoints::ROOT);
        let user = app
            .record_store
            .get_user_record(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(user.customer_url, "https://rail/customers/c-2");
        assert_eq!(app.identity.active_sessions(), 1);
    }

    #[tokio::test]
    async fn repeated_sign_up_of_complete_account_shows_error() {
        let app = TestApp::default();
        sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        assert!(response.headers().get("hx-redirect").is_none());
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "An account with this email address already exists.");
        assert_eq!(app.payment_rail.customers_created().len(), 1);
        assert_eq!(app.identity.active_sessions(), 1);
    }

    #[tokio::test]
    async fn failed_session_redirects_to_sign_in() {
        let app = TestApp::default();
        app.identity.rejecting_sessions();

        let response = sign_up(&app, sign_up_data(STRONG_PASSWORD)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_hx_redirect(&response, endpoints::SIGN_IN_VIEW);
        assert!(response.headers().get("set-cookie").is_none());
        assert!(
            app.record_store
                .get_user_record(&UserId::new("user-1"))
                .await
                .is_ok()
        );
    }
}
