//! The page that starts the aggregator's link widget, and the endpoints the
//! widget's script calls to create a link token and to link the chosen bank.

use std::sync::Arc;

use axum::{
    Extension, Form, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};

use crate::{
    Aggregator, AppState, BankLinker, Error, Identity, RecordStore,
    alert::Alert,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, CARD_STYLE, HeadElement, PAGE_CONTAINER_STYLE, base,
        loading_spinner,
    },
    navigation::NavBar,
};

/// The script that provides the aggregator's link widget.
const LINK_WIDGET_SCRIPT: &str = "https://cdn.plaid.com/link/v2/stable/link-initialize.js";

fn link_button() -> Markup {
    html! {
        button
            type="button"
            id="link-button"
            class=(BUTTON_PRIMARY_STYLE)
            data-link-token-url=(endpoints::LINK_TOKEN_API)
            data-bank-accounts-url=(endpoints::BANK_ACCOUNTS_API)
            hx-target-error="#alert-container"
        {
            span class="inline htmx-indicator" id="indicator"
            {
                (loading_spinner())
            }
            "Connect bank"
        }
    }
}

/// Display the page that lets the user connect a bank.
pub async fn get_link_bank_page(Extension(identity): Extension<Identity>) -> Response {
    let nav_bar = NavBar::new(endpoints::LINK_BANK_VIEW, &identity.name).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class={ (CARD_STYLE) " max-w-md space-y-4" }
            {
                h1 class="text-2xl font-bold" { "Connect a bank" }

                p class="text-gray-500 dark:text-gray-400"
                {
                    "Link your bank account securely to see your balances and \
                    transactions and to send money to other users."
                }

                (link_button())
            }
        }
    };

    let head_elements = [
        HeadElement::ScriptLink(LINK_WIDGET_SCRIPT.to_owned()),
        HeadElement::ScriptLink(format!("{}/app.js", endpoints::STATIC)),
    ];

    base("Connect Bank", &head_elements, &content).into_response()
}

/// The state needed to create link tokens.
#[derive(Clone)]
pub struct LinkTokenState {
    pub aggregator: Arc<dyn Aggregator>,
}

impl FromRef<AppState> for LinkTokenState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            aggregator: state.aggregator.clone(),
        }
    }
}

/// The JSON body returned by [post_link_token].
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LinkTokenResponse {
    /// The short-lived token that starts the link widget.
    pub link_token: String,
}

/// Create a link token that starts the aggregator's link widget for the
/// signed-in user.
pub async fn post_link_token(
    State(state): State<LinkTokenState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match state.aggregator.create_link_token(&identity).await {
        Ok(link_token) => Json(LinkTokenResponse { link_token }).into_response(),
        Err(error) => {
            tracing::error!(
                "could not create link token for user {}: {error}",
                identity.id
            );
            error.into_alert_response()
        }
    }
}

/// The state needed to link a bank account.
#[derive(Clone)]
pub struct LinkBankState {
    pub linker: BankLinker,
    pub record_store: Arc<dyn RecordStore>,
}

impl FromRef<AppState> for LinkBankState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            linker: BankLinker::from_ref(state),
            record_store: state.record_store.clone(),
        }
    }
}

/// The form the link widget's script submits once the user has chosen an
/// account.
#[derive(Debug, Deserialize)]
pub struct PublicTokenForm {
    /// The short-lived token issued by the link widget.
    pub public_token: String,
}

/// Link the bank account behind the public token and redirect the client to
/// the dashboard.
///
/// An alert explaining the problem is returned if linking fails.
pub async fn post_bank_account(
    State(state): State<LinkBankState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<PublicTokenForm>,
) -> Response {
    let user = match state.record_store.get_user_record(&identity.id).await {
        Ok(user) => user,
        Err(Error::NotFound) => {
            tracing::error!("no user record for signed-in user {}", identity.id);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Could not link bank account".to_owned(),
                    details: "Your profile is incomplete. Sign up again with the same email \
                        and password to finish it."
                        .to_owned(),
                },
            )
                .into_response();
        }
        Err(error) => return error.into_alert_response(),
    };

    match state
        .linker
        .link_bank_account(&form.public_token, &user)
        .await
    {
        Ok(_) => (HxRedirect(endpoints::ROOT.to_owned()), StatusCode::OK).into_response(),
        Err(error) => error.into_alert_response(),
    }
}

#[cfg(test)]
mod link_bank_page_tests {
    use axum::{Extension, http::StatusCode};
    use scraper::Selector;

    use crate::{
        Identity, UserId, endpoints,
        link_bank::{LINK_WIDGET_SCRIPT, get_link_bank_page},
        test_utils::{assert_valid_html, parse_html_document},
    };

    #[tokio::test]
    async fn page_loads_widget_script_and_connect_button() {
        let identity = Identity {
            id: UserId::new("U1"),
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
        };

        let response = get_link_bank_page(Extension(identity)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let scripts: Vec<&str> = html
            .select(&Selector::parse("script[src]").unwrap())
            .filter_map(|script| script.value().attr("src"))
            .collect();
        assert!(scripts.contains(&LINK_WIDGET_SCRIPT));
        assert!(scripts.contains(&"/static/app.js"));
        let button = html
            .select(&Selector::parse("#link-button").unwrap())
            .next()
            .expect("No connect button");
        assert_eq!(
            button.value().attr("data-link-token-url"),
            Some(endpoints::LINK_TOKEN_API)
        );
        assert_eq!(
            button.value().attr("data-bank-accounts-url"),
            Some(endpoints::BANK_ACCOUNTS_API)
        );
    }
}

#[cfg(test)]
mod link_endpoint_tests {
    use axum::{
        Extension, Form,
        extract::{FromRef, State},
        http::StatusCode,
        response::Response,
    };

    use crate::{
        Identity, RecordStore, User, UserId, endpoints,
        link_bank::{
            LinkBankState, LinkTokenResponse, LinkTokenState, PublicTokenForm,
            post_bank_account, post_link_token,
        },
        test_utils::{
            FakeAggregator, FakePaymentRail, TestApp, account_metadata, assert_hx_redirect,
            parse_html_fragment, select_text,
        },
    };

    fn identity() -> Identity {
        Identity {
            id: UserId::new("U1"),
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
        }
    }

    async fn create_user(app: &TestApp) {
        app.record_store
            .create_user_record(User {
                user_id: UserId::new("U1"),
                email: "jane@example.com".to_owned(),
                first_name: "Jane".to_owned(),
                last_name: "Doe".to_owned(),
                customer_id: "c-1".to_owned(),
                customer_url: "https://rail/customers/c-1".to_owned(),
            })
            .await
            .unwrap();
    }

    fn test_app() -> TestApp {
        let aggregator = FakeAggregator::default()
            .with_link("pt-1", "at-1", "it-1")
            .with_account("at-1", account_metadata("acc-1", 100.0));

        TestApp::new(aggregator, FakePaymentRail::default())
    }

    async fn link(app: &TestApp, public_token: &str) -> Response {
        post_bank_account(
            State(LinkBankState::from_ref(&app.state)),
            Extension(identity()),
            Form(PublicTokenForm {
                public_token: public_token.to_owned(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn link_token_is_returned_as_json() {
        let app = test_app();

        let response = post_link_token(
            State(LinkTokenState::from_ref(&app.state)),
            Extension(identity()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: LinkTokenResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            LinkTokenResponse {
                link_token: "link-token-U1".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn linking_saves_bank_and_redirects_to_dashboard() {
        let app = test_app();
        create_user(&app).await;

        let response = link(&app, "pt-1").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_hx_redirect(&response, endpoints::ROOT);
        let banks = app
            .record_store
            .list_bank_account_records(&UserId::new("U1"))
            .await
            .unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].access_token, "at-1");
    }

    #[tokio::test]
    async fn rejected_public_token_shows_alert() {
        let app = test_app();
        create_user(&app).await;

        let response = link(&app, "pt-unknown").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let html = parse_html_fragment(response).await;
        assert!(select_text(&html, "[role=alert]").contains("Something went wrong"));
        assert!(
            app.record_store
                .list_bank_account_records(&UserId::new("U1"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn missing_user_record_shows_alert() {
        let app = test_app();

        let response = link(&app, "pt-1").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = parse_html_fragment(response).await;
        assert!(select_text(&html, "[role=alert]").contains("Sign up again"));
        assert!(app.payment_rail.funding_sources_created().is_empty());
    }
}
