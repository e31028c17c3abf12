//! The page for sending money to another user and the endpoint its form posts to.

use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Aggregator, AppState, FundsTransfer, Identity, RecordStore, TransferRequest,
    alert::Alert,
    bank_account::{BankSummary, summarize_bank_accounts},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, base, format_currency, loading_spinner,
    },
    navigation::NavBar,
};

/// The state needed for the transfer page.
#[derive(Clone)]
pub struct TransferPageState {
    pub record_store: Arc<dyn RecordStore>,
    pub aggregator: Arc<dyn Aggregator>,
}

impl FromRef<AppState> for TransferPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            record_store: state.record_store.clone(),
            aggregator: state.aggregator.clone(),
        }
    }
}

fn transfer_form(summaries: &[BankSummary]) -> Markup {
    html! {
        form
            hx-post=(endpoints::TRANSFERS_API)
            hx-swap="none"
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="find button"
            class="w-full space-y-4 md:space-y-6"
        {
            div
            {
                label for="source_bank_id" class=(FORM_LABEL_STYLE) { "Select source bank" }

                select
                    id="source_bank_id"
                    name="source_bank_id"
                    required
                    class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for summary in summaries {
                        option value=(summary.record.id.as_str())
                        {
                            (summary.account.name) " (" (format_currency(summary.account.current_balance)) ")"
                        }
                    }
                }
            }

            div
            {
                label for="receiver_shareable_id" class=(FORM_LABEL_STYLE)
                {
                    "Receiver's shareable ID"
                }

                input
                    id="receiver_shareable_id"
                    name="receiver_shareable_id"
                    type="text"
                    placeholder="Paste the ID the receiver shared with you"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

                input
                    id="amount"
                    name="amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    placeholder="0.00"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Transfer funds"
            }
        }
    }
}

/// Display the form for sending money from one of the user's banks.
pub async fn get_transfer_page(
    State(state): State<TransferPageState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let summaries = match summarize_bank_accounts(
        &identity.id,
        state.record_store.as_ref(),
        state.aggregator.as_ref(),
    )
    .await
    {
        Ok(summaries) => summaries,
        Err(error) => return error.into_response(),
    };

    let nav_bar = NavBar::new(endpoints::PAYMENT_TRANSFER_VIEW, &identity.name).into_html();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            header class="w-full mb-6"
            {
                h1 class="text-2xl font-bold" { "Payment Transfer" }
                p class="text-gray-500 dark:text-gray-400"
                {
                    "Please provide any specific details or notes related to the payment transfer."
                }
            }

            @if summaries.is_empty() {
                p
                {
                    "You need a linked bank to send money. "
                    a href=(endpoints::LINK_BANK_VIEW) class=(LINK_STYLE) { "Connect a bank" }
                }
            } @else {
                (transfer_form(&summaries))
            }
        }
    };

    base("Payment Transfer", &[], &content).into_response()
}

/// Send money as described by the submitted transfer form.
///
/// Responds with a success alert, or an error alert explaining why the
/// transfer was not made.
pub async fn post_transfer(
    State(transfers): State<FundsTransfer>,
    Extension(identity): Extension<Identity>,
    Form(request): Form<TransferRequest>,
) -> Response {
    match transfers.transfer_funds(&identity.id, &request).await {
        Ok(_) => (
            StatusCode::OK,
            Alert::Success {
                message: "Transfer sent".to_owned(),
                details: format!(
                    "{} is on its way to the receiver.",
                    format_currency(request.amount)
                ),
            },
        )
            .into_response(),
        Err(error) => {
            tracing::warn!("transfer by user {} failed: {error}", identity.id);
            error.into_alert_response()
        }
    }
}


#[cfg(test)]
mod post_transfer_tests {
    use axum::{
        Extension, Form,
        extract::{FromRef, State},
        http::StatusCode,
        response::Response,
    };

    use crate::{
        BankAccount, FundsTransfer, Identity, NewBankAccount, RecordStore, TransferRequest,
        UserId,
        test_utils::{TestApp, parse_html_fragment, select_text},
        transfer_page::post_transfer,
    };

    fn identity() -> Identity {
        Identity {
            id: UserId::new("U1"),
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
        }
    }

    async fn create_bank(app: &TestApp, user_id: &str, account_id: &str) -> BankAccount {
        app.record_store
            .create_bank_account_record(NewBankAccount {
                user_id: UserId::new(user_id),
                bank_id: format!("it-{account_id}"),
                account_id: account_id.to_owned(),
                access_token: format!("at-{account_id}"),
                funding_source_url: format!("https://rail/fs/{account_id}"),
                shareable_id: app.state.shareable_ids.encrypt(account_id),
            })
            .await
            .unwrap()
    }

    async fn send(app: &TestApp, request: TransferRequest) -> Response {
        post_transfer(
            State(FundsTransfer::from_ref(&app.state)),
            Extension(identity()),
            Form(request),
        )
        .await
    }

    #[tokio::test]
    async fn successful_transfer_shows_success_alert() {
        let app = TestApp::default();
        let sender = create_bank(&app, "U1", "acc-1").await;
        let receiver = create_bank(&app, "U2", "acc-2").await;

        let response = send(
            &app,
            TransferRequest {
                source_bank_id: sender.id,
                receiver_shareable_id: receiver.shareable_id,
                amount: 25.0,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        let alert = select_text(&html, "[role=alert]");
        assert!(alert.contains("Transfer sent"));
        assert!(alert.contains("$25.00"));
        assert_eq!(
            app.payment_rail.transfers_created(),
            vec![(
                "https://rail/fs/acc-1".to_owned(),
                "https://rail/fs/acc-2".to_owned(),
                25.0
            )]
        );
    }

    #[tokio::test]
    async fn non_positive_amount_shows_error_alert() {
        let app = TestApp::default();
        let sender = create_bank(&app, "U1", "acc-1").await;
        let receiver = create_bank(&app, "U2", "acc-2").await;

        let response = send(
            &app,
            TransferRequest {
                source_bank_id: sender.id,
                receiver_shareable_id: receiver.shareable_id,
                amount: -1.0,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        assert!(select_text(&html, "[role=alert]").contains("at least $0.01"));
        assert!(app.payment_rail.transfers_created().is_empty());
    }

    #[tokio::test]
    async fn tampered_shareable_id_shows_error_alert() {
        let app = TestApp::default();
        let sender = create_bank(&app, "U1", "acc-1").await;
        let receiver = create_bank(&app, "U2", "acc-2").await;

        let response = send(
            &app,
            TransferRequest {
                source_bank_id: sender.id,
                receiver_shareable_id: format!("{}x", receiver.shareable_id),
                amount: 10.0,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        assert!(select_text(&html, "[role=alert]").contains("Invalid shareable ID"));
    }

    #[tokio::test]
    async fn another_users_bank_is_not_found() {
        let app = TestApp::default();
        let other = create_bank(&app, "U2", "acc-2").await;
        let receiver = create_bank(&app, "U3", "acc-3").await;

        let response = send(
            &app,
            TransferRequest {
                source_bank_id: other.id,
                receiver_shareable_id: receiver.shareable_id,
                amount: 10.0,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(app.payment_rail.transfers_created().is_empty());
    }
}
