//! Displays a card for each of the user's linked banks.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Aggregator, AppState, Identity, RecordStore,
    bank_account::{BankSummary, summarize_bank_accounts},
    endpoints,
    html::{CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, format_currency},
    navigation::NavBar,
};

/// The state needed for the my banks page.
#[derive(Clone)]
pub struct MyBanksState {
    pub record_store: Arc<dyn RecordStore>,
    pub aggregator: Arc<dyn Aggregator>,
}

impl FromRef<AppState> for MyBanksState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            record_store: state.record_store.clone(),
            aggregator: state.aggregator.clone(),
        }
    }
}

fn bank_card(summary: &BankSummary) -> Markup {
    let history_url = format!(
        "{}?id={}",
        endpoints::TRANSACTION_HISTORY_VIEW,
        summary.record.id
    );

    html! {
        article class={ (CARD_STYLE) " flex flex-col gap-4" } data-bank-id=(summary.record.id.as_str())
        {
            div class="flex justify-between items-start"
            {
                div
                {
                    h2 class="text-lg font-semibold" { (summary.account.name) }

                    @if let Some(official_name) = &summary.account.official_name {
                        p class="text-sm text-gray-500 dark:text-gray-400" { (official_name) }
                    }
                }

                @if let Some(mask) = &summary.account.mask {
                    span class="text-sm tracking-widest" { "●●●● " (mask) }
                }
            }

            dl class="grid grid-cols-2 gap-2 text-sm"
            {
                dt class="text-gray-500 dark:text-gray-400" { "Current balance" }
                dd class="text-right font-semibold current-balance"
                {
                    (format_currency(summary.account.current_balance))
                }

                dt class="text-gray-500 dark:text-gray-400" { "Available balance" }
                dd class="text-right available-balance"
                {
                    @match summary.account.available_balance {
                        Some(balance) => { (format_currency(balance)) }
                        None => { "Unavailable" }
                    }
                }
            }

            div class="space-y-1"
            {
                p class="text-xs text-gray-500 dark:text-gray-400"
                {
                    "Share this ID with people who want to send you money."
                }

                div class="flex items-center gap-2"
                {
                    code
                        class="shareable-id flex-1 truncate px-2 py-1 text-xs rounded bg-gray-100 dark:bg-gray-700"
                    {
                        (summary.record.shareable_id)
                    }

                    button
                        type="button"
                        class="text-xs font-semibold text-blue-600 hover:text-blue-500"
                        data-copy=(summary.record.shareable_id)
                        onclick="navigator.clipboard.writeText(this.dataset.copy)"
                    {
                        "Copy"
                    }
                }
            }

            a href=(history_url) class=(LINK_STYLE) { "View transactions" }
        }
    }
}

/// Display the user's linked banks.
pub async fn get_my_banks_page(
    State(state): State<MyBanksState>,
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

    let nav_bar = NavBar::new(endpoints::MY_BANKS_VIEW, &identity.name).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl space-y-6"
            {
                header
                {
                    h1 class="text-2xl font-bold" { "My Bank Accounts" }
                    p class="text-gray-500 dark:text-gray-400"
                    {
                        "Effortlessly manage your banking activities."
                    }
                }

                @if summaries.is_empty() {
                    div class=(CARD_STYLE)
                    {
                        p
                        {
                            "You have not linked any banks yet. "
                            a href=(endpoints::LINK_BANK_VIEW) class=(LINK_STYLE) { "Connect a bank" }
                        }
                    }
                } @else {
                    div class="grid grid-cols-1 md:grid-cols-2 gap-4"
                    {
                        @for summary in &summaries {
                            (bank_card(summary))
                        }
                    }
                }
            }
        }
    };

    base("My Banks", &[], &content).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension,
        extract::{FromRef, State},
        http::StatusCode,
        response::Response,
    };
    use scraper::Selector;

    use crate::{
        BankAccount, Identity, NewBankAccount, RecordStore, UserId,
        endpoints,
        my_banks::{MyBanksState, get_my_banks_page},
        test_utils::{
            FakeAggregator, FakePaymentRail, TestApp, account_metadata, assert_valid_html,
            parse_html_document, select_text,
        },
    };

    fn identity() -> Identity {
        Identity {
            id: UserId::new("U1"),
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
        }
    }

    async fn link(
        app: &TestApp,
        user_id: &str,
        access_token: &str,
        account_id: &str,
    ) -> BankAccount {
        app.record_store
            .create_bank_account_record(NewBankAccount {
                user_id: UserId::new(user_id),
                bank_id: format!("it-{account_id}"),
                account_id: account_id.to_owned(),
                access_token: access_token.to_owned(),
                funding_source_url: format!("https://rail/fs/{account_id}"),
                shareable_id: app.state.shareable_ids.encrypt(account_id),
            })
            .await
            .unwrap()
    }

    async fn get_page(app: &TestApp) -> Response {
        let state = MyBanksState::from_ref(&app.state);

        get_my_banks_page(State(state), Extension(identity())).await
    }

    #[tokio::test]
    async fn shows_a_card_for_each_of_the_users_banks() {
        let aggregator = FakeAggregator::default()
            .with_account("at-1", account_metadata("acc-1", 100.0))
            .with_account("at-2", account_metadata("acc-2", 42.5))
            .with_account("at-3", account_metadata("acc-3", 1.0));
        let app = TestApp::new(aggregator, FakePaymentRail::default());
        let first = link(&app, "U1", "at-1", "acc-1").await;
        link(&app, "U1", "at-2", "acc-2").await;
        link(&app, "U2", "at-3", "acc-3").await;

        let response = get_page(&app).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let cards = html.select(&Selector::parse("article").unwrap()).count();
        assert_eq!(cards, 2);
        assert_eq!(select_text(&html, ".current-balance"), "$100.00 $42.50");
        assert!(select_text(&html, ".shareable-id").contains(&first.shareable_id));
        let history_link = format!(
            "a[href=\"{}?id={}\"]",
            endpoints::TRANSACTION_HISTORY_VIEW,
            first.id
        );
        assert_eq!(
            html.select(&Selector::parse(&history_link).unwrap()).count(),
            1
        );
    }

    #[tokio::test]
    async fn prompts_to_link_bank_when_user_has_none() {
        let app = TestApp::default();

        let response = get_page(&app).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert!(select_text(&html, "body").contains("You have not linked any banks yet."));
        assert_eq!(html.select(&Selector::parse("article").unwrap()).count(), 0);
    }
}
