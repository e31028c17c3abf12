//! The home page: a greeting, the total balance across the user's banks and
//! their most recent transactions.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Aggregator, AppState, Identity, RecordStore, Transaction,
    bank_account::{BankSummary, summarize_bank_accounts, total_current_balance},
    endpoints,
    html::{CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, format_currency},
    navigation::NavBar,
    transaction_history::transactions_table,
};

/// The number of transactions shown in the recent transactions table.
const RECENT_TRANSACTION_COUNT: usize = 10;

/// The state needed for the dashboard page.
#[derive(Clone)]
pub struct DashboardState {
    pub record_store: Arc<dyn RecordStore>,
    pub aggregator: Arc<dyn Aggregator>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            record_store: state.record_store.clone(),
            aggregator: state.aggregator.clone(),
        }
    }
}

fn total_balance_box(summaries: &[BankSummary]) -> Markup {
    html! {
        section class={ (CARD_STYLE) " flex flex-col sm:flex-row sm:items-center gap-6" }
        {
            div class="flex flex-wrap gap-2"
            {
                @for summary in summaries {
                    span
                        class="px-3 py-1 text-xs font-medium rounded-full bg-blue-50 text-blue-700
                        dark:bg-blue-900/30 dark:text-blue-200"
                    {
                        (summary.account.name)
                    }
                }
            }

            div class="space-y-1"
            {
                h2 class="text-lg font-semibold" id="total-banks"
                {
                    "Bank Accounts: " (summaries.len())
                }

                p class="text-sm text-gray-500 dark:text-gray-400" { "Total Current Balance" }

                p class="text-3xl font-bold" id="total-balance"
                {
                    (format_currency(total_current_balance(summaries)))
                }
            }
        }
    }
}

/// Merge the transactions of every linked bank and keep the newest `limit`.
///
/// Banks whose transactions cannot be fetched are logged and skipped.
async fn recent_transactions(
    summaries: &[BankSummary],
    aggregator: &dyn Aggregator,
    limit: usize,
) -> Vec<Transaction> {
    let mut transactions = Vec::new();

    for summary in summaries {
        match aggregator.get_transactions(&summary.record.access_token).await {
            Ok(bank_transactions) => transactions.extend(
                bank_transactions
                    .into_iter()
                    .filter(|transaction| transaction.account_id == summary.record.account_id),
            ),
            Err(error) => tracing::error!(
                "could not fetch transactions for bank account {}: {error}",
                summary.record.id
            ),
        }
    }

    transactions.sort_by(|a, b| b.date.cmp(&a.date));
    transactions.truncate(limit);
    transactions
}

/// Display the dashboard for the signed-in user.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
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

    let transactions = recent_transactions(
        &summaries,
        state.aggregator.as_ref(),
        RECENT_TRANSACTION_COUNT,
    )
    .await;

    let display_name = if identity.name.is_empty() {
        "Guest"
    } else {
        identity.name.as_str()
    };

    let nav_bar = NavBar::new(endpoints::ROOT, &identity.name).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl space-y-6"
            {
                header
                {
                    h1 class="text-2xl font-bold"
                    {
                        "Welcome, "
                        span class="text-blue-600 dark:text-blue-400" { (display_name) }
                    }
                    p class="text-gray-500 dark:text-gray-400"
                    {
                        "Access and manage your account and transactions efficiently."
                    }
                }

                (total_balance_box(&summaries))

                section class="space-y-4"
                {
                    div class="flex justify-between items-baseline"
                    {
                        h2 class="text-xl font-semibold" { "Recent transactions" }
                        a href=(endpoints::TRANSACTION_HISTORY_VIEW) class=(LINK_STYLE) { "View all" }
                    }

                    @if summaries.is_empty() {
                        p
                        {
                            "Connect a bank to see your balances and transactions. "
                            a href=(endpoints::LINK_BANK_VIEW) class=(LINK_STYLE) { "Connect a bank" }
                        }
                    } @else {
                        (transactions_table(&transactions))
                    }
                }
            }
        }
    };

    base("Home", &[], &content).into_response()
}
