//! The page listing the transactions of one of the user's linked banks.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    Aggregator, AppState, BankAccountId, Error, Identity, RecordStore, Transaction,
    bank_account::{BankSummary, summarize_bank_accounts},
    endpoints,
    html::{
        CARD_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, format_currency, link,
    },
    navigation::NavBar,
};

/// The number of transactions shown on each page.
const PAGE_SIZE: usize = 10;

/// The state needed for the transaction history page.
#[derive(Clone)]
pub struct TransactionHistoryState {
    pub record_store: Arc<dyn RecordStore>,
    pub aggregator: Arc<dyn Aggregator>,
}

impl FromRef<AppState> for TransactionHistoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            record_store: state.record_store.clone(),
            aggregator: state.aggregator.clone(),
        }
    }
}

/// The query string of the transaction history page.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionHistoryQuery {
    /// The bank account record to show. Defaults to the user's first bank.
    pub id: Option<String>,
    /// The 1-based page of transactions.
    pub page: Option<usize>,
}

/// A table of transactions with the newest first.
pub(crate) fn transactions_table(transactions: &[Transaction]) -> Markup {
    html! {
        div class="relative overflow-x-auto shadow-md sm:rounded-lg w-full"
        {
            table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Transaction" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Status" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Channel" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                    }
                }

                tbody
                {
                    @for transaction in transactions {
                        // The aggregator reports money leaving the account as a positive amount.
                        @let amount_style = if transaction.amount > 0.0 {
                            "text-red-600"
                        } else {
                            "text-green-600"
                        };

                        tr class=(TABLE_ROW_STYLE)
                        {
                            th scope="row" class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                            {
                                (transaction.name)
                            }

                            td class={ (TABLE_CELL_STYLE) " " (amount_style) }
                            {
                                (format_currency(-transaction.amount))
                            }

                            td class=(TABLE_CELL_STYLE)
                            {
                                @if transaction.pending { "Processing" } @else { "Success" }
                            }

                            td class=(TABLE_CELL_STYLE) { (transaction.date.to_string()) }
                            td class=(TABLE_CELL_STYLE) { (transaction.payment_channel) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (transaction.category.as_deref().unwrap_or("Uncategorized"))
                            }
                        }
                    }

                    @if transactions.is_empty() {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td colspan="6" class="px-6 py-4 text-center" { "No transactions yet." }
                        }
                    }
                }
            }
        }
    }
}

fn bank_tabs(summaries: &[BankSummary], selected: &BankAccountId) -> Markup {
    html! {
        ul class="flex flex-wrap gap-2 text-sm font-medium text-center"
        {
            @for summary in summaries {
                @let is_selected = &summary.record.id == selected;
                @let style = if is_selected {
                    "inline-block px-4 py-2 text-white bg-blue-600 rounded-lg"
                } else {
                    "inline-block px-4 py-2 rounded-lg hover:text-gray-900 hover:bg-gray-100 \
                    dark:hover:bg-gray-800 dark:hover:text-white"
                };
                li
                {
                    a
                        href={ (endpoints::TRANSACTION_HISTORY_VIEW) "?id=" (summary.record.id.as_str()) }
                        aria-current=[is_selected.then_some("page")]
                        class=(style)
                    {
                        (summary.account.name)
                    }
                }
            }
        }
    }
}

fn pagination(bank_id: &BankAccountId, page: usize, page_count: usize) -> Markup {
    let page_url = |page: usize| {
        format!(
            "{}?id={bank_id}&page={page}",
            endpoints::TRANSACTION_HISTORY_VIEW
        )
    };

    html! {
        nav class="flex items-center justify-between w-full" aria-label="Pagination"
        {
            @if page > 1 {
                (link(&page_url(page - 1), "Previous"))
            } @else {
                span {}
            }

            span class="text-sm" { "Page " (page) " of " (page_count) }

            @if page < page_count {
                (link(&page_url(page + 1), "Next"))
            } @else {
                span {}
            }
        }
    }
}

fn no_banks_view() -> Markup {
    html! {
        div class=(CARD_STYLE)
        {
            p
            {
                "You have not linked any banks yet. "
                (link(endpoints::LINK_BANK_VIEW, "Connect a bank"))
                " to see its transactions."
            }
        }
    }
}

/// Display the transactions of the bank named in the query, or the user's
/// first bank if none is named.
pub async fn get_transaction_history_page(
    State(state): State<TransactionHistoryState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Response {
    let nav_bar = NavBar::new(endpoints::TRANSACTION_HISTORY_VIEW, &identity.name).into_html();

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

    let selected = match &query.id {
        Some(id) => summaries
            .iter()
            .find(|summary| summary.record.id.as_str() == id),
        None => summaries.first(),
    };

    let body = match selected {
        Some(selected) => {
            let transactions = match state
                .aggregator
                .get_transactions(&selected.record.access_token)
                .await
            {
                Ok(transactions) => transactions,
                Err(error) => {
                    tracing::error!(
                        "could not fetch transactions for bank account {}: {error}",
                        selected.record.id
                    );
                    return error.into_response();
                }
            };

            let transactions: Vec<Transaction> = transactions
                .into_iter()
                .filter(|transaction| transaction.account_id == selected.record.account_id)
                .collect();

            let page_count = transactions.len().div_ceil(PAGE_SIZE).max(1);
            let page = query.page.unwrap_or(1).clamp(1, page_count);
            let page_transactions: Vec<Transaction> = transactions
                .into_iter()
                .skip((page - 1) * PAGE_SIZE)
                .take(PAGE_SIZE)
                .collect();

            html! {
                (bank_tabs(&summaries, &selected.record.id))

                div class={ (CARD_STYLE) " flex justify-between items-center" }
                {
                    div
                    {
                        h2 class="text-lg font-semibold" { (selected.account.name) }
                        @if let Some(official_name) = &selected.account.official_name {
                            p class="text-sm text-gray-500 dark:text-gray-400" { (official_name) }
                        }
                        @if let Some(mask) = &selected.account.mask {
                            p class="text-sm tracking-widest" { "●●●● ●●●● ●●●● " (mask) }
                        }
                    }

                    div class="text-right"
                    {
                        p class="text-sm" { "Current balance" }
                        p class="text-2xl font-bold" id="current-balance"
                        {
                            (format_currency(selected.account.current_balance))
                        }
                    }
                }

                (transactions_table(&page_transactions))

                (pagination(&selected.record.id, page, page_count))
            }
        }
        None if query.id.is_some() => return Error::NotFound.into_response(),
        None => no_banks_view(),
    };

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl space-y-6"
            {
                header
                {
                    h1 class="text-2xl font-bold" { "Transaction History" }
                    p class="text-gray-500 dark:text-gray-400"
                    {
                        "Gain insights and track your transactions over time."
                    }
                }

                (body)
            }
        }
    };

    base("Transaction History", &[], &content).into_response()
}
