#![allow(missing_docs)]

pub(crate) mod fakes;
pub(crate) mod form;
pub(crate) mod html;
pub(crate) mod http;

use std::sync::Arc;

pub(crate) use fakes::{
    FakeAggregator, FakeIdentityGateway, FakePaymentRail, account_metadata,
    in_memory_record_store, transaction,
};
pub(crate) use form::{
    assert_form_error_message, assert_form_input, assert_form_submit_button_with_text,
    assert_hx_endpoint, must_get_form,
};
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment, select_text};
pub(crate) use http::assert_hx_redirect;

use crate::{AppState, Services, ShareableIdCipher, SqliteRecordStore};

/// An [AppState] wired to fakes, with handles for inspecting them.
#[derive(Clone)]
pub(crate) struct TestApp {
    pub state: AppState,
    pub identity: FakeIdentityGateway,
    pub record_store: SqliteRecordStore,
    pub aggregator: FakeAggregator,
    pub payment_rail: FakePaymentRail,
}

impl TestApp {
    pub(crate) fn new(aggregator: FakeAggregator, payment_rail: FakePaymentRail) -> Self {
        let identity = FakeIdentityGateway::default();
        let record_store = in_memory_record_store();

        let state = AppState::new(
            "cookie secret for tests",
            ShareableIdCipher::new("shareable secret for tests"),
            Services {
                identity: Arc::new(identity.clone()),
                record_store: Arc::new(record_store.clone()),
                aggregator: Arc::new(aggregator.clone()),
                payment_rail: Arc::new(payment_rail.clone()),
            },
        );

        Self {
            state,
            identity,
            record_store,
            aggregator,
            payment_rail,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new(FakeAggregator::default(), FakePaymentRail::default())
    }
}
