//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{auth_guard, auth_guard_hx},
    dashboard::get_dashboard_page,
    endpoints,
    internal_server_error::get_internal_server_error_page,
    link_bank::{get_link_bank_page, post_bank_account, post_link_token},
    my_banks::get_my_banks_page,
    not_found::get_404_not_found,
    sign_in::{get_sign_in_page, post_sign_in},
    sign_out::get_sign_out,
    sign_up::{get_sign_up_page, post_sign_up},
    transaction_history::get_transaction_history_page,
    transfer_page::{get_transfer_page, post_transfer},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::SIGN_IN_VIEW, get(get_sign_in_page))
        .route(endpoints::SIGN_IN_API, post(post_sign_in))
        .route(endpoints::SIGN_UP_VIEW, get(get_sign_up_page))
        .route(endpoints::SIGN_UP_API, post(post_sign_up))
        .route(endpoints::SIGN_OUT, get(get_sign_out))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_dashboard_page))
        .route(endpoints::MY_BANKS_VIEW, get(get_my_banks_page))
        .route(
            endpoints::TRANSACTION_HISTORY_VIEW,
            get(get_transaction_history_page),
        )
        .route(endpoints::LINK_BANK_VIEW, get(get_link_bank_page))
        .route(endpoints::PAYMENT_TRANSFER_VIEW, get(get_transfer_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // These POST routes need to use the HX-REDIRECT header for auth redirects to work properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(endpoints::LINK_TOKEN_API, post(post_link_token))
            .route(endpoints::BANK_ACCOUNTS_API, post(post_bank_account))
            .route(endpoints::TRANSFERS_API, post(post_transfer))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}
