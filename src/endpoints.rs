//! The URIs of the app's pages and API endpoints.

/// The landing page for signed-in users.
pub const ROOT: &str = "/";
/// The page for signing in.
pub const SIGN_IN_VIEW: &str = "/sign-in";
/// The page for creating an account.
pub const SIGN_UP_VIEW: &str = "/sign-up";
/// The page listing the user's linked banks.
pub const MY_BANKS_VIEW: &str = "/my-banks";
/// The page listing the transactions of one linked bank.
pub const TRANSACTION_HISTORY_VIEW: &str = "/transaction-history";
/// The page that starts the aggregator's link widget.
pub const LINK_BANK_VIEW: &str = "/link-bank";
/// The page for sending money to another user.
pub const PAYMENT_TRANSFER_VIEW: &str = "/payment-transfer";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for starting a session.
pub const SIGN_IN_API: &str = "/api/sign-in";
/// The route for creating an account.
pub const SIGN_UP_API: &str = "/api/sign-up";
/// The route for ending the current session.
pub const SIGN_OUT: &str = "/api/sign-out";
/// The route for creating a link token for the link widget.
pub const LINK_TOKEN_API: &str = "/api/link-token";
/// The route for linking the bank account behind a public token.
pub const BANK_ACCOUNTS_API: &str = "/api/bank-accounts";
/// The route for sending money.
pub const TRANSFERS_API: &str = "/api/transfers";
