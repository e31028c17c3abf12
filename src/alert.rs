//! Alert messages that HTMX swaps into the page's alert container.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

/// A success or error message shown to the user after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// A success message with more details below it.
    Success {
        /// The headline.
        message: String,
        /// The body text.
        details: String,
    },
    /// An error message with more details below it.
    Error {
        /// The headline.
        message: String,
        /// The body text.
        details: String,
    },
    /// An error message on its own.
    ErrorSimple {
        /// The headline.
        message: String,
    },
}

impl Alert {
    /// Render the alert as an out-of-band swap into `#alert-container`.
    pub fn into_html(self) -> Markup {
        let (is_error, message, details) = match self {
            Alert::Success { message, details } => (false, message, details),
            Alert::Error { message, details } => (true, message, details),
            Alert::ErrorSimple { message } => (true, message, String::new()),
        };

        let style = if is_error {
            "p-4 mb-4 text-sm text-red-800 rounded-lg bg-red-50 \
            dark:bg-gray-800 dark:text-red-400"
        } else {
            "p-4 mb-4 text-sm text-green-800 rounded-lg bg-green-50 \
            dark:bg-gray-800 dark:text-green-400"
        };

        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                div class=(style) role="alert"
                {
                    div class="flex justify-between items-start gap-x-4"
                    {
                        div
                        {
                            span class="font-medium" { (message) }

                            @if !details.is_empty() {
                                p class="mt-1" { (details) }
                            }
                        }

                        button
                            type="button"
                            aria-label="Close"
                            onclick="this.closest('#alert-container').classList.add('hidden')"
                        {
                            "×"
                        }
                    }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use scraper::Selector;

    use crate::{alert::Alert, test_utils::parse_html_fragment};

    #[tokio::test]
    async fn error_alert_shows_message_and_details() {
        let response = Alert::Error {
            message: "Invalid request".to_owned(),
            details: "The amount must be positive.".to_owned(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        let container = html
            .select(&Selector::parse("#alert-container").unwrap())
            .next()
            .expect("No alert container found");
        assert_eq!(container.value().attr("hx-swap-oob"), Some("true"));
        let text = container.text().collect::<String>();
        assert!(text.contains("Invalid request"));
        assert!(text.contains("The amount must be positive."));
        let alert = container
            .select(&Selector::parse("[role=alert]").unwrap())
            .next()
            .unwrap();
        assert!(alert.value().attr("class").unwrap().contains("text-red-800"));
    }

    #[tokio::test]
    async fn simple_error_alert_has_no_details() {
        let response = Alert::ErrorSimple {
            message: "Something went wrong".to_owned(),
        }
        .into_response();

        let html = parse_html_fragment(response).await;
        let paragraphs = html.select(&Selector::parse("p").unwrap()).count();
        assert_eq!(paragraphs, 0);
        let alert = html
            .select(&Selector::parse("[role=alert]").unwrap())
            .next()
            .unwrap();
        assert!(alert.value().attr("class").unwrap().contains("text-red-800"));
    }
}
