use crate::models::PaymentMethod;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Same unreserved set as JavaScript's `encodeURIComponent`, which the Venmo
/// endpoints were built against.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How long the native app gets to intercept the deep link before the web
/// fallback kicks in.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(1500);

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn clean_username(username: &str) -> &str {
    username.strip_prefix('@').unwrap_or(username)
}

/// Formats a payment amount the way Venmo expects: always two decimals.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Deep link that opens the native Venmo app with a prefilled payment.
pub fn build_venmo_deep_link(username: &str, amount: &str, note: &str) -> String {
    let user = clean_username(username);
    let note = encode_component(note);
    format!("venmo://paycharge?txn=pay&recipients={user}&amount={amount}&note={note}")
}

/// Web pay URL used when the native app is not installed. Parameters are
/// identical to the deep link.
pub fn build_venmo_web_url(username: &str, amount: &str, note: &str) -> String {
    let user = clean_username(username);
    let note = encode_component(note);
    format!("https://account.venmo.com/pay?recipients={user}&amount={amount}&note={note}")
}

/// Locates a Venmo handle among a bill's payment methods by case-insensitive
/// substring match on the method name.
pub fn find_venmo_handle(methods: &[PaymentMethod]) -> Option<&str> {
    methods
        .iter()
        .find(|method| method.name.to_lowercase().contains("venmo"))
        .map(|method| method.identifier.as_str())
}

/// Navigation capability injected into the fallback sequence so tests can
/// observe redirects without a browser.
pub trait Navigate: Send + Sync + 'static {
    fn navigate(&self, url: &str);
}

/// Handle to an armed fallback timer. Dropping the guard leaves the timer
/// running (fire-and-forget); call [`FallbackGuard::cancel`] to suppress the
/// redirect after a successful app handoff or before teardown.
pub struct FallbackGuard {
    handle: JoinHandle<()>,
}

impl FallbackGuard {
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Arms the dual-navigation fallback: the caller points the environment at
/// the native deep link, and if the app has not taken over within
/// [`FALLBACK_DELAY`] the navigator is redirected to `web_url`.
pub fn arm_web_fallback<N: Navigate>(navigator: Arc<N>, web_url: String) -> FallbackGuard {
    let handle = tokio::spawn(async move {
        tokio::time::sleep(FALLBACK_DELAY).await;
        navigator.navigate(&web_url);
    });
    FallbackGuard { handle }
}
