//! Receipt intake for expense tracking: rule-based field extraction,
//! merchant categorization, conversion into a base currency and a short
//! moving-average spend forecast.
//!
//! The `extractor`, `merchant`, `fx` and `forecast` modules are pure; rate
//! lookups come in through [`fx::RateStore`]. The remaining modules are the
//! SQLite-backed host used by the `clerk` binary.

pub mod analytics;
pub mod cli;
pub mod db;
pub mod error;
pub mod expenses;
pub mod extractor;
pub mod fmt;
pub mod forecast;
pub mod fx;
pub mod merchant;
pub mod models;
pub mod pipeline;
pub mod rates;
pub mod settings;

pub use extractor::extract;
pub use forecast::forecast;
pub use fx::{Converter, RateStore, RateTable};
pub use merchant::normalize_and_categorize;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `clerk=warn` filter.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("clerk=warn"));

        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_reentrant() {
        super::init_tracing();
        super::init_tracing();
    }
}
