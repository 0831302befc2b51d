pub mod coordinator;
pub mod error;
pub mod oracle;
#[cfg(feature = "distributed")]
pub mod s3_store;
pub mod splitter;
pub mod store;
pub mod summary;
pub mod worker;

pub use error::*;

/// Install the fmt subscriber for a binary. `RUST_LOG` controls verbosity,
/// defaulting to info.
pub fn init_tracing(service_name: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    tracing::info!(service = service_name, "tracing initialized");
}
