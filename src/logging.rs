use tracing_subscriber::EnvFilter;

/// Install the global stderr subscriber.
///
/// The filter comes from `ZURI_LOG`, then `RUST_LOG`, and otherwise keeps
/// other crates at `warn` and this one at `info` (`debug` when `verbose`).
pub fn init(verbose: bool) {
    let filter = std::env::var("ZURI_LOG")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbose)));

    // A second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,zuri=debug"
    } else {
        "warn,zuri=info"
    }
}
