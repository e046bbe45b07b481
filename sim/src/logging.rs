//! Tracing setup for hosts embedding the simulation.

/// Install a global `tracing` subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Set `LOG_FORMAT=json` for
/// machine-readable output. Panics are routed through `tracing::error!` so a
/// fatal dump and the panic that follows end up in the same log.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };
    if installed.is_err() {
        // Someone else already owns the global subscriber.
        return;
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}
