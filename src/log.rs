use slog::{o, Discard, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, TermDecorator};

/// Terminal logger for callers driving the pipeline interactively.
pub fn create_logger(for_module: &str) -> Logger {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator)
        .use_utc_timestamp()
        .use_original_order()
        .build()
        .fuse();
    let async_drain = Async::new(drain).build().fuse();
    Logger::root(
        async_drain,
        o!("component" => "ppgcal", "module" => for_module.to_string()),
    )
}

/// Logger that drops every record; the default for library stages.
pub fn silent() -> Logger {
    Logger::root(Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::info;

    #[test]
    fn loggers_accept_records() {
        let logger = create_logger("log-test").new(o!("stage" => "filter"));
        info!(logger, "logger ready"; "order" => 3);
        info!(silent(), "dropped");
    }
}
