pub use log::LevelFilter::*;

fn dispatch(verbosity: log::LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .level(verbosity)
        .format(|out, message, record| out.finish(format_args!("({}) {}: {}", record.level(), record.target(), message)))
}

/// Install the global logger writing to stdout.
pub fn setup_logging(verbosity: log::LevelFilter) {
    dispatch(verbosity)
        .chain(std::io::stdout())
        .apply()
        .expect("expected setup_logging to only ever be called once per instance");
}

/// Install the global logger forwarding to a host-provided sink, such as the game console.
pub fn setup_logging_to(verbosity: log::LevelFilter, sink: Box<dyn log::Log>) {
    dispatch(verbosity)
        .chain(sink)
        .apply()
        .expect("expected setup_logging to only ever be called once per instance");
}
