use clap::{command, value_parser, Arg, ArgAction};
use kv_bridge::{
    common::Output,
    dispatch::handle,
    store::{MemoryConnector, RedisConnector},
};
use slog::{crit, debug, o, Drain, Level};
use std::{
    io::{self, Write},
    time::Duration,
};

fn main() {
    // create command line interface by using builder API in `clap`
    let matches = command!() // requires `cargo` feature
        .about("Run one key-value store operation read as JSON from stdin")
        .args(&[
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Connect, read and write timeout; 0 waits forever")
                .value_parser(value_parser!(u64))
                .default_value("30"),
            Arg::new("memory")
                .long("memory")
                .help("Run against an empty in-process store instead of the network")
                .action(ArgAction::SetTrue),
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log more to stderr, repeat for debug output")
                .action(ArgAction::Count),
        ])
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => Level::Warning,
        1 => Level::Info,
        _ => Level::Debug,
    };
    // stdout carries the envelope, logs go to stderr
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().filter_level(level).fuse();
    let logger = slog::Logger::root(drain, o!());

    let timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);
    debug!(logger, "version v{}", env!("CARGO_PKG_VERSION"); "timeout" => ?timeout);

    let stdin = io::stdin().lock();
    let output = if matches.get_flag("memory") {
        handle(stdin, &MemoryConnector::new(), &logger)
    } else {
        handle(stdin, &RedisConnector::new(timeout), &logger)
    };

    if let Err(e) = emit(&output) {
        crit!(logger, "failed to write output: {e}");
    }
}

fn emit(output: &Output) -> kv_bridge::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, output)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
