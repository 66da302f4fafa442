mod art;
mod config;
mod consts;
mod daemon;
mod matchmaker;
mod ratelimit;
mod session;
mod signals;
mod ssh;
mod supervisor;

use std::fs;
use std::io;
use std::sync::Mutex;

use clap::Parser;
use tracing::error;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Debug)]
#[clap(version, author, about = "pairs anonymous strangers for one-on-one text chat over ssh")]
struct Args {
    #[clap(short, long, action, help = "a toml file containing configuration")]
    config_file: Option<String>,
    #[clap(short, long, action, help = "the file to write logs to; defaults to stderr")]
    log_file: Option<String>,
    #[clap(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "show more in logs, may be provided multiple times"
    )]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let trace_level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    match args.log_file {
        Some(ref log_file) => {
            let file = fs::File::create(log_file)?;
            tracing_subscriber::fmt()
                .with_max_level(trace_level)
                .with_thread_ids(true)
                .with_target(false)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(trace_level)
                .with_thread_ids(true)
                .with_target(false)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_writer(io::stderr)
                .init();
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    let result = runtime.block_on(daemon::run(args.config_file));
    if let Err(err) = result {
        error!("{:?}", err);
        std::process::exit(1);
    }

    Ok(())
}
