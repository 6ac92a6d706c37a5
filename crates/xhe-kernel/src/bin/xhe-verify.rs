//! xhe-verify: replay a ledger database and report tampered pulses.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xhe_core::format_pulse_index;
use xhe_kernel::{EventDispatcher, Ledger};
use xhe_store::SqliteStore;

fn print_usage() {
    eprintln!(
        r#"xhe-verify - replay an Xhe ledger and check every pulse hash

USAGE:
    xhe-verify <db-path> [--from N]

OPTIONS:
    --from N    Start at pulse index N (default 0)
    -h, --help  Show this help

Exits with status 1 if any pulse fails verification."#
    );
}

struct Args {
    db_path: String,
    from: u64,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut db_path = None;
    let mut from = 0;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--from" => {
                let value = args.get(i + 1).context("--from needs a value")?;
                from = value
                    .parse()
                    .with_context(|| format!("invalid --from value: {}", value))?;
                i += 2;
            }
            arg if db_path.is_none() => {
                db_path = Some(arg.to_owned());
                i += 1;
            }
            arg => bail!("unexpected argument: {}", arg),
        }
    }

    let db_path = db_path.context("missing <db-path>")?;
    Ok(Args { db_path, from })
}

async fn verify(args: &Args) -> anyhow::Result<usize> {
    let store = SqliteStore::open(&args.db_path)
        .with_context(|| format!("opening {}", args.db_path))?;
    let ledger = Ledger::open(Arc::new(store), Arc::new(EventDispatcher::new())).await?;

    let entries = ledger.replay(args.from).await?;
    let mut invalid = 0;
    for entry in entries.iter().filter(|e| !e.valid) {
        invalid += 1;
        let index = entry.index.map_or_else(|| "?".to_owned(), format_pulse_index);
        match (&entry.pulse, &entry.malformed) {
            (Some(pulse), _) => println!(
                "{} {} {} stored hash does not match contents",
                index,
                pulse.kind,
                pulse.hash.short()
            ),
            (None, reason) => println!(
                "{} malformed record: {}",
                index,
                reason.as_deref().unwrap_or("undecodable")
            ),
        }
    }

    println!("{} pulses checked, {} invalid", entries.len(), invalid);
    Ok(invalid)
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let raw: Vec<String> = env::args().skip(1).collect();
    if raw.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {:#}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match verify(&args).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("verification failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
