//! stashctl - command shell over a StashCache-backed store directory

mod handler;
mod reply;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stashcache::{StashCache, DEFAULT_STORE_PATH};
use tracing::{error, info, warn};

use crate::handler::CommandHandler;
use crate::reply::Reply;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = DEFAULT_STORE_PATH)]
    data: PathBuf,

    /// Cache capacity (number of resident entries)
    #[arg(short, long, default_value_t = 10000)]
    capacity: usize,

    /// Read commands from a file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Leave resident entries unwritten on exit
    #[arg(long)]
    no_flush: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting stashctl v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", args.data.display());
    info!("Cache capacity: {}", args.capacity);

    let cache = match StashCache::open(&args.data, args.capacity) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            error!("Could not open cache: {}", e);
            return Err(e).context("opening cache");
        }
    };

    let input: Box<dyn BufRead> = match &args.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening script {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    serve(cache, input, io::stdout().lock(), !args.no_flush)
}

/// Run a session, then flush (unless told not to) and close the store even
/// when the session itself failed.
fn serve<R: BufRead, W: Write>(
    cache: Arc<StashCache>,
    input: R,
    out: W,
    flush: bool,
) -> Result<()> {
    let session = run_session(Arc::clone(&cache), input, out);
    if let Err(e) = &session {
        error!("Session aborted: {:#}", e);
    }

    let closed = shutdown(cache, flush);
    if let (Err(_), Err(e)) = (&session, &closed) {
        error!("Shutdown after aborted session failed: {:#}", e);
    }

    session.and(closed)
}

fn shutdown(cache: Arc<StashCache>, flush: bool) -> Result<()> {
    if flush {
        let flushed = cache.flush().context("flushing resident entries")?;
        info!("Wrote back {} resident entries", flushed);
    } else {
        warn!("Skipping flush; {} resident entries will be dropped", cache.len());
    }

    let cache = Arc::try_unwrap(cache)
        .map_err(|_| anyhow::anyhow!("cache still shared at shutdown"))?;
    cache.close().context("closing store")?;
    info!("Store closed");

    Ok(())
}

fn run_session<R: BufRead, W: Write>(cache: Arc<StashCache>, input: R, mut out: W) -> Result<()> {
    let handler = CommandHandler::new(cache);

    for line in input.lines() {
        let line = line.context("reading command")?;
        match handler.handle(&line) {
            Some(Reply::Quit) => break,
            Some(reply) => writeln!(out, "{}", reply)?,
            None => {}
        }
    }

    out.flush()?;
    Ok(())
}
