use ldvals::aggregate::Tally;
use ldvals::cli::{Cli, Config};
use ldvals::output::Flush;
use ldvals::pipeline;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;

/// Set by the first ctrl-c. Reading stops, and whatever has been found so far is written out.
static STOP : AtomicBool = AtomicBool::new(false);

fn run(config : Config) -> anyhow::Result<()> {
  let Config { finder, fields, mode, options, input, pretty } = config;

  let istream = ldvals::make_readable(input.as_ref())
    .with_context(|| match &input {
      Some(path) => format!("cannot open {}", path.display()),
      None => "cannot read stdin".to_string(),
    })?;

  let mut flush = Flush::new(Tally::new(mode), std::io::stdout().lock(), pretty);
  let scanned = pipeline::scan(istream, flush.tally_mut(), &finder, &fields, &options, &STOP);

  // results go out whatever happened during the scan
  flush.finish().context("cannot write results")?;

  let summary = scanned?;
  if summary.interrupted {
    log::warn!("interrupted, results are for the first {} lines only", summary.lines);
  }
  if summary.rejected > 0 {
    log::warn!("skipped {} of {} lines", summary.rejected, summary.lines);
  }
  Ok(())
}

fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

  // clap exits with 2 on its own errors
  let cli = Cli::parse();
  let config = match cli.config() {
    Ok(config) => config,
    Err(err) => {
      eprintln!("{err}");
      return ExitCode::from(2)
    }
  };

  // second ctrl-c means really stop, now
  let handler = ctrlc::set_handler(|| {
    if STOP.swap(true, Ordering::SeqCst) {
      std::process::exit(130)
    }
  });
  if let Err(err) = handler {
    log::warn!("ctrl-c will lose results: {err}");
  }

  match run(config) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("ldvals: {err:#}");
      ExitCode::FAILURE
    }
  }
}
