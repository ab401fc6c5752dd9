//! Command line, and turning it into the configuration for a run.

use std::path::PathBuf;

use crate::aggregate::Mode;
use crate::filter::{Filter, FilterError};
use crate::finder::Finder;
use crate::pipeline::{ScanOptions, CHUNK_SIZE};
use crate::record::Fields;

/// Collect the values found under KEYs in a stream of json-ld records,
/// one record per line, and count them per path.
///
/// Output is a json object of path => value => count, or with N,
/// path => value => up to N example record ids.
#[derive(Debug,clap::Parser)]
#[command(name = "ldvals", version)]
pub struct Cli {
  /// Keys to find values for. The first plain number is N, the number of
  /// example record ids to keep per value instead of counting.
  #[arg(value_name = "KEY | N")]
  pub tokens : Vec<String>,

  /// Qualify each step of a path with the type of its node, eg subject[Topic]
  #[arg(short = 't', long)]
  pub by_type : bool,

  /// Only keep values for which EXPR is true. EXPR can use v (the value),
  /// graph (all nodes of the record) and trail (labels leading to the key),
  /// eg "v != 'swe' and len(trail) < 3"
  #[arg(long, value_name = "EXPR")]
  pub filter : Option<String>,

  /// Read records from FILE instead of stdin
  #[arg(short, long, value_name = "FILE")]
  pub input : Option<PathBuf>,

  /// Number of worker threads [default: number of cpus]
  #[arg(short, long)]
  pub jobs : Option<usize>,

  /// Number of lines handed to a worker at a time
  #[arg(long, default_value_t = CHUNK_SIZE)]
  pub chunk_size : usize,

  /// Stop at the first line that isn't a valid record, instead of skipping it
  #[arg(long)]
  pub strict : bool,

  /// No progress report on stderr
  #[arg(short, long)]
  pub quiet : bool,

  /// Field holding the array of nodes
  #[arg(long, default_value = "@graph")]
  pub graph_key : String,

  /// Field of the first node holding the record id
  #[arg(long, default_value = "@id")]
  pub id_key : String,

  /// Field holding the type of a node, for --by-type
  #[arg(long, default_value = "@type")]
  pub type_key : String,

  /// Write the result on a single line
  #[arg(long)]
  pub compact : bool,
}

#[derive(Debug,thiserror::Error)]
pub enum UsageError {
  #[error("Provide keys to find values for!")]
  NoKeys,

  #[error("--filter: {0}")]
  Filter(#[from] FilterError),

  #[error("{0} must be at least 1")]
  Zero(&'static str),
}

/// Everything a run needs, built once and never changed.
pub struct Config {
  pub finder : Finder,
  pub fields : Fields,
  pub mode : Mode,
  pub options : ScanOptions,
  pub input : Option<PathBuf>,
  pub pretty : bool,
}

fn is_number(token : &str) -> bool {
  !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Split tokens into target keys, and the number of examples to keep.
///
/// Only the first number counts as N, later ones are keys.
pub fn split_tokens<S : AsRef<str>>(tokens : &[S]) -> (Vec<String>, usize) {
  let mut keys = vec![];
  let mut examples = None;
  for token in tokens.iter().map(AsRef::as_ref) {
    if examples.is_none() && is_number(token) {
      // absurdly large numbers just mean keep everything
      examples = Some(token.parse().unwrap_or(usize::MAX));
    } else {
      keys.push(token.to_string());
    }
  }
  (keys, examples.unwrap_or(0))
}

impl Cli {
  pub fn config(self) -> Result<Config, UsageError> {
    let (keys, examples) = split_tokens(&self.tokens);
    if keys.is_empty() {
      return Err(UsageError::NoKeys)
    }

    let jobs = self.jobs.unwrap_or_else(num_cpus::get);
    if jobs == 0 { return Err(UsageError::Zero("--jobs")) }
    if self.chunk_size == 0 { return Err(UsageError::Zero("--chunk-size")) }

    log::info!("finding values for {keys:?}");
    let mut finder = Finder::new(keys);
    if self.by_type {
      finder = finder.by_type(self.type_key);
    }
    if let Some(source) = &self.filter {
      let filter = Filter::compile(source)?;
      log::info!("filtering with {filter}");
      finder = finder.with_predicate(filter);
    }

    Ok(Config {
      finder,
      fields: Fields { graph: self.graph_key, id: self.id_key },
      mode: Mode::from_examples(examples),
      options: ScanOptions {
        jobs,
        chunk_size: self.chunk_size,
        strict: self.strict,
        progress: !self.quiet,
      },
      input: self.input,
      pretty: !self.compact,
    })
  }
}
