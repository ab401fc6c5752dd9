// trail and the search over it
pub mod jsonpath;
pub mod filter;
pub mod finder;

// one line at a time, then all of them
pub mod record;
pub mod aggregate;
pub mod pipeline;

// the outside world
pub mod progress;
pub mod output;
pub mod cli;

/// Either stdin, or the file given on the command line.
pub fn make_readable<P>(maybe_path : Option<P>) -> std::io::Result<Box<dyn std::io::BufRead>>
where P : AsRef<std::path::Path>
{
  match maybe_path {
    None => Ok(Box::new(std::io::stdin().lock())),
    Some(path) => {
      let file = std::fs::File::open(path)?;
      Ok(Box::new(std::io::BufReader::with_capacity(1 << 20, file)))
    }
  }
}
