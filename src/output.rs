/*!
Owns the run's tally, and makes sure it gets written out.

`finish` writes it and reports errors. If a `Flush` is dropped without
`finish` having been called, eg while unwinding from a panic, the tally is
written from `drop` instead, and any error can only be logged.
*/

use std::io::Write;

use crate::aggregate::Tally;

pub struct Flush<W : Write> {
  tally : Tally,
  out : Option<W>,
  pretty : bool,
}

impl<W : Write> Flush<W> {
  pub fn new(tally : Tally, out : W, pretty : bool) -> Self {
    Self { tally, out: Some(out), pretty }
  }

  pub fn tally_mut(&mut self) -> &mut Tally {
    &mut self.tally
  }

  fn write(&mut self) -> std::io::Result<()> {
    let Some(mut out) = self.out.take() else { return Ok(()) };
    if self.pretty {
      serde_json::to_writer_pretty(&mut out, &self.tally)?;
    } else {
      serde_json::to_writer(&mut out, &self.tally)?;
    }
    writeln!(out)?;
    out.flush()
  }

  /// Write the tally as one json document. Only the first call writes anything.
  pub fn finish(mut self) -> std::io::Result<()> {
    self.write()
  }
}

impl<W : Write> Drop for Flush<W> {
  fn drop(&mut self) {
    if self.out.is_some() {
      log::warn!("writing results while shutting down");
      if let Err(err) = self.write() {
        log::error!("could not write results: {err}");
      }
    }
  }
}
