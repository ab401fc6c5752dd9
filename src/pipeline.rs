/*!
Reads lines, hands them out in batches to a pool of worker threads, and
merges what comes back.

The calling thread is the coordinator. It reads the input, and sends batches
of lines over a bounded channel, so reading can't get too far ahead of the
workers. Each worker processes whole batches, folds the matches into its own
`Tally`, and sends that back over an unbounded channel. Only the coordinator
touches the run's tally, and merging is order-independent, so the order in
which batches complete doesn't matter.

Setting the stop flag makes the coordinator stop reading at the next line.
Everything already handed out is still collected.
*/

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{Receiver, Sender};

use crate::aggregate::{Mode, Tally};
use crate::finder::Finder;
use crate::progress::Progress;
use crate::record::{process_record, Fields, RecordError};

/// this seems to be a good balance between dispatch overhead and granularity
pub const CHUNK_SIZE : usize = 8192;

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct ScanOptions {
  /// number of worker threads
  pub jobs : usize,
  /// lines per batch
  pub chunk_size : usize,
  /// stop at the first record that can't be processed
  pub strict : bool,
  /// report progress on stderr
  pub progress : bool,
}

impl Default for ScanOptions {
  fn default() -> Self {
    Self {
      jobs: num_cpus::get(),
      chunk_size: CHUNK_SIZE,
      strict: false,
      progress: false,
    }
  }
}

#[derive(Debug,thiserror::Error)]
pub enum ScanError {
  #[error("cannot read input: {0}")]
  Read(#[source] std::io::Error),

  #[error("line {line}: {source}")]
  Rejected { line : u64, source : RecordError },
}

/// What happened during a scan.
#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub struct Summary {
  /// lines read, including blank and rejected ones
  pub lines : u64,
  /// records processed successfully
  pub records : u64,
  pub rejected : u64,
  pub bytes : u64,
  /// stopped early because of the stop flag
  pub interrupted : bool,
}

/// Lines numbered from 1.
struct Batch(Vec<(u64, Vec<u8>)>);

/// From workers to the coordinator.
#[derive(Debug)]
enum Event {
  /// tally of one batch, and how many records went into it
  Tally(u64, Tally),
  Rejected(u64, RecordError),
}

fn work(jobs : Receiver<Batch>, events : Sender<Event>, finder : &Finder, fields : &Fields, mode : Mode) {
  for Batch(lines) in jobs {
    let mut tally = Tally::new(mode);
    let mut records = 0;
    for (line_number, line) in lines {
      match process_record(&line, fields, finder) {
        Ok(record) => {
          records += 1;
          tally.fold(record);
        }
        Err(err) => {
          // coordinator has gone, so nobody cares any more
          if events.send(Event::Rejected(line_number, err)).is_err() { return }
        }
      }
    }
    if events.send(Event::Tally(records, tally)).is_err() { return }
  }
}

/// Coordinator state
struct Collector<'t> {
  tally : &'t mut Tally,
  summary : Summary,
  strict : bool,
  failure : Option<ScanError>,
}

impl<'t> Collector<'t> {
  fn receive(&mut self, event : Event) {
    match event {
      Event::Tally(records, tally) => {
        self.summary.records += records;
        self.tally.merge(tally);
      }
      Event::Rejected(line, err) => {
        self.summary.rejected += 1;
        if self.strict {
          // keep the first one, the rest are probably consequences
          if self.failure.is_none() {
            self.failure = Some(ScanError::Rejected { line, source: err });
          }
        } else {
          log::warn!("skipping line {line}: {err}");
        }
      }
    }
  }
}

/// Search every line of `input`, merging what's found into `tally`.
///
/// The tally is updated even when this returns an error, so it can still be written out.
pub fn scan<R : BufRead>(
  input : R,
  tally : &mut Tally,
  finder : &Finder,
  fields : &Fields,
  options : &ScanOptions,
  stop : &AtomicBool,
) -> Result<Summary, ScanError>
{
  let mut input = countio::Counter::new(input);
  let jobs = options.jobs.max(1);
  let chunk_size = options.chunk_size.max(1);
  let mode = tally.mode();

  let (job_tx, job_rx) = crossbeam::channel::bounded::<Batch>(jobs * 2);
  let (event_tx, event_rx) = crossbeam::channel::unbounded::<Event>();

  let mut progress = Progress::stderr(options.progress);
  let mut collector = Collector { tally, summary: Summary::default(), strict: options.strict, failure: None };

  log::info!("scanning with {jobs} workers, {chunk_size} lines per batch");

  std::thread::scope(|scope| {
    for n in 0..jobs {
      let (job_rx, event_tx) = (job_rx.clone(), event_tx.clone());
      std::thread::Builder::new()
        .name(format!("ldvals worker {n}"))
        .spawn_scoped(scope, move || work(job_rx, event_tx, finder, fields, mode))
        .expect("cannot create worker thread");
    }
    // so that the channels close once the workers are done
    drop(job_rx);
    drop(event_tx);

    let mut batch = Vec::with_capacity(chunk_size);
    let mut line = vec![];
    loop {
      if stop.load(Ordering::Relaxed) {
        log::warn!("interrupted after {} lines", collector.summary.lines);
        collector.summary.interrupted = true;
        break
      }
      if collector.failure.is_some() { break }

      line.clear();
      match input.read_until(b'\n', &mut line) {
        Ok(0) => break,
        Ok(_) => (),
        Err(err) => {
          collector.failure = Some(ScanError::Read(err));
          break
        }
      }
      collector.summary.lines += 1;
      if line.iter().all(u8::is_ascii_whitespace) { continue }
      batch.push((collector.summary.lines, std::mem::take(&mut line)));

      if batch.len() >= chunk_size {
        let full = std::mem::replace(&mut batch, Vec::with_capacity(chunk_size));
        // all workers gone, which means they panicked. scope will propagate that.
        if job_tx.send(Batch(full)).is_err() { break }
        for event in event_rx.try_iter() {
          collector.receive(event);
        }
        progress.tick(collector.summary.records, collector.tally.entries(), input.reader_bytes() as u64);
      }
    }

    if !batch.is_empty() && collector.failure.is_none() {
      let _ = job_tx.send(Batch(batch));
    }
    drop(job_tx);

    // Wait for everything in flight. Ends when the last worker drops its sender.
    for event in event_rx.iter() {
      collector.receive(event);
      progress.tick(collector.summary.records, collector.tally.entries(), input.reader_bytes() as u64);
    }
  });

  let Collector { mut summary, failure, .. } = collector;
  summary.bytes = input.reader_bytes() as u64;
  log::info!("{} lines, {} records, {} rejected", summary.lines, summary.records, summary.rejected);

  match failure {
    Some(err) => Err(err),
    None => Ok(summary),
  }
}
