//! Throttled progress report on stderr.

use std::io::Write;
use std::time::{Duration, Instant};

pub const INTERVAL : Duration = Duration::from_secs(2);

/// 1234567 => 1,234,567
pub fn thousands(n : u64) -> String {
  let digits = n.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

/// bytes in MiB, one decimal
pub fn mebibytes(bytes : u64) -> String {
  format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

/// Clears the terminal and prints counts, at most once per interval.
pub struct Progress<W : Write> {
  out : Option<W>,
  interval : Duration,
  last : Option<Instant>,
}

impl Progress<std::io::Stderr> {
  pub fn stderr(enabled : bool) -> Self {
    Self::new(enabled.then(std::io::stderr), INTERVAL)
  }
}

impl<W : Write> Progress<W> {
  /// No output at all when `out` is None.
  pub fn new(out : Option<W>, interval : Duration) -> Self {
    Self { out, interval, last: None }
  }

  /// Report, unless the last report was less than an interval ago.
  pub fn tick(&mut self, records : u64, results : usize, bytes : u64) {
    let Some(out) = self.out.as_mut() else { return };
    let now = Instant::now();
    if self.last.is_some_and(|last| now.duration_since(last) < self.interval) {
      return
    }
    self.last = Some(now);

    // ESC c resets the terminal. Failing to write progress is not worth stopping for.
    let _ = writeln!(out, "\x1bcRecords: {}, Results: {}, Read: {}",
      thousands(records),
      thousands(results as u64),
      mebibytes(bytes),
    );
  }
}
