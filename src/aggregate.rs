/*!
Folds the matches of many records into one tally, keyed by path then by value.

Either counts how often each value occurs at each path, or keeps a few example
record ids per value. Tallies can be merged, so workers keep their own and the
coordinator merges them as they arrive, in whatever order that happens to be.
*/

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::record::Record;

/// Marks an example set that had more ids than it was allowed to keep.
pub const TRUNCATED : &str = "...";

/// Chosen once, at startup.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Mode {
  Count,
  /// keep at most this many example record ids per value
  Examples(usize),
}

impl Mode {
  /// 0 means just count.
  pub fn from_examples(keep : usize) -> Self {
    match keep {
      0 => Mode::Count,
      n => Mode::Examples(n),
    }
  }
}

/// Example ids for one value at one path.
#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub struct Examples {
  ids : BTreeSet<String>,
  truncated : bool,
}

impl Examples {
  fn add(&mut self, id : &str, cap : usize) {
    if self.ids.len() < cap {
      self.ids.insert(id.to_string());
    } else if !self.ids.contains(id) {
      self.truncated = true;
    }
  }

  fn merge(&mut self, other : Examples, cap : usize) {
    for id in &other.ids {
      self.add(id, cap);
    }
    self.truncated |= other.truncated;
  }

  pub fn ids(&self) -> impl Iterator<Item=&str> {
    self.ids.iter().map(String::as_str)
  }

  pub fn is_truncated(&self) -> bool {
    self.truncated
  }

  /// Number of entries when rendered, including the truncation marker.
  pub fn len(&self) -> usize {
    self.ids.len() + usize::from(self.truncated)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Sorted ids, then the truncation marker.
impl Serialize for Examples {
  fn serialize<S : Serializer>(&self, serializer : S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(self.len()))?;
    for id in &self.ids {
      seq.serialize_element(id)?;
    }
    if self.truncated {
      seq.serialize_element(TRUNCATED)?;
    }
    seq.end()
  }
}

type ByValue<V> = FxHashMap<String, V>;
type ByPath<V> = FxHashMap<String, ByValue<V>>;

#[derive(Debug,Clone,PartialEq)]
pub enum Tally {
  Counts(ByPath<u64>),
  Examples { cap : usize, paths : ByPath<Examples> },
}

/// The key a found value is tallied under.
///
/// Strings are used as they are, lists are tab-joined, anything else is its json text.
pub fn value_key(value : &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Array(items) => items.iter().map(value_key).collect::<Vec<String>>().join("\t"),
    other => other.to_string(),
  }
}

impl Tally {
  pub fn new(mode : Mode) -> Self {
    match mode {
      Mode::Count => Tally::Counts(ByPath::default()),
      Mode::Examples(cap) => Tally::Examples { cap, paths: ByPath::default() },
    }
  }

  pub fn mode(&self) -> Mode {
    match self {
      Tally::Counts(_) => Mode::Count,
      Tally::Examples { cap, .. } => Mode::Examples(*cap),
    }
  }

  /// Add everything found in one record.
  pub fn fold(&mut self, record : Record) {
    let Record { id, found } = record;
    for (path, value) in found {
      let key = value_key(&value);
      match self {
        Tally::Counts(paths) => *paths.entry(path).or_default().entry(key).or_default() += 1,
        Tally::Examples { cap, paths } => paths.entry(path).or_default().entry(key).or_default().add(&id, *cap),
      }
    }
  }

  /// Add another tally to this one. Counts add up, example sets are unioned up to the cap.
  ///
  /// Both must be in the same mode, anything else is a bug in the caller.
  pub fn merge(&mut self, other : Tally) {
    match (self, other) {
      (Tally::Counts(ours), Tally::Counts(theirs)) => {
        for (path, values) in theirs {
          let ours = ours.entry(path).or_default();
          for (value, count) in values {
            *ours.entry(value).or_default() += count;
          }
        }
      }
      (Tally::Examples { cap, paths: ours }, Tally::Examples { paths: theirs, .. }) => {
        for (path, values) in theirs {
          let ours = ours.entry(path).or_default();
          for (value, examples) in values {
            ours.entry(value).or_default().merge(examples, *cap);
          }
        }
      }
      (ours, theirs) => panic!("cannot merge {:?} tally into {:?} tally", theirs.mode(), ours.mode()),
    }
  }

  /// Number of distinct (path, value) pairs so far.
  pub fn entries(&self) -> usize {
    match self {
      Tally::Counts(paths) => paths.values().map(|values| values.len()).sum(),
      Tally::Examples { paths, .. } => paths.values().map(|values| values.len()).sum(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entries() == 0
  }

  pub fn count(&self, path : &str, value : &str) -> Option<u64> {
    match self {
      Tally::Counts(paths) => paths.get(path)?.get(value).copied(),
      Tally::Examples { .. } => None,
    }
  }

  pub fn examples(&self, path : &str, value : &str) -> Option<&Examples> {
    match self {
      Tally::Counts(_) => None,
      Tally::Examples { paths, .. } => paths.get(path)?.get(value),
    }
  }
}

/// Paths, then values, in sorted order, so output doesn't depend on arrival order.
fn sorted<V>(paths : &ByPath<V>) -> BTreeMap<&str, BTreeMap<&str, &V>> {
  paths
    .iter()
    .map(|(path, values)| (path.as_str(), values.iter().map(|(value, v)| (value.as_str(), v)).collect()))
    .collect()
}

impl Serialize for Tally {
  fn serialize<S : Serializer>(&self, serializer : S) -> Result<S::Ok, S::Error> {
    match self {
      Tally::Counts(counts) => sorted(counts).serialize(serializer),
      Tally::Examples { paths, .. } => sorted(paths).serialize(serializer),
    }
  }
}
