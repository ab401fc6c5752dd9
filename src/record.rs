/*!
Turns one input line into the matches found in its graph.

A line is a json document with a graph, ie an array of nodes. The first
node describes the record itself and provides the record id. Every other
node is searched, starting from a trail with a single label: `instanceOf`
for the first of them, and an empty label for the rest.
*/

use serde::Deserialize;
use serde_json::Value;

use crate::finder::Finder;
use crate::jsonpath::{JsonPath, Step};

/// Label of the start of the trail for the first node after the record node.
pub const INSTANCE_OF : &str = "instanceOf";

/// Names of the fields that give a line its structure.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct Fields {
  pub graph : String,
  pub id : String,
}

impl Default for Fields {
  fn default() -> Self {
    Self { graph: "@graph".into(), id: "@id".into() }
  }
}

#[derive(Debug,thiserror::Error)]
pub enum RecordError {
  #[error("malformed json: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("no {0} field")]
  MissingGraph(String),

  #[error("{0} is not an array")]
  GraphNotArray(String),

  #[error("{0} is empty")]
  EmptyGraph(String),

  #[error("record node has no string {0}")]
  MissingId(String),
}

/// Everything found in one line.
#[derive(Debug,Clone,PartialEq)]
pub struct Record {
  /// last segment of the record node's id
  pub id : String,
  /// joined trail and value, in search order
  pub found : Vec<(String, Value)>,
}

/// Text after the last `/`, or all of it.
pub fn short_id(id : &str) -> &str {
  match id.rsplit_once('/') {
    Some((_, last)) => last,
    None => id,
  }
}

/// Decode one document, however deeply it's nested.
///
/// serde_json stops at 128 levels by default, so the limit is lifted and the
/// stack grows on demand instead.
fn decode(line : &[u8]) -> Result<Value, serde_json::Error> {
  let mut deserializer = serde_json::Deserializer::from_slice(line);
  deserializer.disable_recursion_limit();
  let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
  deserializer.end()?;
  Ok(value)
}

/// Drop values without recursing into them.
pub fn dismantle<I : IntoIterator<Item=Value>>(values : I) {
  let mut stack = values.into_iter().collect::<Vec<Value>>();
  while let Some(value) = stack.pop() {
    match value {
      Value::Array(items) => stack.extend(items),
      Value::Object(object) => stack.extend(object.into_iter().map(|(_, value)| value)),
      _ => (),
    }
  }
}

/// Values that are dismantled rather than dropped recursively.
struct Flat<T : IntoIterator<Item=Value> + Default>(T);

impl<T : IntoIterator<Item=Value> + Default> Drop for Flat<T> {
  fn drop(&mut self) {
    dismantle(std::mem::take(&mut self.0))
  }
}

/// Starting trail for the node at `index` in the graph, not counting the record node.
fn start_trail(index : usize, node : &Value, finder : &Finder) -> JsonPath {
  let label = if index == 0 { INSTANCE_OF } else { "" };
  JsonPath::new().push_back(Step::label(label, node, finder.type_key()))
}

/// Decode one line, and search every node after the record node.
///
/// `line` is bytes rather than text, so invalid utf-8 is just another malformed record.
pub fn process_record<L : AsRef<[u8]>>(line : L, fields : &Fields, finder : &Finder) -> Result<Record, RecordError> {
  let mut document = Flat(Some(decode(line.as_ref())?));

  let nodes = match document.0.as_mut().and_then(|document| document.get_mut(&fields.graph)) {
    None => return Err(RecordError::MissingGraph(fields.graph.clone())),
    Some(Value::Array(graph)) => Flat(std::mem::take(graph)),
    Some(_) => return Err(RecordError::GraphNotArray(fields.graph.clone())),
  };
  let graph = &nodes.0;

  let Some(record_node) = graph.first() else {
    return Err(RecordError::EmptyGraph(fields.graph.clone()))
  };

  let id = match record_node.get(&fields.id) {
    Some(Value::String(id)) => short_id(id).to_string(),
    _ => return Err(RecordError::MissingId(fields.id.clone())),
  };

  let found = graph[1..]
    .iter()
    .enumerate()
    .flat_map(|(index, node)| finder.find_paths(graph, node, start_trail(index, node, finder)))
    .map(|(trail, value)| (crate::jsonpath::joined(&trail), value.clone()))
    .collect();

  Ok(Record { id, found })
}
