/*!
This is the trail built up while searching a graph, ie an ordered set of steps,
where each step is a key name, optionally qualified with the type of the node
found under that key.

Sequences never show up in a trail, they're transparent.

It must be optimised for add the last element, and cloning should be cheap,
because every candidate gets its own copy of the trail.

`rpds::Vector` meets those requirements.
*/

/// Separator between steps when a trail is flattened into an aggregation key.
pub const SEPARATOR : &str = ".";

/// One step in the path, which is either a bare key name, or a key name
/// annotated with the declared type of the node it leads to, ie `key[Type]`.
#[derive(Debug,Clone,Ord,PartialEq,Eq,PartialOrd,Hash)]
pub enum Step {
  Key(String),
  Typed(String, String),
}

impl Step {
  /// The step for `key` leading to `node`.
  ///
  /// When `type_key` is given and `node` is an object carrying that field,
  /// the step is annotated with its value.
  pub fn label<K>(key : K, node : &serde_json::Value, type_key : Option<&str>) -> Self
  where K : Into<String>
  {
    let type_value = match (type_key, node) {
      (Some(type_key), serde_json::Value::Object(object)) => object.get(type_key),
      _ => None,
    };

    match type_value {
      Some(serde_json::Value::String(kind)) => Step::Typed(key.into(), kind.clone()),
      // lists of types and other oddities
      Some(other) => Step::Typed(key.into(), other.to_string()),
      None => Step::Key(key.into()),
    }
  }
}

impl std::fmt::Display for Step {
  fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
    match &self {
      Step::Key(k) => write!(f, "{k}"),
      Step::Typed(k, t) => write!(f, "{k}[{t}]"),
    }
  }
}

// These are all effectively AsRef
// But E0119 prevents implementing them using a trait.
impl From<&str> for Step {
  fn from(s: &str) -> Self { Self::Key(s.into()) }
}

impl From<String> for Step {
  fn from(s: String) -> Self { Self::Key(s) }
}

impl From<&String> for Step {
  fn from(s: &String) -> Self { Self::Key(s.into()) }
}

// https://docs.rs/rpds/latest/rpds/vector/struct.Vector.html
pub type JsonPath = rpds::Vector<Step>;

/// Flatten a trail into its aggregation key, eg `instanceOf.subject.code`.
///
/// Two trails with the same steps always give the same key.
pub fn joined(path : &JsonPath) -> String {
  path
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<String>>()
    .join(SEPARATOR)
}

/// The trail as a list of labels, which is how filter expressions see it.
pub fn labels(path : &JsonPath) -> Vec<String> {
  path.iter().map(ToString::to_string).collect()
}
