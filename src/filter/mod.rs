/*!
Decides whether a candidate value found under a target key is kept.

A candidate is judged by a `Predicate`, which sees the value itself, the
whole graph it came from, and the trail leading to the key it was found
under. Predicates are plain rust callables wrapped in `FnPredicate`, or a
`Filter` compiled from the small expression language in `parse`.

Nothing is ever evaluated as code, the expression language only has
field access, comparisons, `len(...)` and boolean connectives.
*/

pub mod parse;
pub mod eval;

use serde_json::Value;

use crate::jsonpath::JsonPath;

/// Everything a predicate gets to look at.
#[derive(Debug,Clone,Copy)]
pub struct Candidate<'a> {
  /// the value found under a target key
  pub value : &'a Value,
  /// all nodes of the record
  pub graph : &'a [Value],
  /// trail to the object holding the target key
  pub trail : &'a JsonPath,
}

#[derive(Debug,thiserror::Error)]
pub enum FilterError {
  #[error("syntax error at offset {pos}: {msg}")]
  Syntax { pos : usize, msg : String },

  #[error("bad regex in filter: {0}")]
  Regex(#[from] regex::Error),

  #[error("cannot evaluate filter: {0}")]
  Eval(String),
}

/// Accept or reject a candidate. Shared by all workers, hence Send + Sync.
pub trait Predicate : Send + Sync {
  fn accept(&self, candidate : &Candidate) -> Result<bool, FilterError>;
}

/// Wraps a function or closure so it can be used as a Predicate.
pub struct FnPredicate<F>(pub F);

impl<F> Predicate for FnPredicate<F>
where F : Fn(&Value, &[Value], &JsonPath) -> bool + Send + Sync
{
  fn accept(&self, candidate : &Candidate) -> Result<bool, FilterError> {
    Ok(self.0(candidate.value, candidate.graph, candidate.trail))
  }
}

/// A filter expression, compiled once from its source text.
#[derive(Debug,Clone)]
pub struct Filter {
  source : String,
  expr : parse::Expr,
}

impl Filter {
  pub fn compile<S : AsRef<str>>(source : S) -> Result<Self, FilterError> {
    let source = source.as_ref();
    let expr = parse::parse(source)?;
    Ok(Self { source: source.to_string(), expr })
  }
}

impl Predicate for Filter {
  fn accept(&self, candidate : &Candidate) -> Result<bool, FilterError> {
    let trail = Value::Array(
      crate::jsonpath::labels(candidate.trail)
        .into_iter()
        .map(Value::String)
        .collect()
    );
    let scope = eval::Scope { v: candidate.value, graph: candidate.graph, trail: &trail };
    let result = eval::evaluate(&self.expr, &scope)?;
    Ok(result.truthy())
  }
}

impl std::fmt::Display for Filter {
  fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.source)
  }
}

#[cfg(test)]
mod test_filter {
  use super::*;
  use serde_json::json;

  fn accepts(source : &str, value : Value) -> bool {
    let graph = vec![json!({"@id": "/rec/1"}), json!({"@type": "Instance", "foo": "bar"})];
    let trail = JsonPath::new().push_back("instanceOf".into());
    let candidate = Candidate { value: &value, graph: &graph, trail: &trail };
    Filter::compile(source).unwrap().accept(&candidate).unwrap()
  }

  #[test]
  fn rejects_value() {
    assert!(accepts("v != 'baz'", json!("bar")));
    assert!(!accepts("v != 'baz'", json!("baz")));
  }

  #[test]
  fn sees_graph_and_trail() {
    assert!(accepts("graph[1]['@type'] == 'Instance'", json!(1)));
    assert!(accepts("trail[-1] == 'instanceOf'", json!(1)));
    assert!(accepts("len(graph) == 2 and len(trail) == 1", json!(1)));
  }

  #[test]
  fn closure() {
    let graph = vec![json!({"@id": "/rec/1"})];
    let trail = JsonPath::new();
    let value = json!("bar");
    let candidate = Candidate { value: &value, graph: &graph, trail: &trail };
    let predicate = FnPredicate(|v : &Value, _graph : &[Value], _trail : &JsonPath| v == "bar");
    assert!(predicate.accept(&candidate).unwrap());
  }

  #[test]
  fn syntax_error() {
    let err = Filter::compile("v ==").unwrap_err();
    assert!(matches!(err, FilterError::Syntax{..}), "{err:?}");
  }

  #[test]
  fn keeps_source() {
    let filter = Filter::compile("v == 1").unwrap();
    assert_eq!(filter.to_string(), "v == 1");
  }
}
