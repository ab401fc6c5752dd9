/*!
Searches a decoded json value for the values under a set of target keys.

The search is a depth-first, pre-order walk. Arrays are transparent, ie they
don't add a step to the trail. A value found under a target key is yielded
together with its trail and is never searched any further.

It's an explicit-stack Iterator rather than recursion, so the caller can stop
early, and deeply nested input can't blow the stack.
*/

use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::filter::{Candidate, Predicate};
use crate::filter::eval::truthy;
use crate::jsonpath::{JsonPath, Step};

/// What to look for. Built once, then shared read-only by all workers.
pub struct Finder {
  keys : FxHashSet<String>,
  // only Some when steps are annotated with types
  type_key : Option<String>,
  predicate : Option<Box<dyn Predicate>>,
}

impl Finder {
  pub fn new<I,S>(keys : I) -> Self
  where
    I : IntoIterator<Item=S>,
    S : Into<String>
  {
    Self {
      keys: keys.into_iter().map(Into::into).collect(),
      type_key: None,
      predicate: None,
    }
  }

  /// Annotate each step with the type found in `type_key` of the node it leads to.
  pub fn by_type<S : Into<String>>(mut self, type_key : S) -> Self {
    self.type_key = Some(type_key.into());
    self
  }

  /// Only yield values this predicate accepts.
  pub fn with_predicate<P : Predicate + 'static>(mut self, predicate : P) -> Self {
    self.predicate = Some(Box::new(predicate));
    self
  }

  pub fn type_key(&self) -> Option<&str> {
    self.type_key.as_deref()
  }

  pub fn is_target(&self, key : &str) -> bool {
    self.keys.contains(key)
  }

  /// key is a target, and the predicate (if any) likes the value.
  ///
  /// A predicate that fails to evaluate counts as a rejection.
  fn accepts(&self, key : &str, value : &Value, graph : &[Value], trail : &JsonPath) -> bool {
    if !self.is_target(key) { return false }
    let Some(predicate) = &self.predicate else { return true };

    match predicate.accept(&Candidate { value, graph, trail }) {
      Ok(accepted) => accepted,
      Err(err) => {
        log::debug!("rejecting {value} under {key} at '{}': {err}", crate::jsonpath::joined(trail));
        false
      }
    }
  }

  /// Lazily yield (trail, value) for everything under a target key in `data`.
  ///
  /// `graph` is only there for the predicate to look at.
  pub fn find_paths<'a>(&'a self, graph : &'a [Value], data : &'a Value, trail : JsonPath) -> Paths<'a> {
    Paths {
      finder: self,
      graph,
      stack: vec![Work::Visit(data, trail)],
    }
  }
}

enum Work<'a> {
  // search this value
  Visit(&'a Value, JsonPath),
  // one element under key, with the trail of the object holding key
  Entry(&'a str, &'a Value, JsonPath),
}

/// Iterator returned by `Finder::find_paths`.
pub struct Paths<'a> {
  finder : &'a Finder,
  graph : &'a [Value],
  stack : Vec<Work<'a>>,
}

impl<'a> Iterator for Paths<'a> {
  type Item = (JsonPath, &'a Value);

  fn next(&mut self) -> Option<Self::Item> {
    // Children are pushed in reverse so they pop off in document order.
    while let Some(work) = self.stack.pop() {
      match work {
        Work::Visit(Value::Array(items), trail) => {
          self.stack.extend(items.iter().rev().map(|item| Work::Visit(item, trail.clone())));
        }
        Work::Visit(Value::Object(object), trail) => {
          for (key, values) in object.iter().rev() {
            if !truthy(values) { continue }
            match values {
              Value::Array(items) =>
                self.stack.extend(items.iter().rev().map(|item| Work::Entry(key, item, trail.clone()))),
              value => self.stack.push(Work::Entry(key, value, trail.clone())),
            }
          }
        }
        // scalars not under a target key
        Work::Visit(_, _) => (),
        Work::Entry(key, value, trail) => {
          let subtrail = trail.push_back(Step::label(key, value, self.finder.type_key()));
          if self.finder.accepts(key, value, self.graph, &trail) {
            return Some((subtrail, value))
          }
          self.stack.push(Work::Visit(value, subtrail));
        }
      }
    }
    None
  }
}
