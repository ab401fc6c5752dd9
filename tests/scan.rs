//! End to end through the library: lines in, json document out.

use std::sync::atomic::AtomicBool;

use ldvals::aggregate::{Mode, Tally};
use ldvals::filter::Filter;
use ldvals::finder::Finder;
use ldvals::output::Flush;
use ldvals::pipeline::{scan, ScanError, ScanOptions};
use ldvals::record::Fields;

use serde_json::{json, Value};

const TWO_RECORDS : &str = r#"{"@graph":[{"@id":"/rec/1"},{"foo":"bar"}]}
{"@graph":[{"@id":"/rec/2"},{"foo":"baz"}]}
"#;

fn run(input : &str, finder : &Finder, mode : Mode, options : &ScanOptions) -> (Value, Result<ldvals::pipeline::Summary, ScanError>) {
  let mut out = vec![];
  let result = {
    let mut flush = Flush::new(Tally::new(mode), &mut out, true);
    let result = scan(input.as_bytes(), flush.tally_mut(), finder, &Fields::default(), options, &AtomicBool::new(false));
    flush.finish().unwrap();
    result
  };
  (serde_json::from_slice(&out).unwrap(), result)
}

fn options() -> ScanOptions {
  ScanOptions { jobs: 2, chunk_size: 1, ..ScanOptions::default() }
}

#[test]
fn count_mode() {
  let (out, result) = run(TWO_RECORDS, &Finder::new(["foo"]), Mode::Count, &options());
  assert_eq!(out, json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
  assert_eq!(result.unwrap().records, 2);
}

#[test]
fn filtered() {
  let finder = Finder::new(["foo"]).with_predicate(Filter::compile("v != 'baz'").unwrap());
  let (out, _) = run(TWO_RECORDS, &finder, Mode::Count, &options());
  assert_eq!(out, json!({"instanceOf.foo": {"bar": 1}}));
}

#[test]
fn example_mode() {
  let input = (1..=5)
    .map(|i| format!(r#"{{"@graph":[{{"@id":"https://example.org/{i}"}},{{"@type":"Instance","lang":{{"code":"swe"}}}}]}}"#))
    .collect::<Vec<_>>()
    .join("\n");
  let finder = Finder::new(["code"]).by_type("@type");
  let (out, _) = run(&input, &finder, Mode::Examples(2), &options());
  let examples = out["instanceOf[Instance].lang.code"]["swe"].as_array().unwrap();
  assert_eq!(examples.len(), 3);
  assert_eq!(examples[2], json!("..."));
}

#[test]
fn libris_like_record() {
  let line = json!({"@graph": [
    {"@id": "https://libris.kb.se/fxql7jqr38b1dkf#record", "@type": "Record"},
    {"@id": "https://libris.kb.se/fxql7jqr38b1dkf#it", "@type": "Print",
     "instanceOf": {"@type": "Text",
       "subject": [{"@type": "Topic", "prefLabel": "Fåglar"}, {"@type": "Place", "prefLabel": "Sverige"}],
       "language": [{"@id": "https://id.kb.se/language/swe"}]},
     "identifiedBy": [{"@type": "ISBN", "value": "9789113084633"}]},
    {"@id": "https://libris.kb.se/x#item", "@type": "Item", "heldBy": {"@id": "https://libris.kb.se/library/S"}}
  ]}).to_string();

  let finder = Finder::new(["prefLabel", "heldBy"]).by_type("@type");
  let (out, _) = run(&line, &finder, Mode::Count, &options());
  assert_eq!(out, json!({
    "instanceOf[Print].instanceOf[Text].subject[Topic].prefLabel": {"Fåglar": 1},
    "instanceOf[Print].instanceOf[Text].subject[Place].prefLabel": {"Sverige": 1},
    "[Item].heldBy": {r#"{"@id":"https://libris.kb.se/library/S"}"#: 1},
  }));
}

#[test]
fn bad_records_skipped() {
  let input = format!("{TWO_RECORDS}{{\"@graph\":[]}}\n{{\"nograph\":1}}\n[[[\n");
  let (out, result) = run(&input, &Finder::new(["foo"]), Mode::Count, &options());
  assert_eq!(out, json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
  assert_eq!(result.unwrap().rejected, 3);
}

#[test]
fn strict_still_writes() {
  let input = format!("{TWO_RECORDS}{{\"@graph\":[]}}\n");
  let strict = ScanOptions { jobs: 1, chunk_size: 1, strict: true, progress: false };
  let (out, result) = run(&input, &Finder::new(["foo"]), Mode::Count, &strict);
  assert!(matches!(result, Err(ScanError::Rejected { line: 3, .. })));
  assert_eq!(out, json!({"instanceOf.foo": {"bar": 1, "baz": 1}}));
}

#[test]
fn nothing_found() {
  let (out, result) = run(TWO_RECORDS, &Finder::new(["nope"]), Mode::Count, &options());
  assert_eq!(out, json!({}));
  assert_eq!(result.unwrap().lines, 2);
}
