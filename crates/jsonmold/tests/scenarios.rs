#![expect(missing_docs)]
#![expect(clippy::needless_raw_string_hashes)]

mod common;

use std::io;

use chrono::NaiveDate;
use common::{DATE, DateDecoder, Node, node_registry, ymd};
use jsonmold::{
    ChunkBuffer, DecodeError, EntitySchema, Error, Materializer, ReaderOptions, Registry,
    SyntaxErrorKind, TokenCursor, TokenKind, chunk_utils::ChunkedReader, decode,
};
use rstest::rstest;

#[test]
fn nested_node_scenario() {
    let mut materializer = Materializer::new(node_registry());
    let doc = r#"{"Count":3,"Tags":["a","b"],"Child":{"Count":1}}"#;
    let node: Node = materializer
        .from_reader(ChunkedReader::new(doc, 1))
        .unwrap();

    insta::assert_snapshot!(format!("{node:?}"), @r#"Node { count: 3, tags: ["a", "b"], child: Some(Node { count: 1, tags: [], child: None, children: [] }), children: [] }"#);
}

#[test]
fn missing_value_reports_offset() {
    let mut materializer = Materializer::new(node_registry());
    let err = materializer
        .from_slice::<Node>(br#"{"Count":}"#)
        .unwrap_err();

    assert_eq!(err.offset(), Some(9));
    insta::assert_snapshot!(err.to_string(), @"syntax error: unexpected character '}', expected a value at byte 9");
}

#[derive(Debug, Default, PartialEq)]
struct Commit {
    comment: String,
    date: Option<NaiveDate>,
}

fn commit_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_decoder(DATE, DateDecoder)
        .register_schema(
            EntitySchema::builder::<Commit>()
                .scalar("Comment", decode::STRING, |c, v| c.comment = v)
                .scalar("Date", DATE, |c, v| c.date = Some(v))
                .build()
                .unwrap(),
        );
    registry
}

#[test]
fn custom_decoder_failure_names_the_field() {
    let mut materializer = Materializer::new(commit_registry());
    let err = materializer
        .from_slice::<Commit>(br#"{"Comment":"init","Date":"not-a-date"}"#)
        .unwrap_err();

    match &err {
        Error::SchemaMismatch {
            entity,
            field,
            source: DecodeError::InvalidValue { kind: "date", text },
        } => {
            assert!(entity.ends_with("Commit"));
            assert_eq!(&**field, "Date");
            assert_eq!(&**text, "not-a-date");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().ends_with(r#".Date: invalid date: "not-a-date""#));

    let commit: Commit = materializer
        .from_slice(br#"{"Date":"2021-03-04","Comment":"init"}"#)
        .unwrap();
    assert_eq!(commit.date, Some(ymd(2021, 3, 4)));
}

#[rstest]
#[case::february_31("2021-02-31")]
#[case::not_a_leap_year("2023-02-29")]
#[case::month_13("2021-13-01")]
fn impossible_dates_are_schema_mismatches(#[case] text: &str) {
    let mut materializer = Materializer::new(commit_registry());
    let doc = format!(r#"{{"Comment":"x","Date":"{text}"}}"#);
    let err = materializer.from_slice::<Commit>(doc.as_bytes()).unwrap_err();

    assert!(matches!(
        &err,
        Error::SchemaMismatch {
            field,
            source: DecodeError::InvalidValue { kind: "date", .. },
            ..
        } if &**field == "Date"
    ));

    let leap: Commit = materializer
        .from_slice(br#"{"Comment":"x","Date":"2024-02-29"}"#)
        .unwrap();
    assert_eq!(leap.date, Some(ymd(2024, 2, 29)));
}

#[test]
fn unknown_members_are_skipped() {
    let mut materializer = Materializer::new(node_registry());
    let plain: Node = materializer
        .from_slice(br#"{"Count":5,"Tags":["x"]}"#)
        .unwrap();
    let noisy: Node = materializer
        .from_slice(
            br#"{"Extra":1,"Count":5,"Obj":{"Count":9,"Tags":["no"]},"Tags":["x"],"Arr":[[{}],null,"s"],"Last":false}"#,
        )
        .unwrap();
    assert_eq!(plain, noisy);
}

#[test]
fn sibling_after_nested_member_reads_the_same() {
    let mut materializer = Materializer::new(node_registry());
    let without: Node = materializer
        .from_slice(br#"{"Tags":["t"],"Count":2}"#)
        .unwrap();
    let with: Node = materializer
        .from_slice(br#"{"Child":{"Count":7,"Child":{}},"Tags":["t"],"Count":2}"#)
        .unwrap();

    assert_eq!(with.count, without.count);
    assert_eq!(with.tags, without.tags);
    assert_eq!(with.child.as_ref().map(|c| c.count), Some(7));
}

#[test]
fn nested_arrays_keep_document_order() {
    let mut materializer = Materializer::new(node_registry());
    let node: Node = materializer
        .from_reader(ChunkedReader::new(
            r#"{"Children":[{"Count":1},{"Count":2,"Children":[{"Count":21},{"Count":22}]},{"Count":3}],"Count":0}"#,
            2,
        ))
        .unwrap();

    let counts: Vec<i32> = node.children.iter().map(|c| c.count).collect();
    assert_eq!(counts, [1, 2, 3]);
    let inner: Vec<i32> = node.children[1].children.iter().map(|c| c.count).collect();
    assert_eq!(inner, [21, 22]);
}

#[test]
fn self_reference_three_levels_deep() {
    let mut materializer = Materializer::new(node_registry());
    let doc = r#"{"Count":1,"Child":{"Count":2,"Child":{"Count":3,"Child":{"Tags":["leaf"]}}}}"#;
    let node: Node = materializer.from_slice(doc.as_bytes()).unwrap();

    let mut counts = Vec::new();
    let mut current = Some(&node);
    while let Some(level) = current {
        counts.push(level.count);
        current = level.child.as_deref();
    }
    assert_eq!(counts, [1, 2, 3, 0]);
    assert_eq!(materializer.compiled_len(), 1);
}

#[test]
fn escaped_member_names_match() {
    let mut materializer = Materializer::new(node_registry());
    let node: Node = materializer
        .from_slice(b"{\"\\u0043ount\":4,\"T\\u0061gs\":[\"\\u00e9\"]}")
        .unwrap();
    assert_eq!(node.count, 4);
    assert_eq!(node.tags, ["\u{e9}"]);
}

#[test]
fn reader_failures_abort_the_call() {
    struct Failing {
        sent: bool,
    }

    impl io::Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"));
            }
            self.sent = true;
            let head = br#"{"Count":1,"Ta"#;
            buf[..head.len()].copy_from_slice(head);
            Ok(head.len())
        }
    }

    let mut materializer = Materializer::new(node_registry());
    let err = materializer
        .from_reader::<Node>(Failing { sent: false })
        .unwrap_err();
    match err {
        Error::SourceRead(io) => assert_eq!(io.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn long_tokens_grow_the_buffer() {
    let long = "x".repeat(300);
    let doc = format!(r#"{{"Tags":["{long}"]}}"#);
    let options = ReaderOptions {
        buffer_capacity: 4,
        ..Default::default()
    };

    let mut buffer = ChunkBuffer::from_reader(ChunkedReader::new(doc.clone(), 64), &options);
    let mut cursor = TokenCursor::resume(&mut buffer);
    for _ in 0..4 {
        cursor.advance().unwrap();
    }
    assert_eq!(cursor.kind(), TokenKind::String);
    assert_eq!(cursor.str_value().unwrap().len(), 300);
    let buffer = cursor.capture();
    assert!(buffer.capacity() >= 302);

    let mut materializer = Materializer::with_options(node_registry(), options);
    let node: Node = materializer
        .from_reader(ChunkedReader::new(doc, 7))
        .unwrap();
    assert_eq!(node.tags, [long]);
}

#[test]
fn trailing_content_is_rejected() {
    let mut materializer = Materializer::new(node_registry());
    let err = materializer
        .from_slice::<Node>(br#"{"Count":1}{"Count":2}"#)
        .unwrap_err();
    match err {
        Error::Syntax(err) => {
            assert_eq!(err.offset, 11);
            assert!(matches!(
                err.kind,
                SyntaxErrorKind::UnexpectedCharacter { found: '{', .. }
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn dynamic_members_keep_their_shape() {
    #[derive(Debug, Default)]
    struct Envelope {
        kind: String,
        payload: jsonmold::Value,
    }

    let mut registry = Registry::new();
    registry.register_schema(
        EntitySchema::builder::<Envelope>()
            .scalar("kind", decode::STRING, |e, v| e.kind = v)
            .scalar("payload", jsonmold::VALUE, |e, v| e.payload = v)
            .build()
            .unwrap(),
    );
    let mut materializer = Materializer::new(registry);
    let envelope: Envelope = materializer
        .from_reader(ChunkedReader::new(
            r#"{"payload":{"ids":[1,2],"ok":true},"kind":"batch"}"#,
            3,
        ))
        .unwrap();

    assert_eq!(envelope.kind, "batch");
    let ids = envelope.payload.get("ids").and_then(jsonmold::Value::as_array);
    assert_eq!(ids.map(Vec::len), Some(2));
    assert_eq!(envelope.payload.get("ok").and_then(jsonmold::Value::as_bool), Some(true));
}
