use std::any::Any;

use super::fixtures::{Node, node_materializer};
use crate::{
    DecodeError, EntityTypeId, Error, Expected, SyntaxError, SyntaxErrorKind, TokenKind,
    chunk_utils::ChunkedReader,
};

fn read(doc: &str) -> Result<Node, Error> {
    node_materializer(4096).from_slice(doc.as_bytes())
}

#[test]
fn root_must_be_an_object() {
    for (doc, found) in [
        ("[1]", TokenKind::StartArray),
        ("1", TokenKind::Number),
        ("null", TokenKind::Null),
    ] {
        let err = read(doc).unwrap_err();
        assert!(
            matches!(
                err,
                Error::Decode(DecodeError::UnexpectedToken { expected: "object", found: f }) if f == found
            ),
            "{doc}: {err:?}"
        );
    }
}

#[test]
fn empty_input_is_a_syntax_error() {
    let err = read("  ").unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEndOfInput {
                expected: Expected::Value
            },
            offset: 2,
        })
    ));
}

#[test]
fn trailing_content_is_a_syntax_error() {
    let err = read(r#"{"Count":1} {}"#).unwrap_err();
    assert_eq!(err.offset(), Some(12));
    assert!(matches!(err, Error::Syntax(_)));
}

#[test]
fn wrong_shapes_name_the_field() {
    let cases = [
        (r#"{"Count":"3"}"#, "Count"),
        (r#"{"Count":1.5}"#, "Count"),
        (r#"{"Tags":"a"}"#, "Tags"),
        (r#"{"Tags":[1]}"#, "Tags"),
        (r#"{"Child":5}"#, "Child"),
        (r#"{"Children":{}}"#, "Children"),
        (r#"{"Children":[1]}"#, "Children"),
        (r#"{"Child":{"Tags":[null]}}"#, "Tags"),
    ];
    for (doc, name) in cases {
        match read(doc) {
            Err(Error::SchemaMismatch { entity, field, .. }) => {
                assert!(entity.ends_with("Node"), "{doc}: {entity}");
                assert_eq!(&*field, name, "{doc}");
            }
            other => panic!("{doc}: {other:?}"),
        }
    }
}

#[test]
fn null_containers_keep_defaults() {
    let node = read(r#"{"Tags":null,"Child":null,"Children":null,"Count":7}"#).unwrap();
    assert_eq!(
        node,
        Node {
            count: 7,
            ..Node::default()
        }
    );
}

#[test]
fn repeated_members_apply_in_order() {
    let node = read(r#"{"Count":1,"Tags":["a"],"Count":2,"Tags":["b"]}"#).unwrap();
    assert_eq!(node.count, 2);
    assert_eq!(node.tags, ["a", "b"]);
}

#[test]
fn escaped_member_names_match_any_field() {
    // Escapes in the last declared field, an unknown member and a nested frame.
    let doc = "{\"\\u0043hildren\":[{\"C\\u006funt\":2}],\"\\u0058\":[1],\"Count\":1}";
    let node = read(doc).unwrap();
    assert_eq!(node.count, 1);
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].count, 2);
}

#[test]
fn syntax_errors_inside_nested_frames_propagate() {
    let err = read(r#"{"Child":{"Children":[{"Count":01}]}}"#).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert_eq!(err.offset(), Some(32));
}

#[test]
fn depth_limit_applies_to_skipped_members() {
    let mut doc = String::from(r#"{"Unknown":"#);
    doc.push_str(&"[".repeat(100));
    doc.push_str(&"]".repeat(100));
    doc.push('}');
    let err = read(&doc).unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(SyntaxError {
            kind: SyntaxErrorKind::DepthLimitExceeded(64),
            ..
        })
    ));
}

#[test]
fn materialize_any_returns_the_entity_type() {
    let mut materializer = node_materializer(1);
    let value: Box<dyn Any> = materializer
        .materialize_any(
            EntityTypeId::of::<Node>(),
            crate::Source::reader(ChunkedReader::new(r#"{"Count":4}"#, 1)),
        )
        .unwrap();
    assert_eq!(value.downcast::<Node>().unwrap().count, 4);
}
