use serde::Serialize;

use crate::{EntitySchema, Materializer, ReaderOptions, Registry, decode};

/// A self-referential entity with one member of every kind.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct Node {
    #[serde(rename = "Count")]
    pub(crate) count: i32,
    #[serde(rename = "Tags")]
    pub(crate) tags: Vec<String>,
    #[serde(rename = "Child")]
    pub(crate) child: Option<Box<Node>>,
    #[serde(rename = "Children")]
    pub(crate) children: Vec<Node>,
}

pub(crate) fn node_schema() -> EntitySchema {
    EntitySchema::builder::<Node>()
        .scalar("Count", decode::I32, |n, v| n.count = v)
        .scalar_array("Tags", decode::STRING, |n, v| n.tags.push(v))
        .nested("Child", |n, v: Node| n.child = Some(Box::new(v)))
        .nested_array("Children", |n, v: Node| n.children.push(v))
        .build()
        .unwrap()
}

pub(crate) fn node_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_schema(node_schema());
    registry
}

pub(crate) fn node_materializer(buffer_capacity: usize) -> Materializer {
    Materializer::with_options(
        node_registry(),
        ReaderOptions {
            buffer_capacity,
            ..Default::default()
        },
    )
}
