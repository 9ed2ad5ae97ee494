#![allow(missing_docs)]
#![allow(dead_code)]

use chrono::NaiveDate;
use jsonmold::{
    DecodeError, DecoderId, EntitySchema, Error, Registry, TokenCursor, TokenKind, ValueDecoder,
    decode,
};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Node {
    #[serde(rename = "Count")]
    pub count: i32,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Child", skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<Node>>,
    #[serde(rename = "Children", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

pub fn node_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_schema(
        EntitySchema::builder::<Node>()
            .scalar("Count", decode::I32, |n, v| n.count = v)
            .scalar_array("Tags", decode::STRING, |n, v| n.tags.push(v))
            .nested("Child", |n, v: Node| n.child = Some(Box::new(v)))
            .nested_array("Children", |n, v: Node| n.children.push(v))
            .build()
            .unwrap(),
    );
    registry
}

/// Calendar dates in `YYYY-MM-DD` form.
pub const DATE: DecoderId<NaiveDate> = DecoderId::new("date");

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub struct DateDecoder;

impl ValueDecoder for DateDecoder {
    type Output = NaiveDate;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<NaiveDate, Error> {
        cursor.expect(TokenKind::String, "date string")?;
        let text = cursor.str_value()?;
        NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
            DecodeError::InvalidValue {
                kind: "date",
                text: text.as_ref().into(),
            }
            .into()
        })
    }
}
