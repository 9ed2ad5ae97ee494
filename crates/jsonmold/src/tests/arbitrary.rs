use quickcheck::{Arbitrary, Gen};

use super::fixtures::Node;
use crate::{Array, Map, Value};

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct JsonNumber(f64);

impl Arbitrary for JsonNumber {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut value = f64::arbitrary(g);
        while !value.is_finite() {
            value = f64::arbitrary(g);
        }

        Self(value)
    }
}

impl Arbitrary for Value {
    fn arbitrary(g: &mut Gen) -> Self {
        fn gen_val(g: &mut Gen, depth: usize) -> Value {
            let choices = if depth == 0 { 4 } else { 6 };
            match usize::arbitrary(g) % choices {
                0 => Value::Null,
                1 => Value::Boolean(bool::arbitrary(g)),
                2 => Value::Number(JsonNumber::arbitrary(g).0),
                3 => Value::String(String::arbitrary(g)),
                4 => {
                    let len = usize::arbitrary(g) % 4;
                    let items: Array = (0..len).map(|_| gen_val(g, depth - 1)).collect();
                    Value::Array(items)
                }
                _ => {
                    let len = usize::arbitrary(g) % 4;
                    let mut map = Map::new();
                    for _ in 0..len {
                        map.insert(String::arbitrary(g), gen_val(g, depth - 1));
                    }
                    Value::Object(map)
                }
            }
        }

        let depth = usize::arbitrary(g) % 4;
        gen_val(g, depth)
    }
}

impl Arbitrary for Node {
    fn arbitrary(g: &mut Gen) -> Self {
        fn gen_node(g: &mut Gen, depth: usize) -> Node {
            let tags = (0..usize::arbitrary(g) % 3)
                .map(|_| String::arbitrary(g))
                .collect();
            let (child, children) = if depth == 0 {
                (None, Vec::new())
            } else {
                let child = bool::arbitrary(g).then(|| Box::new(gen_node(g, depth - 1)));
                let children = (0..usize::arbitrary(g) % 3)
                    .map(|_| gen_node(g, depth - 1))
                    .collect();
                (child, children)
            };
            Node {
                count: i32::arbitrary(g),
                tags,
                child,
                children,
            }
        }

        let depth = usize::arbitrary(g) % 4;
        gen_node(g, depth)
    }
}
