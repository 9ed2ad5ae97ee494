#![no_main]
use std::cell::RefCell;

use arbitrary::Arbitrary;
use jsonmold::{
    EntitySchema, Materializer, ReaderOptions, Registry, Value,
    chunk_utils::{PlannedReader, split_by_plan},
    decode,
};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::{Map, Value as JsonValue};

const HEADER: usize = 5; // 1 capacity byte + 4-byte split seed

/// Member names the generated documents draw from, so that a good share of
/// members hit the schema instead of being skipped.
const NAMES: &[&str] = &["name", "count", "tags", "child", "items", "extra", "other"];

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

#[derive(Debug, Default, PartialEq)]
struct Record {
    name: Option<String>,
    count: Option<f64>,
    tags: Vec<String>,
    child: Option<Box<Record>>,
    items: Vec<Record>,
    extra: Value,
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_schema(
        EntitySchema::builder::<Record>()
            .scalar("name", decode::NULLABLE_STRING, |r, v| r.name = v)
            .scalar("count", decode::NULLABLE_F64, |r, v| r.count = v)
            .scalar_array("tags", decode::STRING, |r, v| r.tags.push(v))
            .nested("child", |r, v: Record| r.child = Some(Box::new(v)))
            .nested_array("items", |r, v| r.items.push(v))
            .scalar("extra", jsonmold::VALUE, |r, v| r.extra = v)
            .build()
            .unwrap(),
    );
    registry
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[0] = with_rng(|rng| rng.next_u32() as u8);
        data[1..5].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let limit = max_size - HEADER;
        HEADER + append_record(&mut data[HEADER..], size.max(16), limit)
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

fn append_record(data: &mut [u8], size: usize, limit: usize) -> usize {
    let record = loop {
        let len = with_rng(|rng| rng.random_range(size / 2..size * 2));
        let bytes: Vec<u8> = with_rng(|rng| (0..len).map(|_| rng.random::<u8>()).collect());
        if let Ok(ArbitraryObject(record)) =
            ArbitraryObject::arbitrary(&mut arbitrary::Unstructured::new(&bytes))
        {
            break record;
        }
    };

    let serialized = serde_json::to_vec(&record).expect("Failed to serialize arbitrary value");
    let len = serialized.len().min(limit);
    data[..len].copy_from_slice(&serialized[..len]);
    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug)]
struct ArbitraryValue(JsonValue);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(16)? {
            0 => JsonValue::Null,
            1 => JsonValue::Bool(u.arbitrary()?),
            2..=4 => {
                let n: f64 = u.arbitrary()?;
                JsonValue::Number(
                    serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?,
                )
            }
            5..=9 => JsonValue::String(u.arbitrary()?),
            10..=12 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                JsonValue::Array(elems.into_iter().map(|v| v.0).collect())
            }
            _ => ArbitraryObject::arbitrary(u)?.0,
        };
        Ok(ArbitraryValue(value))
    }
}

/// An object whose keys mostly come from [`NAMES`].
struct ArbitraryObject(JsonValue);

impl<'a> Arbitrary<'a> for ArbitraryObject {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let len = u.choose_index(6)?;
        let mut map = Map::new();
        for _ in 0..len {
            let key = match u.choose_index(NAMES.len() + 1)? {
                i if i < NAMES.len() => NAMES[i].to_string(),
                _ => u.arbitrary()?,
            };
            map.insert(key, ArbitraryValue::arbitrary(u)?.0);
        }
        Ok(ArbitraryObject(JsonValue::Object(map)))
    }
}

thread_local! {
    static MATERIALIZERS: RefCell<(Materializer, Materializer)> = RefCell::new((
        Materializer::new(registry()),
        Materializer::new(registry()),
    ));
}

/// Materializes the document from one slice and from a reader that delivers
/// it in seed-derived pieces; both must agree, including on errors.
fn materialize(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }

    let capacity = usize::from(data[0] % 32);
    let seed = u32::from_le_bytes(data[1..5].try_into().unwrap()) as usize;
    let doc = &data[HEADER..];

    let splits: Vec<usize> = (0..doc.len()).map(|i| seed.rotate_left(i as u32 % 32)).collect();
    let pieces = split_by_plan(doc, &splits);

    MATERIALIZERS.with(|cell| {
        let (whole, chunked) = &mut *cell.borrow_mut();
        let expected = whole.from_slice::<Record>(doc);

        let mut options = ReaderOptions::default();
        options.buffer_capacity = capacity;
        let mut fresh = Materializer::with_options(registry(), options);
        let actual = fresh.from_reader::<Record>(PlannedReader::new(pieces.iter().copied()));
        let again = chunked.from_reader::<Record>(PlannedReader::new(pieces));

        match (&expected, &actual, &again) {
            (Ok(a), Ok(b), Ok(c)) => assert!(a == b && b == c, "{a:?} != {b:?} != {c:?}"),
            (Err(a), Err(b), Err(c)) => {
                let (a, b, c) = (a.to_string(), b.to_string(), c.to_string());
                assert!(a == b && b == c, "{a} / {b} / {c}");
            }
            _ => panic!("slice and reader disagree: {expected:?} vs {actual:?} vs {again:?}"),
        }
    });
}

fuzz_target!(|data: &[u8]| materialize(data));
