//! Materializes blog-post metadata from a stream that arrives a few bytes at
//! a time.
//!
//! The document mixes built-in members (numbers, strings, arrays of both)
//! with members read by custom decoders:
//!
//! * `PostedFrom` holds an IP address,
//! * `UpdatedOn` and `CommittedOn` hold `YYYY-MM-DD` dates,
//! * `Location` is a WKT point (`"POINT (x y)"`),
//! * `GeoJsonLocation` is a GeoJSON point object, decoded straight off the
//!   token stream without building an intermediate tree.
//!
//! Run with
//!
//! ```bash
//! cargo run -p jsonmold --example post_metadata
//! ```

#![allow(clippy::needless_raw_string_hashes)]

use std::net::IpAddr;

use chrono::NaiveDate;
use jsonmold::{
    DecodeError, DecoderId, EntitySchema, Error, Materializer, ReaderOptions, Registry,
    TokenCursor, TokenKind, ValueDecoder, chunk_utils::ChunkedReader, decode, decoder_fn,
};

const DOCUMENT: &str = r#"{
  "SomeInts": [0,1,2],
  "Views": 6187,
  "TopGeographies": [
    {
      "Browsers": ["Firefox", "Netscape"],
      "Count": 966,
      "Location": "POINT (109.793 43.2431)",
      "GeoJsonLocation": {
        "type": "Point",
        "coordinates": [133.793,47.2431]
      },
      "Latitude": 134.793,
      "Longitude": 35.2431
    }
  ],
  "TopSearches": [
    {
      "Count": 9647,
      "Term": "Search #1"
    }
  ],
  "Updates": [
    {
      "PostedFrom": "127.0.0.1",
      "UpdatedBy": "Admin",
      "UpdatedOn": "1998-04-16",
      "Commits": [
        {"Comment": "Commit #1", "CommittedOn": "2023-04-30"}
      ]
    },
    {
      "PostedFrom": "::1",
      "UpdatedBy": "Admin",
      "UpdatedOn": "2015-02-11",
      "Commits": [
        {"Comment": "Commit #1", "CommittedOn": "2023-04-30"},
        {"Comment": "Commit #2", "CommittedOn": "2023-05-01"}
      ]
    }
  ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Default)]
struct PostMetadata {
    views: i32,
    some_ints: Vec<i32>,
    top_geographies: Vec<Geography>,
    top_searches: Vec<SearchTerm>,
    updates: Vec<PostUpdate>,
}

#[derive(Debug, Default)]
struct Geography {
    browsers: Vec<String>,
    count: i32,
    location: Point,
    geo_json_location: Point,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Default)]
struct SearchTerm {
    term: String,
    count: i32,
}

#[derive(Debug, Default)]
struct PostUpdate {
    posted_from: Option<IpAddr>,
    updated_by: String,
    updated_on: Option<NaiveDate>,
    commits: Vec<Commit>,
}

#[derive(Debug, Default)]
struct Commit {
    comment: String,
    committed_on: Option<NaiveDate>,
}

const IP: DecoderId<IpAddr> = DecoderId::new("ip");
const DATE: DecoderId<NaiveDate> = DecoderId::new("date");
const WKT_POINT: DecoderId<Point> = DecoderId::new("wkt-point");
const GEOJSON_POINT: DecoderId<Point> = DecoderId::new("geojson-point");

fn invalid(kind: &'static str, text: &str) -> Error {
    DecodeError::InvalidValue {
        kind,
        text: text.into(),
    }
    .into()
}

fn parse_wkt_point(text: &str) -> Option<Point> {
    let inner = text.trim().strip_prefix("POINT")?.trim();
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?;
    let mut coords = inner.split_whitespace().map(str::parse::<f64>);
    let point = Point {
        x: coords.next()?.ok()?,
        y: coords.next()?.ok()?,
    };
    coords.next().is_none().then_some(point)
}

/// Reads `{"type":"Point","coordinates":[x,y]}` token by token, finishing on
/// the object's closing brace.
struct GeoJsonPointDecoder;

impl ValueDecoder for GeoJsonPointDecoder {
    type Output = Point;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Point, Error> {
        cursor.expect(TokenKind::StartObject, "GeoJSON object")?;
        let mut kind = None;
        let mut coordinates = Vec::with_capacity(2);
        loop {
            match cursor.advance()? {
                TokenKind::EndObject => break,
                TokenKind::PropertyName if cursor.value_text_equals(b"type") => {
                    cursor.advance()?;
                    cursor.expect(TokenKind::String, "geometry type")?;
                    kind = Some(cursor.str_value()?.into_owned());
                }
                TokenKind::PropertyName if cursor.value_text_equals(b"coordinates") => {
                    cursor.advance()?;
                    cursor.expect(TokenKind::StartArray, "coordinate array")?;
                    while cursor.advance()? != TokenKind::EndArray {
                        coordinates.push(cursor.number_value::<f64>("f64")?);
                    }
                }
                _ => cursor.skip_value()?,
            }
        }

        match (kind.as_deref(), coordinates.as_slice()) {
            (Some("Point"), &[x, y]) => Ok(Point { x, y }),
            (Some("Point"), _) => Err(DecodeError::custom("a point has exactly two coordinates").into()),
            (Some(other), _) => Err(invalid("GeoJSON point", other)),
            (None, _) => Err(DecodeError::MissingMember("type").into()),
        }
    }
}

fn registry() -> Result<Registry, Error> {
    let mut registry = Registry::new();
    registry
        .register_decoder(
            IP,
            decoder_fn(|cursor| {
                cursor.expect(TokenKind::String, "IP address")?;
                let text = cursor.str_value()?;
                text.parse().map_err(|_| invalid("IP address", &text))
            }),
        )
        .register_decoder(
            DATE,
            decoder_fn(|cursor| {
                cursor.expect(TokenKind::String, "date")?;
                let text = cursor.str_value()?;
                NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| invalid("date", &text))
            }),
        )
        .register_decoder(
            WKT_POINT,
            decoder_fn(|cursor| {
                cursor.expect(TokenKind::String, "WKT point")?;
                let text = cursor.str_value()?;
                parse_wkt_point(&text).ok_or_else(|| invalid("WKT point", &text))
            }),
        )
        .register_decoder(GEOJSON_POINT, GeoJsonPointDecoder);

    registry
        .register_schema(
            EntitySchema::builder::<PostMetadata>()
                .scalar("Views", decode::I32, |p, v| p.views = v)
                .scalar_array("SomeInts", decode::I32, |p, v| p.some_ints.push(v))
                .nested_array("TopGeographies", |p, v| p.top_geographies.push(v))
                .nested_array("TopSearches", |p, v| p.top_searches.push(v))
                .nested_array("Updates", |p, v| p.updates.push(v))
                .build()?,
        )
        .register_schema(
            EntitySchema::builder::<Geography>()
                .scalar_array("Browsers", decode::STRING, |g, v| g.browsers.push(v))
                .scalar("Count", decode::I32, |g, v| g.count = v)
                .scalar("Location", WKT_POINT, |g, v| g.location = v)
                .scalar("GeoJsonLocation", GEOJSON_POINT, |g, v| g.geo_json_location = v)
                .scalar("Latitude", decode::F64, |g, v| g.latitude = v)
                .scalar("Longitude", decode::F64, |g, v| g.longitude = v)
                .build()?,
        )
        .register_schema(
            EntitySchema::builder::<SearchTerm>()
                .scalar("Term", decode::STRING, |s, v| s.term = v)
                .scalar("Count", decode::I32, |s, v| s.count = v)
                .build()?,
        )
        .register_schema(
            EntitySchema::builder::<PostUpdate>()
                .scalar("PostedFrom", IP, |u, v| u.posted_from = Some(v))
                .scalar("UpdatedBy", decode::STRING, |u, v| u.updated_by = v)
                .scalar("UpdatedOn", DATE, |u, v| u.updated_on = Some(v))
                .nested_array("Commits", |u, v| u.commits.push(v))
                .build()?,
        )
        .register_schema(
            EntitySchema::builder::<Commit>()
                .scalar("Comment", decode::STRING, |c, v| c.comment = v)
                .scalar("CommittedOn", DATE, |c, v| c.committed_on = Some(v))
                .build()?,
        );
    Ok(registry)
}

fn main() -> Result<(), Error> {
    let options = ReaderOptions {
        buffer_capacity: 16,
        ..Default::default()
    };
    let mut materializer = Materializer::with_options(registry()?, options);
    let post: PostMetadata = materializer.from_reader(ChunkedReader::new(DOCUMENT, 5))?;

    println!("PostMetadata:");
    println!("  Views: {}", post.views);
    println!("  SomeInts: {:?}", post.some_ints);
    for (i, geography) in post.top_geographies.iter().enumerate() {
        println!("  Geography {i}:");
        println!("    Count: {}", geography.count);
        println!("    Location: {:?}", geography.location);
        println!("    GeoJsonLocation: {:?}", geography.geo_json_location);
        println!("    Lat/Long: {}, {}", geography.latitude, geography.longitude);
        println!("    Browsers: {}", geography.browsers.join(", "));
    }
    for (i, search) in post.top_searches.iter().enumerate() {
        println!("  Search {i}: {:?} x{}", search.term, search.count);
    }
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    for (i, update) in post.updates.iter().enumerate() {
        let from = show(update.posted_from.map(|ip| ip.to_string()));
        let on = show(update.updated_on.map(|date| date.to_string()));
        println!("  Update {i}: by {} on {on} from {from}", update.updated_by);
        for commit in &update.commits {
            let on = show(commit.committed_on.map(|date| date.to_string()));
            println!("    {} ({on})", commit.comment);
        }
    }
    println!("  compiled procedures: {}", materializer.compiled_len());
    Ok(())
}
