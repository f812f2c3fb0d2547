use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use skills_rs::{
    Describe, DecodeErrorKind, ErrorKind, FunctionDescriptor, FunctionOptions, FunctionSet,
    FunctionCall, Skill, TypeDescriptor, UnsupportedKind, describe,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Describe)]
#[serde(rename_all = "snake_case")]
/// How results are ordered
enum SortOrder {
    Relevance,
    NewestFirst,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Describe)]
/// Search the document store.
struct SearchQuery {
    /// Free text to look for
    text: String,
    /// Maximum number of hits
    #[describe(default = 10)]
    limit: u32,
    order: Option<SortOrder>,
    #[serde(rename = "tagFilter")]
    tags: Vec<String>,
}

#[derive(Debug, PartialEq, Deserialize, Describe)]
struct Meters(f64);

#[derive(Debug, PartialEq, Deserialize, Describe)]
struct Coordinates(f64, f64);

#[derive(Debug, PartialEq, Deserialize, Describe)]
struct Nothing;

#[derive(Debug, PartialEq, Serialize, Deserialize, Describe)]
enum IdOrName {
    Id(u64),
    Name(String),
}

/// Alternatives whose wire forms overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Describe)]
#[serde(rename_all = "lowercase")]
enum Filter {
    Order(SortOrder),
    Text(String),
    Count(u32),
    #[serde(rename = "fraction")]
    Ratio(f64),
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Describe)]
struct FilteredSearch {
    filters: Vec<Filter>,
    fallback: Option<Filter>,
    order: Option<SortOrder>,
}

#[derive(Debug, PartialEq, Deserialize, Describe)]
#[serde(rename_all = "camelCase")]
/// Count matching documents.
struct HitQuery {
    max_hits: u32,
    #[serde(default)]
    include_drafts: bool,
    #[serde(skip)]
    cache_key: String,
    #[serde(rename = "q")]
    query_text: String,
    r#type: Option<String>,
}

#[derive(Debug, Deserialize, Describe)]
struct Page<T> {
    items: Vec<T>,
    counts: HashMap<String, u32>,
}

#[derive(Debug, Deserialize, Describe)]
struct Tree {
    label: String,
    children: Vec<Tree>,
}

#[test]
fn test_derived_record_schema() {
    assert_eq!(
        describe::<SearchQuery>().unwrap().to_schema(),
        json!({
            "type": "object",
            "description": "Search the document store.",
            "properties": {
                "text": { "type": "string", "description": "Free text to look for" },
                "limit": { "type": "integer", "description": "Maximum number of hits" },
                "order": {
                    "anyOf": [
                        {
                            "type": "string",
                            "enum": ["Relevance", "NewestFirst"],
                            "description": "How results are ordered"
                        },
                        { "type": "null" }
                    ]
                },
                "tagFilter": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["text", "tagFilter"]
        })
    );
}

#[test]
fn test_decode_then_deserialize() {
    let descriptor = describe::<SearchQuery>().unwrap();
    let decoded = descriptor
        .decode(&json!({ "text": "rust", "order": "NewestFirst", "tagFilter": ["lang"] }))
        .unwrap();
    assert_eq!(
        decoded,
        json!({ "text": "rust", "limit": 10, "order": "newest_first", "tagFilter": ["lang"] })
    );
    let query: SearchQuery = serde_json::from_value(decoded).unwrap();
    assert_eq!(
        query,
        SearchQuery {
            text: "rust".into(),
            limit: 10,
            order: Some(SortOrder::NewestFirst),
            tags: vec!["lang".into()],
        }
    );

    let err = descriptor.decode(&json!({ "text": "rust" })).unwrap_err();
    assert_eq!(
        err.kind,
        DecodeErrorKind::MissingField {
            field: "tagFilter".into()
        }
    );
}

#[test]
fn test_struct_shapes() {
    assert_eq!(describe::<Meters>().unwrap(), TypeDescriptor::number());
    assert_eq!(
        describe::<Coordinates>().unwrap(),
        TypeDescriptor::Tuple(vec![TypeDescriptor::number(), TypeDescriptor::number()])
    );
    assert_eq!(describe::<Nothing>().unwrap(), TypeDescriptor::Null);

    let point: Coordinates = serde_json::from_value(
        describe::<Coordinates>()
            .unwrap()
            .decode(&json!([59.9, 10.7]))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(point, Coordinates(59.9, 10.7));
}

#[test]
fn test_union_enum() {
    let descriptor = describe::<IdOrName>().unwrap();
    assert_eq!(
        descriptor.to_schema(),
        json!({ "anyOf": [{ "type": "integer" }, { "type": "string" }] })
    );
    assert_eq!(descriptor.decode(&json!(7)).unwrap(), json!({ "Id": 7 }));
    let id: IdOrName = serde_json::from_value(descriptor.decode(&json!(7)).unwrap()).unwrap();
    assert_eq!(id, IdOrName::Id(7));
    let name: IdOrName =
        serde_json::from_value(descriptor.decode(&json!("seven")).unwrap()).unwrap();
    assert_eq!(name, IdOrName::Name("seven".into()));
    assert!(matches!(
        descriptor.decode(&json!(true)).unwrap_err().kind,
        DecodeErrorKind::NoMatchingAlternative { .. }
    ));
}

/// Typed value, to the JSON a model would send, and back.
fn round_trip<T>(value: &T) -> (serde_json::Value, T)
where
    T: Describe + Serialize + DeserializeOwned,
{
    let descriptor = describe::<T>().unwrap();
    let wire = descriptor
        .encode(&serde_json::to_value(value).unwrap())
        .unwrap();
    let back = serde_json::from_value(descriptor.decode(&wire).unwrap()).unwrap();
    (wire, back)
}

#[test]
fn test_enum_round_trip() {
    for order in [SortOrder::Relevance, SortOrder::NewestFirst] {
        let (wire, back) = round_trip(&order);
        assert_eq!(back, order);
        assert_eq!(wire, json!(format!("{order:?}")));
    }

    let query = SearchQuery {
        text: "rust".into(),
        limit: 3,
        order: Some(SortOrder::NewestFirst),
        tags: vec!["lang".into()],
    };
    let (wire, back) = round_trip(&query);
    assert_eq!(back, query);
    assert_eq!(wire["order"], json!("NewestFirst"));
}

#[test]
fn test_union_round_trip_with_overlapping_alternatives() {
    let cases = [
        (Filter::Order(SortOrder::NewestFirst), json!("NewestFirst")),
        // The serde form of a member is not a member name.
        (Filter::Text("newest_first".into()), json!("newest_first")),
        (Filter::Text("7".into()), json!("7")),
        (Filter::Count(7), json!(7)),
        (Filter::Ratio(2.0), json!(2.0)),
        (Filter::Ratio(0.5), json!(0.5)),
    ];
    for (filter, expected_wire) in cases {
        let (wire, back) = round_trip(&filter);
        assert_eq!(wire, expected_wire);
        assert_eq!(back, filter);
    }

    let search = FilteredSearch {
        filters: vec![
            Filter::Text("relevance".into()),
            Filter::Order(SortOrder::Relevance),
            Filter::Count(1),
        ],
        fallback: None,
        order: Some(SortOrder::Relevance),
    };
    let (wire, back) = round_trip(&search);
    assert_eq!(back, search);
    assert_eq!(
        wire,
        json!({
            "filters": ["relevance", "Relevance", 1],
            "fallback": null,
            "order": "Relevance"
        })
    );
}

#[test]
fn test_union_tags_follow_serde_renames() {
    let descriptor = describe::<Filter>().unwrap();
    assert_eq!(descriptor.label(), "order | text | count | fraction");
    assert_eq!(descriptor.decode(&json!(0.25)).unwrap(), json!({ "fraction": 0.25 }));
}

#[test]
fn test_serde_attributes_shape_the_schema() {
    assert_eq!(
        describe::<HitQuery>().unwrap().to_schema(),
        json!({
            "type": "object",
            "description": "Count matching documents.",
            "properties": {
                "maxHits": { "type": "integer" },
                "includeDrafts": { "type": "boolean" },
                "q": { "type": "string" },
                "type": { "anyOf": [{ "type": "string" }, { "type": "null" }] }
            },
            "required": ["maxHits", "q"]
        })
    );
}

#[test]
fn test_serde_attributes_in_record_functions() {
    let mut skill = Skill::new();
    skill
        .register("hits", FunctionOptions::default(), |q: HitQuery| {
            assert!(q.cache_key.is_empty());
            let kind = q.r#type.as_deref().unwrap_or("any");
            format!("{} {} {} {kind}", q.query_text, q.max_hits, q.include_drafts)
        })
        .unwrap();
    assert_eq!(
        skill.get("hits").unwrap().schema()["parameters"]["required"],
        json!(["maxHits", "q"])
    );

    let run = |arguments: &str| skill.run_function(&FunctionCall::new("hits", arguments));
    let outcome = run(r#"{"maxHits": 3, "q": "rust"}"#).unwrap();
    assert_eq!(outcome.content.as_deref(), Some(r#""rust 3 false any""#));

    let outcome = run(r#"{"maxHits": 3, "q": "rust", "includeDrafts": true, "type": "pdf"}"#).unwrap();
    assert_eq!(outcome.content.as_deref(), Some(r#""rust 3 true pdf""#));

    let err = run(r#"{"max_hits": 3, "q": "rust"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_generic_record() {
    assert_eq!(
        describe::<Page<SortOrder>>().unwrap().to_schema()["properties"],
        json!({
            "items": {
                "type": "array",
                "items": {
                    "type": "string",
                    "enum": ["Relevance", "NewestFirst"],
                    "description": "How results are ordered"
                }
            },
            "counts": { "type": "object", "additionalProperties": { "type": "integer" } }
        })
    );
}

#[test]
fn test_recursive_record_is_rejected() {
    let err = describe::<Tree>().unwrap_err();
    assert_eq!(err.kind, UnsupportedKind::RecursiveType);
}

#[test]
fn test_record_functions() {
    let mut skill = Skill::new();
    skill
        .register("search", FunctionOptions::default(), |q: SearchQuery| {
            format!("{} hits for {}", q.limit, q.text)
        })
        .unwrap();
    let search = skill.get("search").unwrap();
    assert_eq!(search.description(), Some("Search the document store."));
    assert_eq!(
        search.schema()["parameters"]["required"],
        json!(["text", "tagFilter"])
    );

    let outcome = skill
        .run_function(&FunctionCall::new(
            "search",
            r#"{"text": "rust", "tagFilter": []}"#,
        ))
        .unwrap();
    assert_eq!(outcome.content.as_deref(), Some(r#""10 hits for rust""#));

    let err = FunctionDescriptor::from_record("walk", FunctionOptions::default(), |_: Tree| ())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
}
