use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use skills_rs::{
    Describe, ErrorKind, FunctionCall, FunctionSet, Skill, TogglableSkill, UnionSkill, function,
    registered,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Describe)]
#[serde(rename_all = "lowercase")]
/// Unit of temperature
enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    location: String,
    temperature: String,
    unit: TemperatureUnit,
}

#[function]
/// Get the current weather in a given location.
///
/// # Arguments
///
/// * `location` - The city and state, e.g. San Francisco, CA
/// * `unit` - The unit to report the temperature in
fn get_current_weather(
    location: String,
    #[param(default = TemperatureUnit::Fahrenheit)] unit: TemperatureUnit,
) -> WeatherReport {
    WeatherReport {
        location,
        temperature: "72".to_owned(),
        unit,
    }
}

#[function(serialize = false, interpret_as_response = true)]
/// Answer the user directly.
fn respond(text: String) -> String {
    text
}

#[function(save_return = false)]
/// Record a note for later.
fn take_note(note: String, tags: Option<Vec<String>>) -> usize {
    note.len() + tags.map_or(0, |t| t.len())
}

/// A reading given either as a unit or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Describe)]
enum UnitOrText {
    Unit(TemperatureUnit),
    Text(String),
}

#[function(serialize = false)]
/// Classify a reading.
fn classify(reading: UnitOrText) -> String {
    match reading {
        UnitOrText::Unit(unit) => format!("unit:{unit:?}"),
        UnitOrText::Text(text) => format!("text:{text}"),
    }
}

#[function(name = "current_time", description = "The time of day")]
/// Ignored in favour of the explicit description.
fn now() -> &'static str {
    "12:00"
}

#[test]
fn test_weather_schema() {
    let weather = registered("get_current_weather").unwrap();
    assert_eq!(
        weather.schema(),
        json!({
            "name": "get_current_weather",
            "description": "Get the current weather in a given location.",
            "parameters": {
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state, e.g. San Francisco, CA"
                    },
                    "unit": {
                        "type": "string",
                        "enum": ["Celsius", "Fahrenheit"],
                        "description": "The unit to report the temperature in"
                    }
                },
                "required": ["location"]
            }
        })
    );
}

#[test]
fn test_weather_end_to_end() {
    let skill = Skill::collect_named(["get_current_weather"]).unwrap();

    let outcome = skill
        .run_function(&FunctionCall::new(
            "get_current_weather",
            r#"{"location": "SF"}"#,
        ))
        .unwrap();
    assert!(!outcome.is_final());
    let content: Value = serde_json::from_str(outcome.content.as_deref().unwrap()).unwrap();
    assert_eq!(
        content,
        json!({ "location": "SF", "temperature": "72", "unit": "fahrenheit" })
    );

    let outcome = skill
        .run_function(&FunctionCall::new(
            "get_current_weather",
            r#"{"location": "Oslo", "unit": "Celsius"}"#,
        ))
        .unwrap();
    let content: Value = serde_json::from_str(outcome.content.as_deref().unwrap()).unwrap();
    assert_eq!(content["unit"], json!("celsius"));

    let err = skill
        .run_function(&FunctionCall::new(
            "get_current_weather",
            r#"{"location": "SF", "unit": "Kelvin"}"#,
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_collect_finds_every_function() {
    let skill = Skill::collect().unwrap();
    let mut names: Vec<_> = skill.names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        ["classify", "current_time", "get_current_weather", "respond", "take_note"]
    );
}

#[test]
fn test_attribute_options() {
    let respond = registered("respond").unwrap();
    assert!(!respond.serialize());
    let outcome = respond
        .run(&FunctionCall::new("respond", r#"{"text": "Hello there"}"#))
        .unwrap();
    assert_eq!(outcome.content.as_deref(), Some("Hello there"));
    assert!(outcome.is_final());

    let note = registered("take_note").unwrap();
    assert_eq!(note.schema()["parameters"]["required"], json!(["note"]));
    let outcome = note
        .run(&FunctionCall::new("take_note", r#"{"note": "milk"}"#))
        .unwrap();
    assert_eq!(outcome.content, None);

    let now = registered("current_time").unwrap();
    assert_eq!(now.name(), "current_time");
    assert_eq!(now.description(), Some("The time of day"));
    assert_eq!(
        now.schema()["parameters"],
        json!({ "type": "object", "properties": {}, "required": [] })
    );
    let outcome = now.run(&FunctionCall::new("current_time", "{}")).unwrap();
    assert_eq!(outcome.content.as_deref(), Some(r#""12:00""#));

    let err = registered("now").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FunctionNotFound);
}

#[test]
fn test_union_parameter_keeps_the_matched_alternative() {
    let classify = registered("classify").unwrap();
    assert_eq!(
        classify.schema()["parameters"]["properties"]["reading"],
        json!({
            "anyOf": [
                {
                    "type": "string",
                    "enum": ["Celsius", "Fahrenheit"],
                    "description": "Unit of temperature"
                },
                { "type": "string" }
            ]
        })
    );

    let run = |arguments: &str| {
        classify
            .run(&FunctionCall::new("classify", arguments))
            .unwrap()
            .content
            .unwrap()
    };
    assert_eq!(run(r#"{"reading": "Celsius"}"#), "unit:Celsius");
    // Not a member name, so the text alternative wins even though it equals
    // the serialized form of a unit.
    assert_eq!(run(r#"{"reading": "celsius"}"#), "text:celsius");
    assert_eq!(run(r#"{"reading": "Kelvin"}"#), "text:Kelvin");

    let err = classify
        .run(&FunctionCall::new("classify", r#"{"reading": 3}"#))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_composed_skills() {
    let weather = Skill::collect_named(["get_current_weather"]).unwrap();
    let notes = Skill::collect_named(["take_note"]).unwrap();

    let mut union = UnionSkill::new();
    union.add(registered("respond").unwrap()).unwrap();
    union.add_set(weather).unwrap();
    union
        .add_set(
            TogglableSkill::new("enable_notes", notes)
                .unwrap()
                .with_description("Allow taking notes"),
        )
        .unwrap();

    let names: Vec<_> = union
        .functions_schema()
        .into_iter()
        .map(|s| s["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["respond", "get_current_weather", "enable_notes"]);

    let call = FunctionCall::new("take_note", r#"{"note": "milk"}"#);
    assert_eq!(
        union.run_function(&call).unwrap_err().kind(),
        ErrorKind::FunctionNotFound
    );
    union
        .run_function(&FunctionCall::new("enable_notes", "{}"))
        .unwrap();
    assert!(union.run_function(&call).is_ok());
    assert_eq!(
        union
            .run_function(&FunctionCall::new("enable_notes", "{}"))
            .unwrap_err()
            .kind(),
        ErrorKind::FunctionNotFound
    );

    // Adding the same weather function again collides.
    let err = union.add(registered("get_current_weather").unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateFunctionName);
}

#[test]
fn test_call_requests_from_provider_json() {
    let skill = Skill::collect().unwrap();
    let call: FunctionCall = serde_json::from_value(json!({
        "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "name": "get_current_weather",
        "arguments": "{\"location\": \"Boston, MA\"}"
    }))
    .unwrap();
    let outcome = skill.run_function(&call).unwrap();
    assert_eq!(outcome.id, call.id);
    assert_eq!(outcome.name, "get_current_weather");

    let broken = FunctionCall::new("get_current_weather", "{\"location\": ");
    assert_eq!(
        skill.run_function(&broken).unwrap_err().kind(),
        ErrorKind::InvalidJson
    );
}
