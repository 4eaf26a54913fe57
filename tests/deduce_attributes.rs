use deduce_rs::{
    BindError, DeduceError, FunctionCall, Range, Signature, ValidationError, alias,
    call_deduced, collect_deduced, deduce, registry,
};
use serde_json::{Value, json};

#[alias("shout")]
fn shout(value: Value) -> Result<Value, ValidationError> {
    value
        .as_str()
        .map(|s| json!(s.to_uppercase()))
        .ok_or_else(|| ValidationError::new("expected a string"))
}

#[deduce]
/// Adds two integers
fn add(x: i64, y: i64) -> i64 {
    x + y
}

#[deduce]
/// Greets someone loudly
fn greet(
    #[convert(alias = "shout")] name: String,
    #[convert(default = "!")] suffix: String,
) -> String {
    format!("HELLO {name}{suffix}")
}

#[deduce]
fn label(name: String, count: Option<u32>) -> String {
    match count {
        Some(count) => format!("{name} x{count}"),
        None => name,
    }
}

#[deduce]
fn level(#[convert(with = Range::new(1, 10))] level: i64, #[convert(skip)] raw: Value) -> Value {
    json!({ "level": level, "raw": raw })
}

#[deduce]
fn bounded(#[convert(with = Range::new(1, 10))] level: Option<i64>) -> String {
    match level {
        Some(level) => format!("level {level}"),
        None => "unset".to_string(),
    }
}

#[deduce]
fn toggle(enabled: bool) -> bool {
    !enabled
}

fn call(name: &str, arguments: Value) -> Result<Value, DeduceError> {
    collect_deduced().call(FunctionCall::new(name, arguments))
}

fn failed_params(err: DeduceError) -> Vec<String> {
    err.as_conversion()
        .unwrap_or_else(|| panic!("expected a conversion error, got {err}"))
        .errors()
        .keys()
        .cloned()
        .collect()
}

#[test]
fn deduced_functions_are_collected() {
    let collection = collect_deduced();
    for name in ["add", "greet", "label", "level", "bounded", "toggle"] {
        assert!(collection.get(name).is_some(), "{name} should be registered");
    }

    let descriptions: Vec<_> = collection.descriptions().collect();
    assert!(descriptions.contains(&("add", "Adds two integers")));
    assert!(descriptions.contains(&("greet", "Greets someone loudly")));
}

#[test]
fn arguments_are_converted_before_the_call() {
    assert_eq!(call("add", json!(["1", "2"])).unwrap(), json!(3));
    assert_eq!(call("add", json!({ "x": 40, "y": "2" })).unwrap(), json!(42));
    assert_eq!(call("toggle", json!(["no"])).unwrap(), json!(true));
}

#[test]
fn the_function_itself_is_unchanged() {
    assert_eq!(add(1, 2), 3);
    assert_eq!(greet("ada".into(), "?".into()), "HELLO ada?");
    assert_eq!(shout(json!("hi")).unwrap(), json!("HI"));
}

#[test]
fn all_failing_parameters_are_reported() {
    assert_eq!(failed_params(call("add", json!(["foo", "2"])).unwrap_err()), ["x"]);
    assert_eq!(
        failed_params(call("add", json!(["foo", "bar"])).unwrap_err()),
        ["x", "y"]
    );
}

#[test]
fn aliases_registered_by_attribute_are_used() {
    assert!(registry::retrieve("shout").into_converter().is_some());

    assert_eq!(call("greet", json!({ "name": "ada" })).unwrap(), json!("HELLO ADA!"));
    assert_eq!(call("greet", json!(["bo", "?"])).unwrap(), json!("HELLO BO?"));
    assert_eq!(failed_params(call("greet", json!([42])).unwrap_err()), ["name"]);
}

#[test]
fn optional_parameters_default_to_none() {
    assert_eq!(call("label", json!(["box"])).unwrap(), json!("box"));
    assert_eq!(call("label", json!(["box", "3"])).unwrap(), json!("box x3"));
    assert_eq!(call("label", json!(["box", null])).unwrap(), json!("box"));
}

#[test]
fn explicit_converters_and_skipped_parameters() {
    assert_eq!(
        call("level", json!([5, { "any": ["thing"] }])).unwrap(),
        json!({ "level": 5, "raw": { "any": ["thing"] } })
    );

    let err = call("level", json!([11, null])).unwrap_err();
    assert_eq!(
        err.as_conversion().unwrap().get("level"),
        Some("'11' is not within [1, 10]")
    );
}

#[test]
fn explicit_converters_on_optional_parameters_accept_none() {
    assert_eq!(call("bounded", json!([])).unwrap(), json!("unset"));
    assert_eq!(call("bounded", json!([null])).unwrap(), json!("unset"));
    assert_eq!(call("bounded", json!([4])).unwrap(), json!("level 4"));
    assert_eq!(failed_params(call("bounded", json!([12])).unwrap_err()), ["level"]);
}

#[test]
fn call_deduced_reuses_one_collection() {
    for _ in 0..3 {
        assert_eq!(call_deduced("add", json!(["20", 22])).unwrap(), json!(42));
    }
    assert_eq!(call_deduced("bounded", json!([])).unwrap(), json!("unset"));
    assert!(matches!(
        call_deduced("missing", json!([])).unwrap_err(),
        DeduceError::FunctionNotFound { .. }
    ));
}

#[test]
fn usage_errors_are_not_conversion_errors() {
    let err = call("add", json!(["1"])).unwrap_err();
    assert!(matches!(
        err,
        DeduceError::Bind(BindError::MissingArguments { .. })
    ));

    let err = call("missing", json!([])).unwrap_err();
    assert!(matches!(err, DeduceError::FunctionNotFound { .. }));
}

#[test]
fn attribute_and_runtime_wrapping_agree() {
    let sig = Signature::new()
        .required("x", "i64")
        .required("y", "i64");
    let runtime = deduce(sig, |b| {
        json!(b.get::<i64>("x").unwrap_or_default() + b.get::<i64>("y").unwrap_or_default())
    })
    .unwrap();

    for args in [json!(["1", "2"]), json!([3, "4"]), json!({ "y": 1, "x": "-1" })] {
        assert_eq!(runtime.call_json(args.clone()).unwrap(), call("add", args).unwrap());
    }

    let attr_err = call("add", json!(["a", "b"])).unwrap_err();
    let runtime_err = runtime.call_json(json!(["a", "b"])).unwrap_err();
    assert_eq!(attr_err.as_conversion(), runtime_err.as_conversion());
}
