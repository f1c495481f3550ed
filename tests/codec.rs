use api_typegraph::{
    AdditionalFieldsSchema, CodecHooks, CodecOptions, ComplexSchema, Document, DocumentFactory,
    DocumentInit, EnumSchema, FieldSchema, MappedSchema, PartialRule, Partiality, SimpleSchema,
    TypeSchema, TypeSource, UnionSchema,
};
use serde_json::{Value, json};

fn build(types: Vec<TypeSchema>) -> Document {
    DocumentFactory::new()
        .create_document(DocumentInit::new().with_types(types))
        .expect("document builds")
}

fn decode(document: &Document, name: &str, options: CodecOptions, value: Value) -> Result<Value, Vec<String>> {
    document
        .codec_for(name, options)
        .expect("codec generates")
        .apply(&value)
        .map_err(|error| error.issues.iter().map(ToString::to_string).collect())
}

fn customer_document() -> Document {
    build(vec![
        EnumSchema::named("Tier").value("gold").aliased("silver", "second").into(),
        ComplexSchema::named("Address")
            .field("city", FieldSchema::of("string").required())
            .field("zip", FieldSchema::of("string"))
            .into(),
        ComplexSchema::named("Customer")
            .field("id", FieldSchema::of("integer").required())
            .field("name", FieldSchema::of("string").required())
            .field("tier", FieldSchema::of("string").with_enum("Tier"))
            .field("address", FieldSchema::of("Address"))
            .field("tags", FieldSchema::of("string").array())
            .field("secret", FieldSchema::of("string").exclusive())
            .field("created", FieldSchema::of("datetime").read_only())
            .into(),
    ])
}

#[test]
fn decode_coerces_builtins_and_reports_every_issue() {
    let document = customer_document();
    let decoded = decode(
        &document,
        "Customer",
        CodecOptions::decode(),
        json!({ "id": "7", "name": "Ada", "tags": ["a", 1], "address": { "city": "Oslo" } }),
    )
    .unwrap();
    assert_eq!(decoded, json!({ "id": 7, "name": "Ada", "address": { "city": "Oslo" }, "tags": ["a", "1"] }));

    let issues = decode(&document, "Customer", CodecOptions::decode(), json!({ "id": "x", "address": {} }))
        .unwrap_err();
    assert_eq!(issues, ["/id: must be a number", "/name: is required", "/address/city: is required"]);
}

#[test]
fn unknown_fields_are_rejected_on_decode_and_dropped_on_encode() {
    let document = customer_document();
    let issues = decode(&document, "Customer", CodecOptions::decode(), json!({ "id": 1, "name": "A", "x": 1 }))
        .unwrap_err();
    assert_eq!(issues, ["/x: is not a known field"]);

    let encoded = decode(&document, "Customer", CodecOptions::encode(), json!({ "id": 1, "name": "A", "x": 1 }))
        .unwrap();
    assert_eq!(encoded, json!({ "id": 1, "name": "A" }));
}

#[test]
fn enum_aliases_decode_to_their_value() {
    let document = customer_document();
    let decoded = decode(&document, "Customer", CodecOptions::decode(), json!({ "id": 1, "name": "A", "tier": "second" }))
        .unwrap();
    assert_eq!(decoded["tier"], json!("silver"));
    let issues = decode(&document, "Customer", CodecOptions::decode(), json!({ "id": 1, "name": "A", "tier": "bronze" }))
        .unwrap_err();
    assert_eq!(issues, ["/tier: must be one of \"gold\", \"silver\""]);
}

#[test]
fn projections_pick_include_and_exclude() {
    let document = customer_document();
    let value = json!({
        "id": 1, "name": "A", "secret": "s", "address": { "city": "Oslo", "zip": "0150" }
    });

    let default = decode(&document, "Customer", CodecOptions::decode(), value.clone()).unwrap();
    assert!(default.get("secret").is_none(), "exclusive fields are hidden by default");

    let included = decode(&document, "Customer", CodecOptions::decode().project(["+secret"]), value.clone()).unwrap();
    assert_eq!(included["secret"], json!("s"));

    let picked = decode(&document, "Customer", CodecOptions::decode().project(["id", "address.city"]), value.clone())
        .unwrap();
    assert_eq!(picked, json!({ "id": 1, "address": { "city": "Oslo" } }));

    let excluded = decode(&document, "Customer", CodecOptions::decode().project(["-address"]), value).unwrap();
    assert!(excluded.get("address").is_none());
    assert_eq!(excluded["name"], json!("A"));
}

#[test]
fn partial_modes_relax_required_fields() {
    let document = customer_document();
    let value = json!({ "address": {} });
    assert!(decode(&document, "Customer", CodecOptions::decode(), value.clone()).is_err());

    let shallow = decode(&document, "Customer", CodecOptions::decode().partial(Partiality::Shallow), value.clone())
        .unwrap_err();
    assert_eq!(shallow, ["/address/city: is required"]);

    let deep = decode(&document, "Customer", CodecOptions::decode().partial(Partiality::Deep), value).unwrap();
    assert_eq!(deep, json!({ "address": {} }));
}

#[test]
fn read_only_fields_can_be_ignored() {
    let document = customer_document();
    let value = json!({ "id": 1, "name": "A", "created": "2024-01-02T03:04:05Z" });
    let kept = decode(&document, "Customer", CodecOptions::decode(), value.clone()).unwrap();
    assert_eq!(kept["created"], json!("2024-01-02T03:04:05+00:00"));
    let ignored = decode(&document, "Customer", CodecOptions::decode().ignore_read_only(), value).unwrap();
    assert!(ignored.get("created").is_none());
}

#[test]
fn constraints_are_layered_along_the_base_chain() {
    let document = build(vec![
        SimpleSchema::named("Percentage").extends("number").range(Some(0.0), Some(100.0)).into(),
        SimpleSchema::named("Small").extends("Percentage").range(None, Some(10.0)).into(),
        SimpleSchema::named("Sku").extends("string").pattern("^[A-Z]{3}-[0-9]+$").length(None, Some(8)).into(),
    ]);
    assert_eq!(decode(&document, "Percentage", CodecOptions::decode(), json!("50")).unwrap(), json!(50));
    assert_eq!(
        decode(&document, "Small", CodecOptions::decode(), json!(50)).unwrap_err(),
        ["/: must be at most 10"]
    );
    assert_eq!(
        decode(&document, "Small", CodecOptions::decode(), json!(-1)).unwrap_err(),
        ["/: must be at least 0"]
    );
    assert!(decode(&document, "Sku", CodecOptions::decode(), json!("ABC-12")).is_ok());
    assert_eq!(
        decode(&document, "Sku", CodecOptions::decode(), json!("ABC-123456")).unwrap_err(),
        ["/: must be at most 8 long"]
    );
    assert!(decode(&document, "Sku", CodecOptions::decode(), json!("abc-1")).is_err());
}

#[test]
fn unions_take_the_first_matching_member() {
    let document = build(vec![
        ComplexSchema::named("Cat").field("meows", FieldSchema::of("boolean").required()).into(),
        ComplexSchema::named("Dog").field("barks", FieldSchema::of("boolean").required()).into(),
        UnionSchema::named("Pet").member("Cat").member("Dog").into(),
    ]);
    assert_eq!(
        decode(&document, "Pet", CodecOptions::decode(), json!({ "barks": true })).unwrap(),
        json!({ "barks": true })
    );
    assert_eq!(
        decode(&document, "Pet", CodecOptions::decode(), json!({ "purrs": true })).unwrap_err(),
        ["/: does not match any of Cat | Dog"]
    );
}

#[test]
fn defaults_fixed_values_and_additional_fields() {
    let document = build(vec![
        ComplexSchema::named("Settings")
            .field("kind", FieldSchema::of("string").fixed(json!("settings")))
            .field("retries", FieldSchema::of("integer").with_default(json!(3)))
            .additional_fields(AdditionalFieldsSchema::Type("number".into()))
            .into(),
    ]);
    assert_eq!(
        decode(&document, "Settings", CodecOptions::decode(), json!({ "limit": "5" })).unwrap(),
        json!({ "kind": "settings", "retries": 3, "limit": 5 })
    );
    assert_eq!(
        decode(&document, "Settings", CodecOptions::decode(), json!({ "kind": "other" })).unwrap_err(),
        ["/kind: must be \"settings\""]
    );
    assert!(decode(&document, "Settings", CodecOptions::decode(), json!({ "limit": "many" })).is_err());
}

#[test]
fn mapped_types_decode_their_projection() {
    let document = build(vec![
        ComplexSchema::named("User")
            .field("id", FieldSchema::of("integer").required())
            .field("email", FieldSchema::of("email").required())
            .into(),
        MappedSchema::over("User").named("UserPatch").omit(["id"]).partial(PartialRule::All(true)).into(),
    ]);
    assert_eq!(decode(&document, "UserPatch", CodecOptions::decode(), json!({})).unwrap(), json!({}));
    assert_eq!(
        decode(&document, "UserPatch", CodecOptions::decode(), json!({ "id": 1 })).unwrap_err(),
        ["/id: is not a known field"]
    );
    assert!(decode(&document, "UserPatch", CodecOptions::decode(), json!({ "email": "nope" })).is_err());
}

struct Upper;

impl CodecHooks for Upper {
    fn decode(&self, value: &Value) -> Result<Value, String> {
        value
            .as_str()
            .map(|s| Value::String(s.to_uppercase()))
            .ok_or_else(|| "must be a string".to_string())
    }
}

#[test]
fn source_hooks_take_precedence_over_base_hooks() {
    let code = TypeSource::new(SimpleSchema::named("Code").extends("string")).with_hooks(Upper).shared();
    let document = DocumentFactory::new()
        .create_document(DocumentInit::new().with_types([
            code.into(),
            api_typegraph::Thunk::from(ComplexSchema::named("Ticket").field("code", FieldSchema::of("Code"))),
        ]))
        .unwrap();
    assert_eq!(
        decode(&document, "Ticket", CodecOptions::decode(), json!({ "code": "ab-1" })).unwrap(),
        json!({ "code": "AB-1" })
    );
}

#[test]
fn self_referencing_types_decode_recursively() {
    let document = build(vec![
        ComplexSchema::named("Node")
            .field("value", FieldSchema::of("number").required())
            .field("children", FieldSchema::of("Node").array())
            .into(),
    ]);
    let issues = decode(
        &document,
        "Node",
        CodecOptions::decode(),
        json!({ "value": 1, "children": [{ "value": 2, "children": [{}] }] }),
    )
    .unwrap_err();
    assert_eq!(issues, ["/children/0/children/0/value: is required"]);
}
