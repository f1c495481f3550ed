use std::collections::HashMap;
use std::sync::Arc;

use api_typegraph::{
    ComplexSchema, DataType, DesignType, DesignTypeMap, Document, DocumentDescription, DocumentError,
    DocumentFactory, DocumentFetcher, DocumentInit, DocumentReference, EnumSchema, EnumValue, ErrorKind,
    FieldSchema, Kind, MappedSchema, PartialRule, SimpleSchema, Thunk, TypeBody, TypeDefinitions,
    TypeSchema, TypeSource, UnionSchema,
};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::json;

fn build(types: Vec<TypeSchema>) -> Result<Document, DocumentError> {
    DocumentFactory::new().create_document(DocumentInit::new().with_types(types))
}

fn field_type(document: &Document, owner: &str, field: &str) -> api_typegraph::TypeHandle {
    let data_type = document.get_type(owner).expect("owner exists");
    data_type
        .as_complex()
        .and_then(|complex| complex.field(field))
        .unwrap_or_else(|| panic!("{owner}.{field} exists"))
        .ty
}

fn field_names(document: &Document, owner: &str) -> Vec<String> {
    document
        .fields_of(document.get(owner).unwrap())
        .unwrap()
        .into_iter()
        .map(|field| field.name)
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// IDENTITY & CYCLES
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn self_reference_resolves_to_the_same_data_type() {
    let document = build(vec![
        ComplexSchema::named("Node")
            .field("value", FieldSchema::of("number").required())
            .field("parent", FieldSchema::of("Node"))
            .into(),
    ])
    .unwrap();
    let node = document.get("Node").unwrap();
    assert_eq!(field_type(&document, "Node", "parent"), node);
    assert_eq!(document.len(), 1);
}

#[test]
fn cyclic_source_refers_to_itself() {
    let node = TypeSource::cyclic("Node", |me| {
        ComplexSchema::named("Node").field("next", FieldSchema::of(me)).into()
    });
    let document = DocumentFactory::new()
        .create_document(DocumentInit::new().with_type(node.clone()))
        .unwrap();
    let handle = document.get("Node").unwrap();
    assert_eq!(field_type(&document, "Node", "next"), handle);
    assert_eq!(document.find_by_source(node.id()), Some(handle));
}

#[test]
fn mutually_recursive_sources_through_deferred_thunks() {
    let b_slot: Arc<OnceCell<Arc<TypeSource>>> = Arc::new(OnceCell::new());
    let deferred_b = {
        let b_slot = b_slot.clone();
        Thunk::deferred(move || {
            b_slot.get().cloned().map(Thunk::Source).ok_or_else(|| ErrorKind::MissingMetadata {
                what: "B".into(),
            })
        })
    };
    let a = TypeSource::new(ComplexSchema::named("A").field("b", FieldSchema::of(deferred_b))).shared();
    let b = TypeSource::new(ComplexSchema::named("B").field("a", FieldSchema::of(a.clone()))).shared();
    b_slot.set(b.clone()).unwrap();

    let document = DocumentFactory::new()
        .create_document(DocumentInit::new().with_type(a.clone()))
        .unwrap();
    assert_eq!(document.len(), 2, "B is pulled in by A's field");
    assert_eq!(field_type(&document, "A", "b"), document.get("B").unwrap());
    assert_eq!(field_type(&document, "B", "a"), document.get("A").unwrap());
    assert_eq!(document.find_by_source(b.id()), document.get("B"));
}

#[test]
fn circular_base_chain_is_rejected() {
    let error = build(vec![
        ComplexSchema::named("Employee").extends("Manager").into(),
        ComplexSchema::named("Manager").extends("Employee").into(),
    ])
    .unwrap_err();
    assert_eq!(
        error.kind,
        ErrorKind::CircularBaseReference {
            chain: vec!["Employee".into(), "Manager".into(), "Employee".into()]
        }
    );
    let message = error.to_string();
    assert!(message.contains("Employee") && message.contains("Manager"), "{message}");
}

#[test]
fn simple_types_cannot_extend_themselves() {
    let error = build(vec![SimpleSchema::named("Loop").extends("Loop").into()]).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::CircularBaseReference { ref chain } if chain == &["Loop", "Loop"]));
}

#[test]
fn base_cycle_through_a_mapped_type_is_rejected_in_any_order() {
    let extends_mapped = || -> TypeSchema {
        ComplexSchema::named("A").extends("M").field("x", FieldSchema::of("string")).into()
    };
    let mapped = || -> TypeSchema { MappedSchema::over("A").named("M").into() };

    let error = build(vec![extends_mapped(), mapped()]).unwrap_err();
    assert_eq!(
        error.kind,
        ErrorKind::CircularBaseReference { chain: vec!["A".into(), "M".into(), "A".into()] }
    );
    let error = build(vec![mapped(), extends_mapped()]).unwrap_err();
    assert_eq!(
        error.kind,
        ErrorKind::CircularBaseReference { chain: vec!["M".into(), "A".into(), "M".into()] }
    );

    let error = build(vec![
        MappedSchema::over("B").named("M").into(),
        extends_mapped(),
        ComplexSchema::named("B").extends("A").into(),
    ])
    .unwrap_err();
    assert_eq!(
        error.kind,
        ErrorKind::CircularBaseReference {
            chain: vec!["M".into(), "B".into(), "A".into(), "M".into()]
        }
    );
}

#[test]
fn field_may_point_at_a_mapped_type_over_its_owner() {
    let document = build(vec![
        MappedSchema::over("Account").named("AccountPatch").partial(PartialRule::All(true)).into(),
        ComplexSchema::named("Account")
            .field("name", FieldSchema::of("string").required())
            .field("pending", FieldSchema::of("AccountPatch"))
            .into(),
    ])
    .unwrap();
    assert_eq!(field_type(&document, "Account", "pending"), document.get("AccountPatch").unwrap());
    assert_eq!(field_names(&document, "AccountPatch"), ["name", "pending"]);
}

#[test]
fn field_may_point_back_at_a_subtype_whose_base_is_resolving() {
    let document = build(vec![
        ComplexSchema::named("Child")
            .extends("Parent")
            .field("name", FieldSchema::of("string"))
            .into(),
        ComplexSchema::named("Parent").field("first", FieldSchema::of("Child")).into(),
    ])
    .unwrap();
    let child = document.get("Child").unwrap();
    assert_eq!(field_type(&document, "Parent", "first"), child);
    assert_eq!(field_names(&document, "Child"), ["first", "name"]);
}

// ————————————————————————————————————————————————————————————————————————————
// IMPORT
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn same_source_from_two_fields_is_imported_once() {
    let address = TypeSource::new(
        ComplexSchema::named("Address").field("city", FieldSchema::of("string")),
    )
    .shared();
    let customer = TypeSource::new(
        ComplexSchema::named("Customer")
            .field("billing", FieldSchema::of(address.clone()))
            .field("shipping", FieldSchema::of(address.clone())),
    )
    .shared();
    let document = DocumentFactory::new()
        .create_document(DocumentInit::new().with_types([customer, address.clone()]))
        .unwrap();
    assert_eq!(document.len(), 2);
    let address_handle = document.get("Address").unwrap();
    assert_eq!(field_type(&document, "Customer", "billing"), address_handle);
    assert_eq!(field_type(&document, "Customer", "shipping"), address_handle);
    assert_eq!(document.find_by_source(address.id()), Some(address_handle));
}

#[test]
fn duplicate_names_are_rejected() {
    let error = build(vec![
        ComplexSchema::named("Thing").into(),
        SimpleSchema::named("Thing").extends("string").into(),
    ])
    .unwrap_err();
    assert_eq!(error.kind, ErrorKind::DuplicateTypeName { name: "Thing".into() });
}

#[test]
fn undeclared_source_is_missing_metadata() {
    let ghost = TypeSource::undeclared("Ghost");
    let error = DocumentFactory::new()
        .create_document(DocumentInit::new().with_type(ghost))
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::MissingMetadata { .. }));
}

#[test]
fn top_level_types_must_be_named() {
    let anonymous: TypeSchema = ComplexSchema::default().into();
    let error = build(vec![anonymous]).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InvalidSchema { .. }));
}

#[test]
fn map_keys_name_unnamed_schemas() {
    let mut types = IndexMap::new();
    types.insert("Point".to_string(), Thunk::from(TypeSchema::from(ComplexSchema::default())));
    let document = DocumentFactory::new()
        .create_document(DocumentInit { types: TypeDefinitions::Map(types), ..DocumentInit::new() })
        .unwrap();
    assert!(document.get("Point").is_some());

    let mut mismatched = IndexMap::new();
    mismatched.insert("Point".to_string(), Thunk::from(TypeSchema::from(ComplexSchema::named("Vector"))));
    let error = DocumentFactory::new()
        .create_document(DocumentInit { types: TypeDefinitions::Map(mismatched), ..DocumentInit::new() })
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InvalidSchema { .. }));
}

#[test]
fn design_types_type_undeclared_fields() {
    let document = build(vec![
        ComplexSchema::named("Order")
            .field("count", FieldSchema::typed::<u32>())
            .field("note", FieldSchema::default())
            .into(),
    ])
    .unwrap();
    assert_eq!(field_type(&document, "Order", "count"), document.get("integer").unwrap());
    assert_eq!(field_type(&document, "Order", "note"), document.get("any").unwrap());

    let factory = DocumentFactory::new()
        .with_design_types(Arc::new(DesignTypeMap::new().with(DesignType::Integer, "Count")));
    let document = factory
        .create_document(DocumentInit::new().with_types([
            TypeSchema::from(SimpleSchema::named("Count").extends("integer")),
            ComplexSchema::named("Order").field("count", FieldSchema::typed::<u32>()).into(),
        ]))
        .unwrap();
    assert_eq!(field_type(&document, "Order", "count"), document.get("Count").unwrap());
}

#[test]
fn error_path_points_at_the_field() {
    let error = build(vec![
        ComplexSchema::named("Customer")
            .field(
                "address",
                FieldSchema::of(ComplexSchema::default().field("city", FieldSchema::of("Town"))),
            )
            .into(),
    ])
    .unwrap_err();
    assert_eq!(error.to_string(), "Error at Types/Customer.address.city: unknown type \"Town\"");
}

// ————————————————————————————————————————————————————————————————————————————
// KINDS
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn inherited_fields_are_merged_with_overrides_in_place() {
    let document = build(vec![
        ComplexSchema::named("Base")
            .field("name", FieldSchema::of("string"))
            .field("id", FieldSchema::of("integer"))
            .into(),
        ComplexSchema::named("Derived")
            .extends("Base")
            .field("name", FieldSchema::of("string").required())
            .field("extra", FieldSchema::of("boolean"))
            .into(),
    ])
    .unwrap();
    let derived = document.get("Derived").unwrap();
    assert_eq!(field_names(&document, "Derived"), ["id", "name", "extra"]);
    let complex = document.data_type(derived).and_then(DataType::as_complex).unwrap();
    let name = complex.field("name").unwrap();
    assert!(name.required);
    assert_eq!(name.origin, derived);
    assert_eq!(complex.field("id").unwrap().origin, document.get("Base").unwrap());
    assert_eq!(field_names(&document, "Base"), ["name", "id"], "base is untouched");
}

#[test]
fn base_kind_must_match() {
    let error = build(vec![
        SimpleSchema::named("Code").extends("string").into(),
        ComplexSchema::named("Thing").extends("Code").into(),
    ])
    .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::TypeMismatch { .. }), "{error}");
}

#[test]
fn enum_values_extend_their_base() {
    let document = build(vec![
        EnumSchema::named("Status").value("active").value("closed").into(),
        EnumSchema::named("ExtendedStatus")
            .extends("Status")
            .aliased("closed", "done")
            .value("archived")
            .into(),
    ])
    .unwrap();
    let extended = document.get_type("ExtendedStatus").and_then(DataType::as_enum).unwrap();
    let values: Vec<_> = extended.values.keys().cloned().collect();
    assert_eq!(values, [EnumValue::from("active"), EnumValue::from("closed"), EnumValue::from("archived")]);
    assert_eq!(extended.values[&EnumValue::from("closed")].alias.as_deref(), Some("done"));
}

#[test]
fn mapped_types_project_their_source() {
    let document = build(vec![
        ComplexSchema::named("User")
            .field("id", FieldSchema::of("integer").required())
            .field("email", FieldSchema::of("email").required())
            .field("password", FieldSchema::of("string").required())
            .into(),
        MappedSchema::over("User").named("PublicUser").omit(["password"]).into(),
        MappedSchema::over("User")
            .named("UserPatch")
            .pick(["email", "password"])
            .partial(PartialRule::All(true))
            .into(),
    ])
    .unwrap();
    assert_eq!(field_names(&document, "PublicUser"), ["id", "email"]);
    let patch = document.fields_of(document.get("UserPatch").unwrap()).unwrap();
    assert_eq!(patch.len(), 2);
    assert!(patch.iter().all(|field| !field.required));
}

#[test]
fn mapped_type_over_a_non_complex_type_is_a_mismatch() {
    let error = build(vec![
        EnumSchema::named("Color").value("red").into(),
        MappedSchema::over("Color").named("Picked").pick(["red"]).into(),
    ])
    .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::TypeMismatch { ref expected, .. } if expected == "ComplexType"));

    for source in ["string", "Code"] {
        let error = build(vec![
            SimpleSchema::named("Code").extends("string").into(),
            MappedSchema::over(source).named("Picked").into(),
        ])
        .unwrap_err();
        assert!(
            matches!(error.kind, ErrorKind::TypeMismatch { ref expected, .. } if expected == "ComplexType"),
            "{source}: {error}"
        );
    }
}

#[test]
fn complex_type_may_extend_a_mapped_type() {
    let document = build(vec![
        ComplexSchema::named("Full")
            .field("a", FieldSchema::of("string"))
            .field("b", FieldSchema::of("string"))
            .into(),
        MappedSchema::over("Full").named("OnlyA").pick(["a"]).into(),
        ComplexSchema::named("Extended").extends("OnlyA").field("c", FieldSchema::of("number")).into(),
    ])
    .unwrap();
    assert_eq!(field_names(&document, "Extended"), ["a", "c"]);
}

#[test]
fn union_members_are_deduplicated() {
    let document = build(vec![
        UnionSchema::named("Id").member("string").member("integer").member("string").into(),
    ])
    .unwrap();
    let union = document.get_type("Id").and_then(DataType::as_union).unwrap();
    assert_eq!(union.types, [document.get("string").unwrap(), document.get("integer").unwrap()]);
}

#[test]
fn unions_cannot_contain_themselves() {
    let direct = build(vec![UnionSchema::named("U").member("U").member("string").into()]).unwrap_err();
    assert!(matches!(direct.kind, ErrorKind::InvalidSchema { .. }));

    let indirect = build(vec![
        UnionSchema::named("P").member("Q").into(),
        UnionSchema::named("Q").member("P").into(),
    ])
    .unwrap_err();
    assert!(matches!(indirect.kind, ErrorKind::InvalidSchema { ref reason } if reason.contains("P")));
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY & REFERENCES
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn builtin_types_are_visible_unless_disabled() {
    let document = build(vec![]).unwrap();
    assert_eq!(document.get_type("string").map(DataType::kind), Some(Kind::Simple));
    assert_eq!(document.get_type("object").map(DataType::kind), Some(Kind::Complex));
    let integer = document.get_type("integer").unwrap();
    assert_eq!(integer.base(), document.get("number"));

    let error = DocumentFactory::new()
        .create_document(
            DocumentInit::new()
                .without_builtins()
                .with_type(ComplexSchema::named("A").field("x", FieldSchema::of("string"))),
        )
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::UnresolvedReference { name: "string".into() });
}

#[test]
fn builtin_document_is_shared_between_builds() {
    let factory = DocumentFactory::new();
    let first = factory.create_document(DocumentInit::new()).unwrap();
    let second = factory.create_document(DocumentInit::new()).unwrap();
    assert_eq!(first.get("string"), second.get("string"));
    assert!(factory.builtin_document().unwrap().is_builtin());
}

#[test]
fn names_are_sorted_after_build() {
    let document = build(vec![
        ComplexSchema::named("Zebra").into(),
        ComplexSchema::named("Apple").into(),
    ])
    .unwrap();
    let names: Vec<_> = document.types().map(|(name, _)| name).collect();
    assert_eq!(names, ["Apple", "Zebra"]);
}

#[test]
fn inline_references_are_namespaced() {
    let geo = DocumentInit::new()
        .with_type(ComplexSchema::named("Point").field("lat", FieldSchema::of("number")));
    let document = DocumentFactory::new()
        .create_document(
            DocumentInit::new()
                .reference("geo", DocumentReference::Inline(Box::new(geo)))
                .with_type(ComplexSchema::named("Shop").field("location", FieldSchema::of("geo:Point"))),
        )
        .unwrap();
    let point = document.get("geo:Point").unwrap();
    assert_eq!(field_type(&document, "Shop", "location"), point);
    assert_eq!(document.qualified_name(point).as_deref(), Some("geo:Point"));
    assert!(document.get_own("Point").is_none());
}

#[test]
fn builtin_namespace_is_reserved() {
    let error = DocumentFactory::new()
        .create_document(
            DocumentInit::new().reference("builtin", DocumentReference::Inline(Box::new(DocumentInit::new()))),
        )
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InvalidSchema { .. }));
    assert_eq!(error.path.to_string(), "References/builtin");
}

struct StaticFetcher(HashMap<&'static str, serde_json::Value>);

impl DocumentFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<String, ErrorKind> {
        self.0
            .get(url)
            .map(ToString::to_string)
            .ok_or_else(|| ErrorKind::Fetch { url: url.into(), reason: "not found".into() })
    }
}

#[test]
fn url_references_are_fetched_and_built_first() {
    let fetcher = StaticFetcher(HashMap::from([(
        "mem://geo",
        json!({ "types": { "Point": { "kind": "ComplexType", "fields": { "lat": { "type": "number" } } } } }),
    )]));
    let factory = DocumentFactory::new().with_fetcher(Arc::new(fetcher));
    let document = factory
        .create_document(
            DocumentInit::new()
                .reference("geo", DocumentReference::Url("mem://geo".into()))
                .with_type(ComplexSchema::named("Shop").field("location", FieldSchema::of("geo:Point"))),
        )
        .unwrap();
    assert_eq!(document.reference("geo").unwrap().url(), Some("mem://geo"));
    assert_eq!(field_type(&document, "Shop", "location"), document.get("geo:Point").unwrap());
}

#[test]
fn circular_url_references_are_detected() {
    let fetcher = StaticFetcher(HashMap::from([
        ("mem://a", json!({ "references": { "b": "mem://b" }, "types": {} })),
        ("mem://b", json!({ "references": { "a": "mem://a" }, "types": {} })),
    ]));
    let factory = DocumentFactory::new().with_fetcher(Arc::new(fetcher));
    let error = factory.create_document_from_url("mem://a").unwrap_err();
    assert_eq!(
        error.kind,
        ErrorKind::CircularDocumentReference {
            chain: vec!["mem://a".into(), "mem://b".into(), "mem://a".into()]
        }
    );
}

#[test]
fn failed_fetch_aborts_the_build() {
    let factory = DocumentFactory::new().with_fetcher(Arc::new(StaticFetcher(HashMap::new())));
    let error = factory
        .create_document(DocumentInit::new().reference("x", DocumentReference::Url("mem://missing".into())))
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::Fetch { .. }));
}

// ————————————————————————————————————————————————————————————————————————————
// EXPORT
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn exported_description_rebuilds_the_same_graph() {
    let document = build(vec![
        ComplexSchema::named("Base").field("id", FieldSchema::of("integer").required()).into(),
        ComplexSchema::named("Node")
            .extends("Base")
            .field("children", FieldSchema::of("Node").array())
            .field("meta", FieldSchema::of(ComplexSchema::default().field("tag", FieldSchema::of("string"))))
            .into(),
        EnumSchema::named("Color").value("red").into(),
    ])
    .unwrap();
    let exported = document.to_json().unwrap();
    assert_eq!(exported["types"]["Node"]["base"], json!("Base"));
    assert!(exported["types"]["Node"]["fields"].get("id").is_none(), "inherited fields stay with the base");
    assert_eq!(exported["types"]["Node"]["fields"]["meta"]["type"]["kind"], json!("ComplexType"));

    let description = DocumentDescription::from_json_value(exported).unwrap();
    let rebuilt = DocumentFactory::new().create_document(description.into()).unwrap();
    let names: Vec<_> = rebuilt.types().map(|(name, _)| name).collect();
    assert_eq!(names, ["Base", "Color", "Node"]);
    assert_eq!(field_names(&rebuilt, "Node"), ["id", "children", "meta"]);
}

#[test]
fn shells_never_escape_a_build() {
    let document = build(vec![
        ComplexSchema::named("A").field("b", FieldSchema::of("B")).into(),
        ComplexSchema::named("B").extends("C").into(),
        ComplexSchema::named("C").field("a", FieldSchema::of("A")).into(),
    ])
    .unwrap();
    for (_, handle) in document.types() {
        assert!(!matches!(document.data_type(handle).unwrap().body(), TypeBody::Shell(_)));
    }
    assert_eq!(field_names(&document, "B"), ["a"]);
}

#[tracing_test::traced_test]
#[test]
fn build_completion_is_logged() {
    build(vec![ComplexSchema::named("Logged").into()]).unwrap();
    assert!(logs_contain("document built"));
}
