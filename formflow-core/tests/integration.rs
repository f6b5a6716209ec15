//! Integration Tests for the Form Engine
//!
//! These tests drive schemas, graphs, recompute, sessions and stores
//! together the way a form view would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tempfile::tempdir;

use formflow_core::formula::{FixedClock, SandboxEvaluator};
use formflow_core::reactive::{Coordinator, FormSession, Snapshot};
use formflow_core::schema::{
    DerivedSpec, Field, FieldId, FieldType, FieldValue, FormSchema, ValidationSpec, Values,
};
use formflow_core::store::{Codec, FileStore, MemoryStore, SchemaStore, SubmissionLog};
use formflow_core::validation::Rule;
use formflow_core::{
    build_graph, recompute, validate, validate_all, EngineConfig, FieldUpdate, FormBuilder,
    FormulaError,
};

fn clock_2025() -> Arc<FixedClock> {
    Arc::new(FixedClock::on_date(2025, 6, 1).unwrap())
}

fn session(fields: Vec<Field>) -> FormSession {
    let schema = FormSchema::new("test", Utc::now(), fields);
    FormSession::with_clock(schema, EngineConfig::default(), clock_2025()).unwrap()
}

fn name_fields() -> Vec<Field> {
    vec![
        Field::new("first", FieldType::ShortText, "First name"),
        Field::new("last", FieldType::ShortText, "Last name"),
        Field::new("full_name", FieldType::ShortText, "Full name")
            .derived_from(DerivedSpec::new(["first", "last"], "first + \" \" + last")),
    ]
}

/// Age is derived from a date of birth against a pinned current year.
#[test]
fn age_from_date_of_birth() {
    let mut session = session(vec![
        Field::new("dob", FieldType::Date, "Date of birth"),
        Field::new("age", FieldType::Number, "Age")
            .derived_from(DerivedSpec::new(["dob"], "current_year() - year(dob)")),
    ]);

    assert!(session.snapshot().value("age").is_none());

    let snapshot = session.set_value("dob", "2000-01-01").unwrap();
    assert_eq!(snapshot.value("age"), Some(&FieldValue::Number(25.0)));
}

/// Clearing a parent sends the derived field back to unset.
#[test]
fn full_name_follows_its_parents() {
    let mut session = session(name_fields());

    session.set_value("first", "Ada").unwrap();
    assert!(session.snapshot().value("full_name").is_none());

    let snapshot = session.set_value("last", "Lovelace").unwrap();
    assert_eq!(
        snapshot.value("full_name"),
        Some(&FieldValue::text("Ada Lovelace"))
    );

    let snapshot = session.set_value("last", "").unwrap();
    assert!(snapshot.value("full_name").is_none());

    session.set_value("last", "Byron").unwrap();
    let snapshot = session.clear_value("last").unwrap();
    assert!(snapshot.value("full_name").is_none());
}

/// A failing formula blanks its own field and leaves siblings alone.
#[test]
fn formula_failure_is_attributed_to_its_field() {
    let mut session = session(vec![
        Field::new("first", FieldType::ShortText, "First"),
        Field::new("full_name", FieldType::ShortText, "Full name")
            .derived_from(DerivedSpec::new(["first"], "parents[0] / 0")),
        Field::new("initial", FieldType::ShortText, "Initial")
            .derived_from(DerivedSpec::new(["first"], "upper(first)")),
    ]);

    let snapshot = session.set_value("first", "10").unwrap();
    assert_eq!(snapshot.value("full_name"), Some(&FieldValue::text("")));
    assert_eq!(
        snapshot.formula_error("full_name"),
        Some(&FormulaError::DivisionByZero)
    );
    assert_eq!(snapshot.value("initial"), Some(&FieldValue::text("10")));
    assert!(snapshot.formula_error("initial").is_none());
}

/// Formulas only see their declared parents.
#[test]
fn formulas_cannot_read_undeclared_fields() {
    let mut session = session(vec![
        Field::new("secret", FieldType::ShortText, "Secret"),
        Field::new("n", FieldType::Number, "N"),
        Field::new("leak", FieldType::ShortText, "Leak")
            .derived_from(DerivedSpec::new(["n"], "secret")),
    ]);

    session.set_value("secret", "hunter2").unwrap();
    let snapshot = session.set_value("n", 1.0).unwrap();
    assert_eq!(snapshot.value("leak"), Some(&FieldValue::text("")));
    assert!(matches!(
        snapshot.formula_error("leak"),
        Some(FormulaError::UnknownName(name)) if name == "secret"
    ));
}

#[test]
fn graph_orders_parents_first() {
    let schema = FormSchema::new(
        "chain",
        Utc::now(),
        vec![
            Field::new("total", FieldType::Number, "Total")
                .derived_from(DerivedSpec::new(["subtotal", "tax"], "subtotal + tax")),
            Field::new("tax", FieldType::Number, "Tax")
                .derived_from(DerivedSpec::new(["subtotal"], "subtotal / 10")),
            Field::new("subtotal", FieldType::Number, "Subtotal")
                .derived_from(DerivedSpec::new(["price", "qty"], "price * qty")),
            Field::new("price", FieldType::Number, "Price"),
            Field::new("qty", FieldType::Number, "Quantity"),
        ],
    );
    let graph = build_graph(&schema).unwrap();
    let order: Vec<&str> = graph.topological_order().map(FieldId::as_str).collect();
    assert_eq!(order, ["subtotal", "tax", "total"]);

    let mut values = Values::new();
    values.insert(FieldId::from("price"), FieldValue::Number(10.0));
    values.insert(FieldId::from("qty"), FieldValue::Number(3.0));

    let evaluator = SandboxEvaluator::new(clock_2025());
    let pass = recompute(&schema, &graph, &values, &evaluator);
    assert_eq!(pass.values["total"], FieldValue::Number(33.0));

    let again = recompute(&schema, &graph, &pass.values, &evaluator);
    assert_eq!(again.values, pass.values);
    assert!(again.changed.is_empty());
}

#[test]
fn cycle_names_every_participant() {
    let schema = FormSchema::new(
        "cycle",
        Utc::now(),
        vec![
            Field::new("a", FieldType::ShortText, "A").derived_from(DerivedSpec::new(["b"], "b")),
            Field::new("b", FieldType::ShortText, "B").derived_from(DerivedSpec::new(["a"], "a")),
            Field::new("c", FieldType::ShortText, "C").derived_from(DerivedSpec::new(["a"], "a")),
        ],
    );
    let err = build_graph(&schema).unwrap_err();
    assert!(err.contains("a"));
    assert!(err.contains("b"));
    assert!(!err.contains("c"));
}

#[test]
fn validation_rules_run_in_order() {
    let field = Field::new("email", FieldType::ShortText, "Email")
        .required()
        .with_validation(ValidationSpec {
            min_length: Some(10),
            requires_email_format: true,
            ..ValidationSpec::default()
        });

    assert_eq!(validate(&field, Some(&FieldValue::text(""))).unwrap().rule, Rule::Required);
    assert_eq!(
        validate(&field, Some(&FieldValue::List(vec![]))).unwrap().rule,
        Rule::Required
    );
    assert_eq!(validate(&field, Some(&FieldValue::text("ab"))).unwrap().rule, Rule::MinLength);
    assert_eq!(
        validate(&field, Some(&FieldValue::text("not-an-email"))).unwrap().rule,
        Rule::EmailFormat
    );
    assert!(validate(&field, Some(&FieldValue::text("ada@example.com"))).is_none());
}

#[test]
fn submit_then_log_submission() {
    let store = MemoryStore::new();
    let mut session = session(vec![
        Field::new("email", FieldType::ShortText, "Email")
            .required()
            .with_validation(ValidationSpec {
                requires_email_format: true,
                ..ValidationSpec::default()
            }),
        Field::new("password", FieldType::ShortText, "Password")
            .required()
            .with_validation(ValidationSpec {
                requires_password_rule: true,
                ..ValidationSpec::default()
            }),
    ]);

    let err = session.submit().unwrap_err();
    assert_eq!(err.errors.len(), 2);
    assert!(store.load_submissions().unwrap().is_empty());

    session.set_value("email", "ada@example.com").unwrap();
    session.set_value("password", "short").unwrap();
    let err = session.submit().unwrap_err();
    assert_eq!(err.errors["password"].rule, Rule::PasswordRule);

    session.set_value("password", "engine1843").unwrap();
    assert!(validate_all(session.schema(), session.values()).is_empty());
    store.append_submission(session.submit().unwrap()).unwrap();

    let logged = store.load_submissions().unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].values["email"], FieldValue::text("ada@example.com"));
}

#[test]
fn view_layer_receives_snapshots() {
    let mut session = session(name_fields());
    let seen: Arc<Mutex<Vec<Option<FieldValue>>>> = Arc::default();
    let seen_clone = seen.clone();
    session.subscribe(move |snapshot: &Snapshot| {
        seen_clone
            .lock()
            .unwrap()
            .push(snapshot.value("full_name").cloned());
    });

    session.set_value("first", "Ada").unwrap();
    session.set_value("last", "Lovelace").unwrap();
    session.clear_value("first").unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some(FieldValue::text("Ada Lovelace")), None]
    );
}

#[test]
fn coordinator_is_stateless_between_edits() {
    let schema = FormSchema::new("names", Utc::now(), name_fields());
    let coordinator =
        Coordinator::new(schema, Arc::new(SandboxEvaluator::new(clock_2025()))).unwrap();

    let empty = coordinator.initial_snapshot();
    let ada = coordinator
        .set_value(&empty, "first", Some(FieldValue::text("Ada")))
        .unwrap();
    let grace = coordinator
        .set_value(&empty, "first", Some(FieldValue::text("Grace")))
        .unwrap();

    assert!(empty.values.is_empty());
    assert_eq!(ada.value("first"), Some(&FieldValue::text("Ada")));
    assert_eq!(grace.value("first"), Some(&FieldValue::text("Grace")));
}

/// Build a form, persist it to disk, reload it and fill it in.
#[test]
fn builder_to_session_round_trip() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path(), Codec::Json);
    let clock = clock_2025();

    let mut builder = FormBuilder::new();
    let first = builder.add_field(FieldType::ShortText);
    let last = builder.add_field(FieldType::ShortText);
    let full = builder.add_field(FieldType::ShortText);
    builder
        .update_field(full.as_str(), FieldUpdate::Label("Full name".into()))
        .unwrap();
    builder
        .update_field(
            full.as_str(),
            FieldUpdate::Derived(Some(DerivedSpec::new(
                [first.clone(), last.clone()],
                "parents[0] + \" \" + parents[1]",
            ))),
        )
        .unwrap();
    builder.save("People", &store, clock.as_ref()).unwrap();

    let reopened = FileStore::new(dir.path(), Codec::Json);
    let schemas = reopened.load_schemas().unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].field(full.as_str()).unwrap().label, "Full name");

    let mut session =
        FormSession::with_clock(schemas[0].clone(), EngineConfig::default(), clock).unwrap();
    session.set_value(first.as_str(), "Grace").unwrap();
    let snapshot = session.set_value(last.as_str(), "Hopper").unwrap();
    assert_eq!(
        snapshot.value(full.as_str()),
        Some(&FieldValue::text("Grace Hopper"))
    );
}

/// Forms saved by the earlier web builder use its short keys.
#[test]
fn reads_legacy_persisted_forms() {
    let json = r#"[{
        "name": "Signup",
        "createdAt": "2024-11-02T10:15:00.000Z",
        "fields": [
            {"id": "email", "type": "text", "label": "Email", "required": true,
             "validation": {"email": true}},
            {"id": "pw", "type": "text", "label": "Password", "required": true,
             "validation": {"minLength": 8, "passwordRule": true}},
            {"id": "plan", "type": "radio", "label": "Plan", "required": false,
             "options": ["Free", "Pro"], "defaultValue": "Free"},
            {"id": "dob", "type": "date", "label": "Born", "required": false},
            {"id": "age", "type": "number", "label": "Age", "required": false,
             "derived": {"parents": ["dob"], "formula": "age(dob)"}}
        ]
    }]"#;
    let dir = tempdir().unwrap();
    let store = FileStore::json(dir.path());
    std::fs::write(store.forms_path(), json).unwrap();

    let schemas = store.load_schemas().unwrap();
    let schema = &schemas[0];
    assert!(schema.is_structurally_sound().is_ok());
    assert_eq!(schema.fields[2].field_type, FieldType::SingleChoiceGroup);
    assert!(schema.fields[1]
        .validation
        .as_ref()
        .is_some_and(|v| v.requires_password_rule && v.min_length == Some(8)));

    let mut session =
        FormSession::with_clock(schema.clone(), EngineConfig::default(), clock_2025()).unwrap();
    assert_eq!(session.snapshot().value("plan"), Some(&FieldValue::text("Free")));

    let snapshot = session.set_value("dob", "1990-07-15").unwrap();
    assert_eq!(snapshot.value("age"), Some(&FieldValue::Number(34.0)));
}

#[test]
fn message_pack_store_keeps_forms() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path(), Codec::MessagePack);
    let schema = FormSchema::new("names", Utc::now(), name_fields());
    store.save_schemas(std::slice::from_ref(&schema)).unwrap();
    assert_eq!(store.load_schemas().unwrap(), vec![schema]);
}

#[test]
fn subscribers_are_not_called_for_rejected_edits() {
    let mut session = session(name_fields());
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    session.subscribe(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(session.set_value("nope", "x").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
