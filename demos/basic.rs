use rulegrid::*;
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), QueryError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Load a session from JSON
    let config = SessionConfig::from_json(
        r#"{
            "fields": [
                {"name": "lastName", "label": "Last Name", "dataType": "string"},
                {"name": "age", "label": "Age", "dataType": "number"},
                {"name": "created", "label": "Created", "dataType": "date"},
                {"name": "preferences", "label": "Preferences", "dataType": "array", "elementType": "string"}
            ],
            "records": [
                {"lastName": "Doe", "age": 30, "created": "2023-01-01", "preferences": ["privacy mode"]},
                {"lastName": "Smith", "age": 28, "created": "2023-02-15", "preferences": ["dark mode", "notifications"]},
                {"lastName": "Johnson", "age": 35, "created": "2023-03-10", "preferences": ["auto upload", "dark mode"]}
            ]
        }"#,
    )?;
    let mut session = config.into_session();

    // 2. Build the query through structural edits
    session.update(|q| {
        q.add_rule(0)?
            .update_rule(0, &[0], Rule::new("age", Operator::Between, RuleValue::list([29, 40])))?
            .add_group()
            .add_rule(1)?
            .update_rule(1, &[0], Rule::new("preferences", Operator::Contains, "dark mode"))?
            .toggle_combinator(0)
    })?;

    // 3. Both outputs from the same snapshot
    println!("SQL: {}", session.compiled_sql());
    for mode in [EvalMode::Compatible, EvalMode::Strict] {
        session.set_mode(mode);
        let names: Vec<String> = session
            .visible_records()
            .iter()
            .filter_map(|r| r.get("lastName").map(|v| v.to_string()))
            .collect();
        println!("{mode:?}: {names:?}");
    }
    Ok(())
}
