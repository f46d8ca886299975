use proptest::prelude::*;
use sql_session::prelude::*;

#[test]
fn single_fragment_renders_as_cte() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT * FROM t", &[])?;
    let sql = store.render("SELECT * FROM a", &["a"], IdentifierQuoting::Plain)?;
    assert_eq!(sql, "WITH a AS (SELECT * FROM t)SELECT * FROM a");
    Ok(())
}

#[test]
fn dependencies_render_before_dependents() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT * FROM t", &[])?;
    store.store("b", "SELECT * FROM a", &["a"])?;
    let sql = store.render("SELECT * FROM b", &["b"], IdentifierQuoting::Plain)?;
    assert_eq!(
        sql,
        "WITH a AS (SELECT * FROM t), b AS (SELECT * FROM a)SELECT * FROM b"
    );
    Ok(())
}

#[test]
fn empty_closure_returns_query_verbatim() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT 1", &[])?;
    let query = "  select *\n  from t; -- trailing comment ";
    assert_eq!(store.render(query, &[], IdentifierQuoting::Plain)?, query);
    Ok(())
}

#[test]
fn backtick_quoting_wraps_cte_names() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT * FROM t;", &[])?;
    let sql = store.render("SELECT * FROM a", &["a"], IdentifierQuoting::Backtick)?;
    assert_eq!(sql, "WITH `a` AS (SELECT * FROM t)SELECT * FROM a");
    Ok(())
}

#[test]
fn inferred_dependencies_follow_references() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("base", "SELECT * FROM raw", &[])?;
    store.store("top", "SELECT x FROM base JOIN other USING (id)", &[])?;
    assert_eq!(store.dependencies("top")?, vec!["base".to_string()]);
    Ok(())
}

#[test]
fn strict_delete_names_dependents() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT * FROM t", &[])?;
    store.store("b", "SELECT * FROM a", &["a"])?;

    let err = store.delete("a", DeleteMode::Strict).unwrap_err();
    assert!(matches!(err, SqlSessionError::Usage { .. }));
    assert!(err.to_string().contains("b"));
    assert!(store.contains("a"));
    Ok(())
}

#[test]
fn force_and_force_all_deletes() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("a", "SELECT * FROM t", &[])?;
    store.store("b", "SELECT * FROM a", &["a"])?;
    store.store("c", "SELECT * FROM b", &["b"])?;
    store.store("d", "SELECT 1", &[])?;

    let mut forced = store.clone();
    assert_eq!(
        forced.delete("a", DeleteMode::Force)?,
        vec!["b".to_string(), "c".to_string(), "d".to_string()]
    );

    assert_eq!(store.delete("a", DeleteMode::ForceAll)?, vec!["d".to_string()]);
    Ok(())
}

#[test]
fn invalid_keys_are_rejected() {
    let mut store = FragmentStore::new();
    assert!(matches!(
        store.store("bad-key", "SELECT 1", &[]),
        Err(SqlSessionError::Usage { .. })
    ));
    assert!(matches!(
        store.store("a", "SELECT 1", &["a"]),
        Err(SqlSessionError::Usage { .. })
    ));
}

#[test]
fn missing_keys_suggest_close_names() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FragmentStore::new();
    store.store("customers", "SELECT * FROM raw_customers", &[])?;
    let err = store
        .render("SELECT * FROM customer", &["customer"], IdentifierQuoting::Plain)
        .unwrap_err();
    let SqlSessionError::KeyNotFound { suggestions, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(suggestions, &vec!["customers".to_string()]);
    Ok(())
}

/// Random DAG where fragment `fN` may depend on any earlier fragment.
fn arbitrary_store() -> impl Strategy<Value = (FragmentStore, Vec<Vec<usize>>)> {
    (1usize..8)
        .prop_flat_map(|n| {
            let deps: Vec<_> = (0..n)
                .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
                .collect();
            deps
        })
        .prop_map(|deps| {
            let deps: Vec<Vec<usize>> = deps
                .into_iter()
                .enumerate()
                .map(|(i, mut d)| {
                    d.retain(|&j| j < i);
                    d.sort_unstable();
                    d.dedup();
                    d
                })
                .collect();
            let mut store = FragmentStore::new();
            for (i, d) in deps.iter().enumerate() {
                let names: Vec<String> = d.iter().map(|j| format!("f{j}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let body = if names.is_empty() {
                    "SELECT 1".to_string()
                } else {
                    format!("SELECT * FROM {}", names.join(", "))
                };
                store
                    .store(&format!("f{i}"), &body, &refs)
                    .expect("acyclic store succeeds");
            }
            (store, deps)
        })
}

proptest! {
    #[test]
    fn render_orders_dependencies_first((store, deps) in arbitrary_store(), pick in 0usize..8) {
        let root = format!("f{}", pick % deps.len());
        let sql = store.render("SELECT 1", &[root.as_str()], IdentifierQuoting::Plain).unwrap();
        let position = |key: &str| sql.find(&format!("{key} AS ("));

        for (i, d) in deps.iter().enumerate() {
            let key = format!("f{i}");
            let Some(at) = position(&key) else { continue };
            for j in d {
                let dep = format!("f{j}");
                let dep_at = position(&dep);
                prop_assert!(dep_at.is_some(), "{dep} missing from {sql}");
                prop_assert!(dep_at.unwrap() < at, "{dep} rendered after {key}: {sql}");
            }
        }
    }
}
