use super::*;
use crate::error::DbError;
use crate::param::{Cast, Parameter};
use crate::sql;
use crate::testing::{MockConn, Recorder, serialization_failure};
use serde_json::json;
use std::collections::BTreeSet;

/// Placeholder numbers in `text`, in order of appearance.
fn placeholders(text: &str) -> Vec<usize> {
    let mut found = Vec::new();
    for (i, _) in text.match_indices('$') {
        let digits: String = text[i + 1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if let Ok(n) = digits.parse() {
            found.push(n);
        }
    }
    found
}

fn assert_placeholder_contract(query: &CompiledQuery) {
    let distinct: BTreeSet<usize> = placeholders(query.text()).into_iter().collect();
    let expected: BTreeSet<usize> = (1..=query.values().len()).collect();
    assert_eq!(distinct, expected, "placeholders of {}", query.text());
}

#[test]
fn literal_segments_and_params() {
    let fragment = Fragment::from_parts(
        vec![
            "SELECT * FROM t WHERE a = ".into(),
            " AND b = ".into(),
            String::new(),
        ],
        vec![param(5_i32).into(), param("x").into()],
    )
    .unwrap();

    let query = fragment.compile().unwrap();
    assert_eq!(query.text(), "SELECT * FROM t WHERE a = $1 AND b = $2");
    assert_eq!(format!("{:?}", query.values()), r#"[5, "x"]"#);
    assert_eq!(query.name(), None);
}

#[test]
fn from_parts_checks_segment_count() {
    let err = Fragment::from_parts(vec!["a".into(), "b".into()], Vec::new()).unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

#[test]
fn nested_fragments_number_placeholders_globally() {
    let inner = sql!("b = " {param(2_i32)});
    let deeper = sql!("(" {inner.clone()} " OR " {sql!("c IN (" {list([param(3_i32), param(4_i32)])} ")")} ")");
    let outer = sql!("SELECT 1 WHERE a = " {param(1_i32)} " AND " {deeper} " AND " {inner} " AND d = " {param(5_i32)});

    let query = outer.compile().unwrap();
    assert_eq!(
        query.text(),
        "SELECT 1 WHERE a = $1 AND (b = $2 OR c IN ($3, $4)) AND b = $5 AND d = $6"
    );
    assert_eq!(format!("{:?}", query.values()), "[1, 2, 3, 4, 2, 5]");
    assert_placeholder_contract(&query);
}

#[test]
fn compiling_twice_gives_the_same_query() {
    let q = sql!("SELECT " {cols(["a", "b"])} " FROM " {table("t")} " WHERE "
        {Record::new().set("a", 1_i64).set("b", sql!({SELF} " > " {param(2_i64)}))});

    let first = q.compile().unwrap();
    let second = q.compile().unwrap();
    assert_eq!(first.text(), second.text());
    assert_eq!(
        format!("{:?}", first.values()),
        format!("{:?}", second.values())
    );
    assert_placeholder_contract(&first);
}

#[test]
fn identifiers_are_quoted_not_bound() {
    let q = sql!("SELECT " {cols(["id", "Title", "we\"ird"])} " FROM " {table("public.books")}
        " WHERE " {ident("books.id")} " = " {param(1_i64)});
    let query = q.compile().unwrap();
    assert_eq!(
        query.text(),
        r#"SELECT "id", "Title", "we""ird" FROM "public"."books" WHERE "books"."id" = $1"#
    );
    assert_eq!(query.values().len(), 1);
}

#[test]
fn column_names_keep_their_dots() {
    let q = sql!({cols(["a.b"])});
    assert_eq!(q.compile().unwrap().text(), r#""a.b""#);
}

#[test]
fn raw_text_is_verbatim() {
    let q = sql!("SELECT " {raw("now()")} ", " {raw("'literal'")});
    let query = q.compile().unwrap();
    assert_eq!(query.text(), "SELECT now(), 'literal'");
    assert!(query.values().is_empty());
}

#[test]
fn whereables() {
    let empty = sql!("WHERE " {Record::new()});
    assert_eq!(empty.compile().unwrap().text(), "WHERE TRUE");

    let conditions = sql!("WHERE " {Record::new()
        .set("a", 1_i32)
        .set("b", sql!({SELF} " > 2"))
        .set("c", raw("now()"))});
    assert_eq!(
        conditions.compile().unwrap().text(),
        r#"WHERE ("a" = $1 AND ("b" > 2) AND "c" = now())"#
    );

    let all = sql!("WHERE " {ALL});
    assert_eq!(all.compile().unwrap().text(), "WHERE TRUE");
}

#[test]
fn column_lists_and_value_lists_line_up() {
    let record = Record::new()
        .set("title", "Dune")
        .set("id", DEFAULT)
        .set("slug", sql!("lower(" {param("Dune")} ")"));
    let q = sql!("INSERT INTO " {table("books")} " (" {cols_of(&record)} ") VALUES (" {vals(record)} ")");
    let query = q.compile().unwrap();
    assert_eq!(
        query.text(),
        r#"INSERT INTO "books" ("id", "slug", "title") VALUES (DEFAULT, lower($1), $2)"#
    );
    assert_placeholder_contract(&query);
}

#[test]
fn self_inside_value_list_is_its_column() {
    let record = Record::new().set("views", sql!({SELF} " + 1"));
    let q = sql!("UPDATE t SET (" {cols_of(&record)} ") = ROW(" {vals(record)} ")");
    assert_eq!(
        q.compile().unwrap().text(),
        r#"UPDATE t SET ("views") = ROW("views" + 1)"#
    );
}

#[test]
fn parent_columns_resolve_in_scope() {
    let sub = sql!("SELECT count(*) FROM books WHERE "
        {Record::new().set("author_id", parent("id")).set("lang", parent_self())});
    let q = sql!("SELECT (" {scoped("authors", &sub)} ") FROM authors");
    let query = q.compile().unwrap();
    assert_eq!(
        query.text(),
        r#"SELECT (SELECT count(*) FROM books WHERE ("author_id" = "authors"."id" AND "lang" = "authors"."lang")) FROM authors"#
    );

    // An inner scope replaces the outer one.
    let inner = sql!({parent("x")});
    let nested = sql!({scoped("a", &sql!({parent("x")} ", " {scoped("b", &inner)}))});
    assert_eq!(nested.compile().unwrap().text(), r#""a"."x", "b"."x""#);
}

#[test]
fn context_errors() {
    let no_parent = sql!("x = " {parent("id")});
    assert!(matches!(
        no_parent.compile().unwrap_err(),
        DbError::InvalidExpression(_)
    ));

    let no_column = sql!({scoped("t", &sql!({parent_self()}))});
    assert!(matches!(
        no_column.compile().unwrap_err(),
        DbError::InvalidExpression(_)
    ));

    let bare_self = sql!({SELF} " IS NULL");
    assert!(matches!(
        bare_self.compile().unwrap_err(),
        DbError::InvalidExpression(_)
    ));

    assert!(sql!({ident("")}).compile().is_err());
    assert!(sql!({ident("a..b")}).compile().is_err());
    assert!(sql!({cols([""])}).compile().is_err());
}

#[test]
fn json_casts_follow_config_and_directives() {
    let q = sql!("SELECT " {json!([1, 2])} ", " {json!({"a": 1})} ", " {json!(3)});

    let plain = q.compile().unwrap();
    assert_eq!(plain.text(), "SELECT $1, $2, $3");

    let config = Config::new()
        .cast_array_params_to_json(true)
        .cast_object_params_to_json(true);
    let cast = q.compile_with(&config).unwrap();
    assert_eq!(
        cast.text(),
        r#"SELECT CAST($1 AS "json"), CAST($2 AS "json"), $3"#
    );
    assert_placeholder_contract(&cast);

    let forced = sql!({Parameter::json(&vec![1, 2]).unwrap()} ", "
        {Parameter::json_value(json!([1])).cast(Cast::NoJson)});
    assert_eq!(
        forced.compile_with(&config).unwrap().text(),
        r#"CAST($1 AS "json"), $2"#
    );

    let scalar = sql!({Parameter::json(&42).unwrap()} ", " {Parameter::json_value(json!("s")).cast(Cast::Json)});
    assert_eq!(
        scalar.compile().unwrap().text(),
        r#"CAST($1 AS "json"), CAST($2 AS "json")"#
    );

    let typed = sql!({param("2024-01-01").cast_as("date")});
    assert_eq!(typed.compile().unwrap().text(), r#"CAST($1 AS "date")"#);
}

#[test]
fn builder_keeps_segments_aligned() {
    let mut builder = Fragment::builder();
    builder.push_text("SELECT ").push_expr(param(1_i32));
    let f = builder.text(" + ").expr(param(2_i32)).text(" AS n").build();

    assert_eq!(f.template().literals().len(), f.template().exprs().len() + 1);
    assert_eq!(f.compile().unwrap().text(), "SELECT $1 + $2 AS n");

    let empty = Fragment::builder().build();
    assert_eq!(empty.compile().unwrap().text(), "");
    assert_eq!(sql!().compile().unwrap().text(), "");
}

#[test]
fn prepared_name_survives_transforms() {
    let q = sql!("SELECT 1").prepared("select_one");
    assert_eq!(q.prepared_name(), Some("select_one"));
    let mapped = q.map_rows(|rows| rows.len());
    assert_eq!(mapped.compile().unwrap().name(), Some("select_one"));
}

#[tokio::test]
async fn run_applies_transform_and_notifies_listeners() {
    let recorder = std::sync::Arc::new(Recorder::default());
    let conn = MockConn::with_config(Config::new().with_shared_listener(recorder.clone()));
    conn.state.push_result(vec![
        crate::Row::from_pairs([("n", json!(1))]),
        crate::Row::from_pairs([("n", json!(2))]),
    ]);

    let q = sql!("SELECT n FROM t WHERE a = " {param(1_i32)})
        .with_transform(|rows, query| Ok((rows.len(), query.text().to_string())));
    let (n, text) = q.run(&conn).await.unwrap();

    assert_eq!(n, 2);
    assert_eq!(text, "SELECT n FROM t WHERE a = $1");
    assert_eq!(
        *recorder.queries.lock().unwrap(),
        vec![("SELECT n FROM t WHERE a = $1".to_string(), None)]
    );
    assert_eq!(*recorder.results.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn run_reports_errors_to_listeners() {
    let recorder = std::sync::Arc::new(Recorder::default());
    let conn = MockConn::with_config(Config::new().with_shared_listener(recorder.clone()));
    conn.state
        .commit_errors
        .lock()
        .unwrap()
        .push_back(serialization_failure());

    let err = Fragment::literal("COMMIT").run(&conn).await.unwrap_err();
    assert!(err.is_serialization_failure());
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    assert!(recorder.results.lock().unwrap().is_empty());
}

#[tokio::test]
async fn noop_fragments_skip_the_round_trip() {
    let conn = MockConn::new();
    let q = sql!("SELECT 1").map_rows(|rows| rows.len()).noop(0);
    assert!(q.is_noop());

    assert_eq!(q.run(&conn).await.unwrap(), 0);
    assert!(conn.state.sql().is_empty());

    conn.state
        .push_result(vec![crate::Row::from_pairs([("x", json!(1))])]);
    assert_eq!(q.run_forced(&conn).await.unwrap(), 1);
    assert_eq!(conn.state.sql(), vec!["SELECT 1"]);

    // Changing the result type drops the no-op result.
    assert!(!q.with_transform(|_, _| Ok(())).is_noop());
}
