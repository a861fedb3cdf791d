use pgfrag::conditions as c;
use pgfrag::monitor::QueryKind;
use pgfrag::shortcuts::{self, Direction, SelectOptions};
use pgfrag::{
    ALL, Config, DbError, Fragment, Ident, IsolationLevel, Record, RetryDelay, SELF, cols, param,
    parent, raw, scoped, sql, table,
};

#[test]
fn composed_query_compiles_with_contiguous_placeholders() {
    let published = sql!("published_at IS NOT NULL AND year >= " {param(1990_i32)});
    let query = sql!("SELECT " {cols(["id", "title"])} " FROM " {table("books")}
        " WHERE " {published} " AND author_id = " {param(7_i64)} " LIMIT " {param(5_i64)})
    .compile()
    .unwrap();

    assert_eq!(
        query.text(),
        r#"SELECT "id", "title" FROM "books" WHERE published_at IS NOT NULL AND year >= $1 AND author_id = $2 LIMIT $3"#
    );
    assert_eq!(query.values().len(), 3);
    assert_eq!(QueryKind::from_sql(query.text()), QueryKind::Select);
}

#[test]
fn whereable_with_conditions_and_raw_values() {
    let where_ = Record::new()
        .set("title", c::ilike("%rust%"))
        .set("deleted_at", c::is_null())
        .set("updated_at", c::after(raw("now() - interval '1 day'")));
    let query = sql!("DELETE FROM " {table("books")} " WHERE " {where_})
        .compile()
        .unwrap();
    assert_eq!(
        query.text(),
        concat!(
            r#"DELETE FROM "books" WHERE (("deleted_at" IS NULL) AND ("title" ILIKE $1) "#,
            r#"AND ("updated_at" > now() - interval '1 day'))"#
        )
    );
}

#[test]
fn correlated_subquery_via_scope() {
    let latest = sql!("SELECT max(created_at) FROM " {table("posts")}
        " WHERE " {Record::new().set("author_id", parent("id"))});
    let query = sql!("SELECT name, (" {scoped("authors", &latest)} ") AS latest FROM " {table("authors")})
        .compile()
        .unwrap();
    assert_eq!(
        query.text(),
        r#"SELECT name, (SELECT max(created_at) FROM "posts" WHERE ("author_id" = "authors"."id")) AS latest FROM "authors""#
    );
}

#[test]
fn shortcut_select_with_lateral_count() {
    let post_count = shortcuts::count(
        "posts",
        Record::new().set("author_id", parent("id")),
        SelectOptions::new(),
    );
    let authors = shortcuts::select(
        "authors",
        ALL,
        SelectOptions::new()
            .order_by("name", Direction::Asc)
            .lateral("post_count", &post_count),
    );
    let query = authors.compile().unwrap();
    assert!(query.text().contains(
        r#"LEFT JOIN LATERAL (SELECT count("posts".*) AS result FROM "posts" WHERE ("author_id" = "authors"."id")) AS "lateral_post_count" ON true"#
    ));
    assert!(query.text().ends_with(r#"ORDER BY "name" ASC) AS "sq_authors""#));
}

#[test]
fn errors_are_reported_at_compile_time() {
    let err = sql!({SELF} " = 1").compile().unwrap_err();
    assert!(matches!(err, DbError::InvalidExpression(_)));

    let err = Fragment::from_parts(vec![], vec![param(1_i32).into()]).unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    assert!(Ident::parse(r#"public."unterminated"#).is_err());
}

#[test]
fn compiled_query_depends_on_config_flags() {
    let q = sql!("SELECT " {serde_json::json!({"k": [1, 2]})});
    assert_eq!(q.compile().unwrap().text(), "SELECT $1");
    let config = Config::new().cast_object_params_to_json(true);
    assert_eq!(
        q.compile_with(&config).unwrap().text(),
        r#"SELECT CAST($1 AS "json")"#
    );
}

#[test]
fn isolation_levels_and_config() {
    assert!(IsolationLevel::Serializable.satisfies(IsolationLevel::ReadCommittedReadOnly));
    assert!(!IsolationLevel::SerializableReadOnly.satisfies(IsolationLevel::Serializable));

    let delay: RetryDelay = serde_json::from_str(r#"{"min_ms": 5, "max_ms": 50}"#).unwrap();
    assert_eq!(delay, RetryDelay { min: 5, max: 50 });

    let config = Config::new().transaction_attempts_max(3);
    assert_eq!(config.transaction_attempts_max, 3);
    assert!(config.validate().is_ok());
    assert!(Config::new().transaction_attempts_max(0).validate().is_err());
}
