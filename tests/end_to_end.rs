//! End-to-end coverage: config to DDL to EQL lookups over a live sqlite
//! database, with the generated SQL pinned byte for byte.

use enjinql::prelude::*;
use rusqlite::Connection;
use serde_json::json;

fn be_config() -> Config {
    Config::new("be_eql")
        .add_source(
            SourceConfig::new("page")
                .string_value("shasum", 10)
                .string_value("language", 10)
                .string_value("type", 64)
                .string_value("url", 1736)
                .string_value("stub", -1)
                .unique(&["shasum"])
                .unique(&["shasum", "url"])
                .index(&["shasum"])
                .index(&["url", "shasum"]),
        )
        .add_source(
            SourceConfig::new("word")
                .string_value("letter", 1)
                .string_value("word", 256)
                .string_value("flat", 256)
                .index(&["word"]),
        )
        .add_source(
            SourceConfig::new("page_words")
                .parent("page")
                .linked_value("word", "id")
                .int_value("hits"),
        )
}

fn new_engine() -> EnjinQl {
    EnjinQl::new(be_config(), Connection::open_in_memory().unwrap()).unwrap()
}

fn seed(eql: &EnjinQl) -> (i64, i64) {
    let tx = eql.sql_begin().unwrap();
    let p1 = tx
        .insert(
            "page",
            &[
                "1234567890".into(),
                "en".into(),
                "page".into(),
                "/page-slug".into(),
                "{}".into(),
            ],
        )
        .unwrap();
    let p2 = tx
        .insert(
            "page",
            &[
                "0123456789".into(),
                "ja".into(),
                "blog".into(),
                "/another-page".into(),
                "{}".into(),
            ],
        )
        .unwrap();
    let w1 = tx
        .insert("word", &["t".into(), "thing".into(), "thing".into()])
        .unwrap();
    let w2 = tx
        .insert("word", &["o".into(), "other".into(), "other".into()])
        .unwrap();
    tx.insert("page_words", &[p1.into(), w1.into(), 2.into()])
        .unwrap();
    tx.insert("page_words", &[p2.into(), w2.into(), 1.into()])
        .unwrap();
    tx.commit().unwrap();
    (p1, p2)
}

#[test]
fn generated_sql_matches_pinned_forms() {
    let eql = new_engine();

    let (query, args) = eql.to_sql("LOOKUP .ID, .Shasum ORDER BY .ID", &[]).unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"id\",\"be_eql_page\".\"shasum\" FROM \"be_eql_page\" ORDER BY \"be_eql_page\".\"id\" ASC;"
    );
    assert!(args.is_empty());

    let (query, args) = eql
        .to_sql("lookup .ID within .Language == 'ja'", &[])
        .unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"language\"=?;"
    );
    assert_eq!(args, vec![EqlValue::Text("ja".into())]);

    let (query, args) = eql
        .to_sql("lookup .id within .Url ^= \"/pages/\"", &[])
        .unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"url\" LIKE ?;"
    );
    assert_eq!(args, vec![EqlValue::Text("/pages/%".into())]);

    let (query, args) = eql
        .to_sql("lookup .id within .Type not ~= \"page blog\"", &[])
        .unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"type\" NOT LIKE ? OR \"be_eql_page\".\"type\" NOT LIKE ?;"
    );
    assert_eq!(
        args,
        vec![
            EqlValue::Text("%page%".into()),
            EqlValue::Text("%blog%".into())
        ]
    );

    let (query, args) = eql
        .to_sql(
            "LOOKUP .ID WITHIN .Shasum == {1}",
            &["1234567890".into()],
        )
        .unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"shasum\"=?;"
    );
    assert_eq!(args, vec![EqlValue::Text("1234567890".into())]);

    let (query, args) = eql
        .to_sql("LOOKUP .Shasum WITHIN word.Word == \"thing\"", &[])
        .unwrap();
    assert_eq!(
        query,
        "SELECT \"be_eql_page\".\"shasum\" FROM \"be_eql_page\" \
         INNER JOIN \"be_eql_page_words\" ON \"be_eql_page\".\"id\"=\"be_eql_page_words\".\"page_id\" \
         INNER JOIN \"be_eql_word\" ON \"be_eql_word\".\"id\"=\"be_eql_page_words\".\"word_id\" \
         WHERE \"be_eql_word\".\"word\"=?;"
    );
    assert_eq!(args, vec![EqlValue::Text("thing".into())]);
}

#[test]
fn lookups_over_live_data() {
    let eql = new_engine();
    let (p1, _) = seed(&eql);

    let (columns, rows) = eql.perform("LOOKUP .ID, .Shasum ORDER BY .ID", &[]).unwrap();
    assert_eq!(columns, vec!["id".to_string(), "shasum".to_string()]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], json!(p1));
    assert_eq!(rows[0]["shasum"], json!("1234567890"));

    let (_, rows) = eql
        .perform("LOOKUP .Shasum WITHIN word.Word == \"thing\"", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["shasum"], json!("1234567890"));

    let (_, rows) = eql
        .perform(
            "LOOKUP .ID WITHIN .Shasum == {1}",
            &["1234567890".into()],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(p1));

    let (_, rows) = eql
        .perform("lookup .shasum within .language IN ('en', 'ja') ORDER BY .id", &[])
        .unwrap();
    assert_eq!(rows.len(), 2);

    let (_, rows) = eql
        .perform("LOOKUP .Shasum ORDER BY .ID DSC LIMIT 1", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["shasum"], json!("0123456789"));

    let (_, rows) = eql
        .perform("LOOKUP .Shasum ORDER BY .ID OFFSET 1", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["shasum"], json!("0123456789"));

    let (columns, rows) = eql.perform("LOOKUP COUNT .ID", &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][&columns[0]], json!(2));

    let (_, rows) = eql
        .perform("QUERY WITHIN .language == 'en'", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["stub"], json!("{}"));
}

#[test]
fn joined_lookup_respects_negation() {
    let eql = new_engine();
    seed(&eql);

    let (_, rows) = eql
        .perform("lookup .shasum within .Type not *= \"blog\"", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["shasum"], json!("1234567890"));
}

#[test]
fn plan_reports_join_chain() {
    let eql = new_engine();
    let (brief, verbose) = eql
        .plan("LOOKUP .Shasum WITHIN word.Word == 'x'", &[])
        .unwrap();
    assert_eq!(
        brief,
        "[page, page.id=page_words.page_id, word.id=page_words.word_id]"
    );
    assert!(verbose.contains("JOIN[2]\tadd word\tword.id=page_words.word_id"));
}

#[test]
fn alias_round_trip_through_engine() {
    let eql = new_engine();
    seed(&eql);
    let (columns, rows) = eql
        .perform("LOOKUP .Shasum AS sum WITHIN sum == '1234567890'", &[])
        .unwrap();
    assert_eq!(columns, vec!["sum".to_string()]);
    assert_eq!(rows[0]["sum"], json!("1234567890"));
}

#[test]
fn query_requires_stub_column() {
    let config = Config::new("be_eql")
        .add_source(SourceConfig::new("page").string_value("shasum", 10));
    let eql = EnjinQl::new(config, Connection::open_in_memory().unwrap()).unwrap();
    assert!(matches!(
        eql.to_sql("QUERY", &[]),
        Err(EqlError::QueryRequiresStub)
    ));
}

#[test]
fn config_errors_surface_through_engine() {
    let config = Config::new("be_eql")
        .add_source(
            SourceConfig::new("page")
                .string_value("shasum", 10)
                .linked_value("word", "id"),
        )
        .add_source(SourceConfig::new("word").string_value("word", 256));
    match EnjinQl::new(config, Connection::open_in_memory().unwrap()) {
        Err(EqlError::Config(ConfigError::ParentNotFound { source_name, parent })) => {
            assert_eq!(source_name, "page");
            assert_eq!(parent, "word");
        }
        other => panic!("expected ParentNotFound, got {other:?}"),
    }
}

#[test]
fn to_sql_is_stable() {
    let eql = new_engine();
    let a = eql
        .to_sql("LOOKUP .Shasum WITHIN word.Word == 'x' ORDER BY .id", &[])
        .unwrap();
    let b = eql
        .to_sql("LOOKUP .Shasum WITHIN word.Word == 'x' ORDER BY .id", &[])
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn parsed_statements_render_back_to_eql() {
    let eql = new_engine();
    for input in [
        "LOOKUP .id, .shasum WITHIN (.language == 'en') OR (.type != 'blog') ORDER BY .id DESC OFFSET 2 LIMIT 4;",
        "QUERY WITHIN word.word ~= \"a b c\"",
        "LOOKUP COUNT DISTINCT word.word",
    ] {
        let parsed = eql.parse(input, &[]).unwrap();
        let rendered = parsed.to_string();
        let reparsed = eql.parse(&rendered, &[]).unwrap();
        assert_eq!(rendered, reparsed.to_string());
    }
}
