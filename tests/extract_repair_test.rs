//! Extraction, repair and classification working together on model output.

use nl2query::models::{Dialect, FieldDescriptor, GeneratedQuery, SchemaDescription, TypeTag};
use nl2query::pipeline::{RepairPass, classify, extract_query};

fn school_schema() -> SchemaDescription {
    let mut schema = SchemaDescription::new();
    schema.insert(
        "students",
        vec![
            FieldDescriptor::new("id", TypeTag::Column("int".to_string())),
            FieldDescriptor::new("name", TypeTag::Column("varchar(64)".to_string())),
            FieldDescriptor::new("courses", TypeTag::ArrayOfString),
            FieldDescriptor::new("course_ids", TypeTag::ArrayOfInt),
        ],
    );
    schema.insert(
        "courses",
        vec![
            FieldDescriptor::new("course_id", TypeTag::Column("int".to_string())),
            FieldDescriptor::new("name", TypeTag::Column("varchar(64)".to_string())),
        ],
    );
    schema
}

/// Run the text stages the way the pipeline does.
fn post_process(raw: &str, dialect: Dialect) -> GeneratedQuery {
    let candidate = extract_query(raw);
    let candidate = if dialect.is_relational() {
        RepairPass::default().apply(&candidate, dialect, &school_schema())
    } else {
        candidate
    };
    classify(&candidate, dialect)
}

#[test]
fn test_membership_by_id_rewritten_for_name_arrays() {
    let raw = "```sql\nSELECT s.id FROM students s JOIN courses c \
               ON JSON_CONTAINS(s.courses, CAST(c.course_id AS JSON))\n```";
    assert_eq!(
        post_process(raw, Dialect::MySql),
        GeneratedQuery::Relational(
            "SELECT s.id FROM students s JOIN courses c \
             ON JSON_CONTAINS(s.courses, JSON_QUOTE(c.name))"
                .to_string()
        )
    );
}

#[test]
fn test_membership_by_id_kept_for_integer_arrays() {
    let sql = "SELECT s.id FROM students s JOIN courses c \
               ON JSON_CONTAINS(s.course_ids, CAST(c.course_id AS JSON))";
    assert_eq!(
        post_process(sql, Dialect::MySql),
        GeneratedQuery::Relational(sql.to_string())
    );
}

#[test]
fn test_postgres_cast_rewritten_for_mysql_only() {
    let sql = "SELECT * FROM students WHERE JSON_CONTAINS(courses, '\"math\"'::jsonb)";
    assert_eq!(
        post_process(sql, Dialect::MySql).text(),
        "SELECT * FROM students WHERE JSON_CONTAINS(courses, JSON_QUOTE('\"math\"'))"
    );
    assert_eq!(post_process(sql, Dialect::Postgres).text(), sql);
}

#[test]
fn test_repair_is_stable_on_its_own_output() {
    let repair = RepairPass::default();
    let schema = school_schema();
    let inputs = [
        "SELECT CAST(s.id AS JSON) FROM students s",
        "SELECT JSON_QUOTE(s.name) FROM students s",
        "SELECT CAST(CONCAT(s.name, '!') AS JSON) FROM students s",
        "SELECT * FROM students s WHERE JSON_CONTAINS(s.courses, CAST(c.course_id AS JSON))",
        "SELECT * FROM students WHERE JSON_CONTAINS(courses, '\"a''b\"'::json)",
    ];
    for input in inputs {
        let once = repair.apply(input, Dialect::MySql, &schema);
        let twice = repair.apply(&once, Dialect::MySql, &schema);
        assert_eq!(once, twice, "unstable on {}", input);
    }
}

#[test]
fn test_identifier_casts_survive_round_trip() {
    let sql = "SELECT CAST(s.id AS JSON) FROM students s";
    assert_eq!(post_process(sql, Dialect::MySql).text(), sql);
}

#[test]
fn test_document_output_is_never_repaired() {
    let raw = "```python\nresult = db['students'].find({'x': \"CAST(a.id AS JSON)\"})\n```";
    assert_eq!(
        post_process(raw, Dialect::MongoDb),
        GeneratedQuery::Document("db['students'].find({'x': \"CAST(a.id AS JSON)\"})".to_string())
    );
}

#[test]
fn test_assignment_kept_for_relational_text() {
    assert_eq!(
        extract_query("result = SELECT 1"),
        "result = SELECT 1"
    );
}
