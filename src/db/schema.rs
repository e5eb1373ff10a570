//! Relational schema introspection.
//!
//! Lists every table of the connected store, describes its columns and runs
//! array-type inference on JSON and text columns.
//!
//! MySQL is read with `SHOW TABLES` and `SHOW FULL COLUMNS`, PostgreSQL
//! through `information_schema` and SQLite from `sqlite_master` plus
//! `PRAGMA table_info`. Primary-key columns are flagged; inference only looks
//! at the sampled rows.

use crate::db::connection::DbConnection;
use crate::db::inference::{apply_inferred, infer_array_type, inference_target};
use crate::error::{NlqError, NlqResult};
use crate::models::{FieldDescriptor, SchemaDescription};
use tracing::{debug, info, warn};

/// Schema inspector for relational stores.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Describe every table reachable through `conn`.
    ///
    /// `sample_rows` bounds the rows read per column for array inference.
    pub async fn describe(
        conn: &mut DbConnection,
        sample_rows: u32,
    ) -> NlqResult<SchemaDescription> {
        let tables = match conn {
            DbConnection::MySql(c) => mysql::list_tables(c).await?,
            DbConnection::Postgres(c) => postgres::list_tables(c).await?,
            DbConnection::SQLite(c) => sqlite::list_tables(c).await?,
        };

        let mut schema = SchemaDescription::new();
        for table in &tables {
            let columns = Self::describe_table(conn, table).await?;
            let columns = Self::infer_columns(conn, table, columns, sample_rows).await?;
            schema.insert(table.clone(), columns);
        }

        info!(
            store = %conn.store_kind(),
            tables = schema.len(),
            "Described relational schema"
        );
        Ok(schema)
    }

    /// Describe one table's columns in declaration order.
    pub async fn describe_table(
        conn: &mut DbConnection,
        table: &str,
    ) -> NlqResult<Vec<FieldDescriptor>> {
        let columns = match conn {
            DbConnection::MySql(c) => mysql::describe_columns(c, table).await?,
            DbConnection::Postgres(c) => postgres::describe_columns(c, table).await?,
            DbConnection::SQLite(c) => sqlite::describe_columns(c, table).await?,
        };
        if columns.is_empty() {
            return Err(NlqError::schema(
                format!("Table '{}' has no columns", table),
                table,
            ));
        }
        Ok(columns)
    }

    /// Read up to `limit` non-null values of a column as text.
    pub async fn sample_column(
        conn: &mut DbConnection,
        table: &str,
        column: &str,
        limit: u32,
    ) -> NlqResult<Vec<String>> {
        match conn {
            DbConnection::MySql(c) => mysql::sample_column(c, table, column, limit).await,
            DbConnection::Postgres(c) => postgres::sample_column(c, table, column, limit).await,
            DbConnection::SQLite(c) => sqlite::sample_column(c, table, column, limit).await,
        }
    }

    async fn infer_columns(
        conn: &mut DbConnection,
        table: &str,
        columns: Vec<FieldDescriptor>,
        sample_rows: u32,
    ) -> NlqResult<Vec<FieldDescriptor>> {
        let mut out = Vec::with_capacity(columns.len());
        for field in columns {
            let Some(target) = field.declared_type().and_then(inference_target) else {
                out.push(field);
                continue;
            };

            match Self::sample_column(conn, table, &field.name, sample_rows).await {
                Ok(values) => {
                    let inferred = infer_array_type(&values);
                    debug!(
                        table,
                        column = %field.name,
                        sampled = values.len(),
                        inferred = %inferred,
                        "Inferred column array type"
                    );
                    out.push(apply_inferred(field, target, inferred));
                }
                Err(e @ NlqError::Connection { .. }) => return Err(e),
                Err(e) => {
                    warn!(table, column = %field.name, error = %e, "Skipping array inference");
                    out.push(field);
                }
            }
        }
        Ok(out)
    }
}

/// Map a driver error raised while reading `object`'s structure.
///
/// Connectivity failures stay connection errors; everything else is an
/// introspection failure of that object.
fn introspection_error(object: &str) -> impl FnOnce(sqlx::Error) -> NlqError + '_ {
    move |err| match NlqError::from(err) {
        e @ NlqError::Connection { .. } => e,
        other => NlqError::schema(other.to_string(), object),
    }
}

fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key
        FROM information_schema.columns c
        JOIN pg_class t ON t.relname = c.table_name
        JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = 'public'
            AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1 AND c.table_schema = 'public'
        ORDER BY c.ordinal_position
        "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = "SHOW TABLES";

        // Field, Type, Collation, Null, Key, Default, Extra, Privileges, Comment
        pub const DESCRIBE_COLUMNS_PREFIX: &str = "SHOW FULL COLUMNS FROM ";
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type IN ('table', 'view')
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

// =============================================================================
// Store-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlConnection, MySqlRow};
    use sqlx::{Executor, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    /// Safely get an optional string from a MySQL row.
    fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get_unchecked::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    /// Safely get a string from a MySQL row by index.
    fn get_string_by_index(row: &MySqlRow, index: usize) -> Option<String> {
        row.try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get_unchecked::<Option<Vec<u8>>, _>(index)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    pub async fn list_tables(conn: &mut MySqlConnection) -> NlqResult<Vec<String>> {
        let rows = conn
            .fetch_all(queries::mysql::LIST_TABLES)
            .await
            .map_err(introspection_error("SHOW TABLES"))?;

        // SHOW TABLES returns a single column "Tables_in_<db>"
        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| get_string_by_index(row, 0))
            .filter(|name| !name.is_empty())
            .collect();

        debug!(count = tables.len(), "Listed MySQL tables");
        Ok(tables)
    }

    pub async fn describe_columns(
        conn: &mut MySqlConnection,
        table: &str,
    ) -> NlqResult<Vec<FieldDescriptor>> {
        let sql = format!(
            "{}{}",
            queries::mysql::DESCRIBE_COLUMNS_PREFIX,
            quote_backtick(table)
        );
        let rows = conn
            .fetch_all(sql.as_str())
            .await
            .map_err(introspection_error(table))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "Field");
                let column_type = get_string(row, "Type");
                let nullable = get_string(row, "Null") == "YES";

                let mut col = FieldDescriptor::column(name, column_type, nullable)
                    .with_key(get_string(row, "Key"))
                    .with_extra(get_string(row, "Extra"));
                if let Some(default) = get_optional_string(row, "Default") {
                    col = col.with_default(default);
                }
                col
            })
            .collect())
    }

    pub async fn sample_column(
        conn: &mut MySqlConnection,
        table: &str,
        column: &str,
        limit: u32,
    ) -> NlqResult<Vec<String>> {
        let col = quote_backtick(column);
        let sql = format!(
            "SELECT CAST({col} AS CHAR) FROM {} WHERE {col} IS NOT NULL LIMIT {}",
            quote_backtick(table),
            limit
        );
        let rows = conn
            .fetch_all(sql.as_str())
            .await
            .map_err(introspection_error(table))?;
        Ok(rows
            .iter()
            .filter_map(|row| get_string_by_index(row, 0))
            .collect())
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgConnection;
    use sqlx::{Executor, Row};

    pub async fn list_tables(conn: &mut PgConnection) -> NlqResult<Vec<String>> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(&mut *conn)
            .await
            .map_err(introspection_error("information_schema.tables"))?;

        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("table_name").ok())
            .filter(|name| !name.is_empty())
            .collect();

        debug!(count = tables.len(), "Listed PostgreSQL tables");
        Ok(tables)
    }

    pub async fn describe_columns(
        conn: &mut PgConnection,
        table: &str,
    ) -> NlqResult<Vec<FieldDescriptor>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(introspection_error(table))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("column_name").map_err(introspection_error(table))?;
                let column_type: String =
                    row.try_get("column_type").map_err(introspection_error(table))?;
                let nullable: String = row.try_get("is_nullable").unwrap_or_default();
                let default_value: Option<String> = row.try_get("column_default").ok().flatten();
                let is_pk: bool = row.try_get("is_primary_key").unwrap_or(false);

                let mut col = FieldDescriptor::column(name, column_type, nullable == "YES");
                if is_pk {
                    col = col.with_key("PRI");
                }
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok(col)
            })
            .collect()
    }

    pub async fn sample_column(
        conn: &mut PgConnection,
        table: &str,
        column: &str,
        limit: u32,
    ) -> NlqResult<Vec<String>> {
        let col = quote_double(column);
        let sql = format!(
            "SELECT {col}::text FROM public.{} WHERE {col} IS NOT NULL LIMIT {}",
            quote_double(table),
            limit
        );
        let rows = conn
            .fetch_all(sql.as_str())
            .await
            .map_err(introspection_error(table))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<Option<String>, _>(0).ok().flatten())
            .collect())
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteConnection;
    use sqlx::{Executor, Row};

    pub async fn list_tables(conn: &mut SqliteConnection) -> NlqResult<Vec<String>> {
        let rows = conn
            .fetch_all(queries::sqlite::LIST_TABLES)
            .await
            .map_err(introspection_error("sqlite_master"))?;

        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect();

        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    pub async fn describe_columns(
        conn: &mut SqliteConnection,
        table: &str,
    ) -> NlqResult<Vec<FieldDescriptor>> {
        let pragma_query = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
        let rows = conn
            .fetch_all(pragma_query.as_str())
            .await
            .map_err(introspection_error(table))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("name").unwrap_or_default();
                let data_type: String = row.try_get("type").unwrap_or_default();
                let notnull: i32 = row.try_get("notnull").unwrap_or(0);
                let default_value: Option<String> = row.try_get("dflt_value").ok().flatten();
                let pk: i32 = row.try_get("pk").unwrap_or(0);

                let mut col = FieldDescriptor::column(name, data_type, notnull == 0);
                if pk > 0 {
                    col = col.with_key("PRI");
                }
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                col
            })
            .collect())
    }

    pub async fn sample_column(
        conn: &mut SqliteConnection,
        table: &str,
        column: &str,
        limit: u32,
    ) -> NlqResult<Vec<String>> {
        let col = quote_double(column);
        let sql = format!(
            "SELECT CAST({col} AS TEXT) FROM {} WHERE {col} IS NOT NULL LIMIT {}",
            quote_double(table),
            limit
        );
        let rows = conn
            .fetch_all(sql.as_str())
            .await
            .map_err(introspection_error(table))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<Option<String>, _>(0).ok().flatten())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypeTag;
    use sqlx::Executor;

    async fn seeded() -> DbConnection {
        let mut conn = DbConnection::open("sqlite::memory:").await.unwrap();
        let DbConnection::SQLite(c) = &mut conn else {
            unreachable!()
        };
        c.execute(
            "CREATE TABLE courses (
                id INTEGER PRIMARY KEY,
                title VARCHAR(100) NOT NULL DEFAULT 'untitled',
                students JSON,
                tags TEXT,
                notes TEXT,
                scores JSON,
                empty_list JSON
            );
            INSERT INTO courses (id, title, students, tags, notes, scores) VALUES
                (1, 'Rust', '[\"Alice\", \"Bob\"]', '[\"systems\"]', 'hello', '[1, 2]'),
                (2, 'Go', '[\"Carol\"]', '[\"web\"]', 'world', '[3]');",
        )
        .await
        .unwrap();
        conn
    }

    fn field<'a>(schema: &'a SchemaDescription, table: &str, name: &str) -> &'a FieldDescriptor {
        schema
            .get(table)
            .unwrap()
            .iter()
            .find(|f| f.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_schema_with_inference() {
        let mut conn = seeded().await;
        let schema = SchemaInspector::describe(&mut conn, 20).await.unwrap();

        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["courses"]);

        let id = field(&schema, "courses", "id");
        assert_eq!(id.type_tag, TypeTag::Column("INTEGER".to_string()));
        assert_eq!(id.key.as_deref(), Some("PRI"));

        let title = field(&schema, "courses", "title");
        assert_eq!(title.nullable, Some(false));
        assert_eq!(title.default.as_deref(), Some("'untitled'"));

        assert_eq!(field(&schema, "courses", "students").type_tag, TypeTag::ArrayOfString);
        assert_eq!(field(&schema, "courses", "tags").type_tag, TypeTag::ArrayOfString);
        assert_eq!(field(&schema, "courses", "scores").type_tag, TypeTag::ArrayOfInt);
        assert_eq!(field(&schema, "courses", "empty_list").type_tag, TypeTag::EmptyArray);

        // Free text keeps its declared type instead of becoming invalid_json
        let notes = field(&schema, "courses", "notes");
        assert_eq!(notes.type_tag, TypeTag::Column("TEXT".to_string()));

        conn.close().await;
    }

    #[tokio::test]
    async fn test_sample_column_respects_limit() {
        let mut conn = seeded().await;
        let values = SchemaInspector::sample_column(&mut conn, "courses", "title", 1)
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_is_introspection_error() {
        let mut conn = seeded().await;
        let err = SchemaInspector::describe_table(&mut conn, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, NlqError::SchemaIntrospection { .. }));
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_backtick("a`b"), "`a``b`");
        assert_eq!(quote_double("a\"b"), "\"a\"\"b\"");
    }
}
