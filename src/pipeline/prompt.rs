//! Prompt construction.
//!
//! Pure function of (schema, dialect, question). The schema is rendered as
//! pretty JSON from a sorted map, so identical inputs give identical bytes.

use crate::models::{Dialect, SchemaDescription};
use serde::{Deserialize, Serialize};

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A composed model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Messages in send order: system instructions, then the question.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

// =============================================================================
// Instruction blocks
// =============================================================================

const GENERAL_RULES: &str = "\
General rules:
- Only output the final query code, do not include any explanations, comments, or natural language.
- Always use the table/collection and column/field names exactly as provided in the schema.
- Never use or assume any field, table, or relationship that does not appear in the schema.
- If unsure, generate the simplest and safest query possible.
- Always wrap your output in a single code block (```sql ... ``` for SQL, ```python ... ``` for MongoDB).";

const MYSQL_RULES: &str = "\
For MySQL queries:
- Use standard MySQL syntax only.
- Do not use PostgreSQL or any other database-specific syntax (no ::json casts).
- Only use table and column names that appear in the schema. Do not assume any extra fields or relationships.
- If you need to join tables, only use columns that exist in both tables as shown in the schema. Do not assume foreign keys unless they are explicitly present in the schema.
- Columns typed array<string> hold JSON arrays of names; match members with JSON_CONTAINS(column, JSON_QUOTE(value)).
- If the query is about \"the most\", \"the least\" or \"top N\", always use ORDER BY and LIMIT.
- If the query cannot be generated with the given schema, output a simple SELECT statement from an existing table.
- Never generate queries that cannot be executed with the provided schema.";

const POSTGRES_RULES: &str = "\
For PostgreSQL queries:
- Use standard PostgreSQL syntax only.
- Quote identifiers with double quotes only when they are not lower case.
- Only use table and column names that appear in the schema. Do not assume any extra fields or relationships.
- If the query is about \"the most\", \"the least\" or \"top N\", always use ORDER BY and LIMIT.
- If the query cannot be generated with the given schema, output a simple SELECT statement from an existing table.";

const MONGODB_RULES: &str = "\
For MongoDB queries:
- Use Python syntax for MongoDB queries (PyMongo style).
- Start with db[\"collection_name\"].
- Always output a complete and executable query. Never output incomplete code (e.g., do not end with an open bracket).
- If you use aggregate, the pipeline must be complete and valid. If you cannot generate a complete and valid aggregate pipeline, you MUST output a simple find query instead, such as db[\"collection_name\"].find({}).
- Never output only the beginning of an aggregate statement. Outputting only db[\"collection_name\"].aggregate([ is strictly forbidden.
- Only these forms are accepted:
    db[\"c\"].find(filter, projection) optionally followed by .sort(field, 1 or -1), .skip(n), .limit(n)
    db[\"c\"].find_one(filter, projection)
    db[\"c\"].aggregate([stage, ...])
    db[\"c\"].count_documents(filter)
    db[\"c\"].distinct(\"field\", filter)
- Operands must be literal dicts, lists, strings, numbers, True, False or None. Do not call any other function.";

fn dialect_rules(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::MySql => MYSQL_RULES,
        Dialect::Postgres => POSTGRES_RULES,
        Dialect::MongoDb => MONGODB_RULES,
    }
}

/// Build the prompt for `question` against `schema`.
pub fn build_prompt(schema: &SchemaDescription, dialect: Dialect, question: &str) -> Prompt {
    let system = format!(
        "You are a professional database query generator. Your task is to convert the following \
         natural language query into a valid database query, based on the provided schema.\n\
         The target database type is {}.\n\n{}\n\n{}\n\nSchema:\n{}\n",
        dialect.display_name(),
        GENERAL_RULES,
        dialect_rules(dialect),
        schema.to_pretty_json(),
    );

    Prompt {
        system,
        user: question.to_string(),
    }
}
