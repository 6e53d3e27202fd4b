//! One fixed template per artifact kind, rendered from an introspected
//! schema. Output is plain Rust source for the consuming application.

use super::{type_name, ArtifactKind, ArtifactSpec};
use crate::schema::{ColumnDescriptor, TableSchema};

pub fn render(kind: ArtifactKind, spec: &ArtifactSpec, schema: &TableSchema) -> String {
    match kind {
        ArtifactKind::Model => render_model(spec, schema),
        ArtifactKind::Controller => render_controller(spec, schema),
        ArtifactKind::Resource => render_resource(spec, schema),
        ArtifactKind::Seeder => render_seeder(spec, schema),
        ArtifactKind::Factory => render_factory(spec, schema),
    }
}

fn field_type(col: &ColumnDescriptor) -> String {
    let base = col.semantic_type.rust_type();
    if col.nullable {
        format!("Option<{}>", base)
    } else {
        base.to_string()
    }
}

fn header(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    format!(
        "// Generated for table `{}` in database `{}` ({}).\n\n",
        schema.table, schema.database, spec.qualified_name
    )
}

fn render_model(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    let name = type_name(ArtifactKind::Model, &schema.table);
    let mut out = header(spec, schema);
    out.push_str("use serde::{Deserialize, Serialize};\n\n");
    out.push_str("#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]\n");
    out.push_str(&format!("pub struct {} {{\n", name));
    for col in &schema.columns {
        out.push_str(&format!("    pub {}: {},\n", col.name, field_type(col)));
    }
    out.push_str("}\n\n");
    out.push_str(&format!("impl {} {{\n", name));
    out.push_str(&format!(
        "    pub const TABLE: &'static str = \"{}\";\n",
        schema.table
    ));
    if let Some(pk) = &schema.primary_key {
        out.push_str(&format!(
            "    pub const PRIMARY_KEY: &'static str = \"{}\";\n",
            pk
        ));
    }
    out.push_str("}\n");
    out
}

fn render_controller(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    let model = type_name(ArtifactKind::Model, &schema.table);
    let name = type_name(ArtifactKind::Controller, &schema.table);
    let pk_type = schema
        .primary_key
        .as_ref()
        .and_then(|pk| schema.column(pk))
        .map(|c| c.semantic_type.rust_type())
        .unwrap_or("i64");
    let mut out = header(spec, schema);
    out.push_str(&format!(
        "use super::super::models::{};\nuse sqlx::PgPool;\n\n",
        model
    ));
    out.push_str(&format!("pub struct {};\n\n", name));
    out.push_str(&format!("impl {} {{\n", name));
    out.push_str(&format!(
        "    pub async fn index(pool: &PgPool) -> Result<Vec<{model}>, sqlx::Error> {{\n        sqlx::query_as::<_, {model}>(\"SELECT * FROM \\\"{table}\\\"\")\n            .fetch_all(pool)\n            .await\n    }}\n\n",
        model = model,
        table = schema.table
    ));
    if let Some(pk) = &schema.primary_key {
        out.push_str(&format!(
            "    pub async fn show(pool: &PgPool, id: {pk_type}) -> Result<Option<{model}>, sqlx::Error> {{\n        sqlx::query_as::<_, {model}>(\"SELECT * FROM \\\"{table}\\\" WHERE \\\"{pk}\\\" = $1\")\n            .bind(id)\n            .fetch_optional(pool)\n            .await\n    }}\n",
            model = model,
            table = schema.table,
            pk = pk,
            pk_type = pk_type
        ));
    }
    out.push_str("}\n");
    out
}

fn render_resource(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    let model = type_name(ArtifactKind::Model, &schema.table);
    let name = type_name(ArtifactKind::Resource, &schema.table);
    let mut out = header(spec, schema);
    out.push_str(&format!(
        "use super::super::models::{};\nuse serde::Serialize;\n\n",
        model
    ));
    out.push_str("#[derive(Serialize)]\n");
    out.push_str(&format!("pub struct {}<'a> {{\n", name));
    for col in &schema.columns {
        out.push_str(&format!("    pub {}: &'a {},\n", col.name, field_type(col)));
    }
    out.push_str("}\n\n");
    out.push_str(&format!("impl<'a> From<&'a {}> for {}<'a> {{\n", model, name));
    out.push_str(&format!("    fn from(row: &'a {}) -> Self {{\n", model));
    out.push_str(&format!("        {} {{\n", name));
    for col in &schema.columns {
        out.push_str(&format!("            {0}: &row.{0},\n", col.name));
    }
    out.push_str("        }\n    }\n}\n");
    out
}

fn render_seeder(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    let name = type_name(ArtifactKind::Seeder, &schema.table);
    let insertable: Vec<&ColumnDescriptor> = schema
        .columns
        .iter()
        .filter(|c| !c.is_primary_key && !c.has_default)
        .collect();
    let columns = insertable
        .iter()
        .map(|c| format!("\\\"{}\\\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=insertable.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = header(spec, schema);
    out.push_str("use sqlx::PgPool;\n\n");
    out.push_str(&format!("pub struct {};\n\n", name));
    out.push_str(&format!("impl {} {{\n", name));
    out.push_str("    /// Insert one sample row per call. Fill in the binds below.\n");
    out.push_str("    pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {\n");
    if insertable.is_empty() {
        out.push_str(&format!(
            "        sqlx::query(\"INSERT INTO \\\"{}\\\" DEFAULT VALUES\")\n",
            schema.table
        ));
    } else {
        out.push_str(&format!(
            "        sqlx::query(\"INSERT INTO \\\"{}\\\" ({}) VALUES ({})\")\n",
            schema.table, columns, placeholders
        ));
        for col in &insertable {
            out.push_str(&format!(
                "            .bind(todo!(\"{}: {}\"))\n",
                col.name,
                col.semantic_type.rust_type()
            ));
        }
    }
    out.push_str("            .execute(pool)\n            .await?;\n        Ok(())\n    }\n}\n");
    out
}

fn render_factory(spec: &ArtifactSpec, schema: &TableSchema) -> String {
    let model = type_name(ArtifactKind::Model, &schema.table);
    let name = type_name(ArtifactKind::Factory, &schema.table);
    let mut out = header(spec, schema);
    out.push_str(&format!(
        "use super::super::models::{};\n\n",
        model
    ));
    out.push_str(&format!("pub struct {};\n\n", name));
    out.push_str(&format!("impl {} {{\n", name));
    out.push_str("    /// Build a sample row. Replace the placeholder values.\n");
    out.push_str(&format!("    pub fn make() -> {} {{\n", model));
    out.push_str(&format!("        {} {{\n", model));
    for col in &schema.columns {
        let value = if col.nullable {
            "None".to_string()
        } else {
            sample_value(col)
        };
        out.push_str(&format!("            {}: {},\n", col.name, value));
    }
    out.push_str("        }\n    }\n}\n");
    out
}

fn sample_value(col: &ColumnDescriptor) -> String {
    use crate::schema::SemanticType;
    match col.semantic_type {
        SemanticType::Integer => "0".into(),
        SemanticType::Decimal => "0.0".into(),
        SemanticType::Text => format!("\"{}\".to_string()", col.name),
        SemanticType::Boolean => "false".into(),
        SemanticType::Timestamp => "chrono::Utc::now().naive_utc()".into(),
        SemanticType::Date => "chrono::Utc::now().date_naive()".into(),
        SemanticType::Uuid => "uuid::Uuid::new_v4()".into(),
        SemanticType::Json | SemanticType::Unknown => "serde_json::Value::Null".into(),
    }
}
