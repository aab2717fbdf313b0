use std::fmt::Write as _;

use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use super::ActionKind;

/// A catalog entry: wire name, description and the JSON schema of its fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCatalogEntry {
    #[serde(rename = "type")]
    pub name: &'static str,
    pub description: &'static str,
    pub param_schema: Value,
}

pub(super) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub(super) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema())
}

/// Every supported action, in wire order.
pub fn action_catalog() -> Vec<ActionCatalogEntry> {
    ActionKind::all()
        .iter()
        .map(|kind| ActionCatalogEntry {
            name: kind.name(),
            description: kind.description(),
            param_schema: kind.param_schema(),
        })
        .collect()
}

/// JSON array describing every action, served at `/api/schema`.
pub fn to_json_schema() -> Value {
    serde_json::to_value(action_catalog()).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// The machine-readable action reference embedded in every prompt.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    entries: Vec<ActionCatalogEntry>,
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ActionCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: action_catalog(),
        }
    }

    /// Render the reference text: one block per action with its field schema.
    pub fn render(&self) -> String {
        let mut out = String::from("Supported actions (each object carries its kind in \"type\"):\n");
        for (i, entry) in self.entries.iter().enumerate() {
            let schema = serde_json::to_string(&entry.param_schema).unwrap_or_else(|_| "{}".to_string());
            let _ = write!(
                out,
                "\n{}. {}\n   {}\n   Fields: {}\n",
                i + 1,
                entry.name,
                entry.description,
                schema
            );
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_every_kind() {
        let names: Vec<_> = action_catalog().iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                "editCell",
                "formatRange",
                "createTable",
                "createChart",
                "addWorksheet",
                "freezePanes"
            ]
        );
    }

    #[test]
    fn schemas_describe_fields() {
        let catalog = action_catalog();
        let edit = &catalog[0].param_schema;
        assert!(edit["properties"]["values"].is_object());
        assert!(edit["properties"]["isFormula"].is_object());
        let required = edit["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "values"));
    }

    #[test]
    fn json_schema_tags_entries_by_type() {
        let v = to_json_schema();
        assert_eq!(v[3]["type"], "createChart");
        assert!(v[3]["paramSchema"]["properties"]["chartType"].is_object());
    }

    #[test]
    fn render_mentions_each_action() {
        let text = ActionCatalog::builtin().render();
        for kind in ActionKind::all() {
            assert!(text.contains(kind.name()), "missing {kind}");
        }
        assert!(text.contains("#RRGGBB") || text.contains("0-9A-Fa-f"));
    }
}
