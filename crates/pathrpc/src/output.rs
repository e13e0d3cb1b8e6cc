use std::collections::BTreeSet;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::Value;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print one call result to stdout.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Pretty => println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        ),
        OutputFormat::Table => println!("{}", value_table(value)),
        OutputFormat::Raw => match value {
            Value::String(text) => print_raw(text.as_bytes()),
            other => println!("{other}"),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Objects become FIELD/VALUE rows, arrays of objects one row per element,
/// anything else a single RESULT cell.
fn value_table(value: &Value) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    match value {
        Value::Object(fields) => {
            table.set_header(vec!["FIELD", "VALUE"]);
            for (name, field) in fields {
                table.add_row(vec![name.clone(), cell(field)]);
            }
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let columns: BTreeSet<&str> = items
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|item| item.keys().map(String::as_str))
                .collect();
            table.set_header(columns.iter().copied().collect::<Vec<_>>());
            for item in items {
                table.add_row(
                    columns
                        .iter()
                        .map(|column| item.get(*column).map(cell).unwrap_or_default())
                        .collect::<Vec<_>>(),
                );
            }
        }
        other => {
            table.set_header(vec!["RESULT"]);
            table.add_row(vec![cell(other)]);
        }
    }
    table
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn object_renders_field_rows() {
        let rendered = value_table(&json!({"Id": "0", "Life": "alive"})).to_string();
        assert!(rendered.contains("FIELD"));
        assert!(rendered.contains("Life"));
        assert!(rendered.contains("alive"));
    }

    #[test]
    fn array_of_objects_uses_key_union_as_columns() {
        let rendered =
            value_table(&json!([{"Id": "0"}, {"Id": "1", "Series": "noble"}])).to_string();
        assert!(rendered.contains("Series"));
        assert!(rendered.contains("noble"));
        assert!(!rendered.contains("RESULT"));
    }

    #[test]
    fn scalars_render_as_single_cell() {
        let rendered = value_table(&json!("pong")).to_string();
        assert!(rendered.contains("RESULT"));
        assert!(rendered.contains("pong"));
        assert!(!rendered.contains("\"pong\""));
    }
}
