//! Result formatting and the `--output` / `-o` global argument.

use std::str::FromStr;
use std::sync::Arc;

use colored::Colorize;
use serde_json::Value;

use crate::arguments::{ArgType, CommandArgument};
use crate::errors::{CliError, CliResult};
use crate::events::{EventPayload, EventRegistry, EVENT_PARSER_GLOBAL_CREATE};
use crate::util::CommandResultItem;

/// Dest of the `--output` global argument. Underscore-prefixed so handlers
/// never see it.
pub const OUTPUT_FORMAT_DEST: &str = "_output_format";

pub const OUTPUT_FORMATS: &[&str] = &["json", "jsonc", "table", "tsv"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonColor,
    Table,
    Tsv,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "jsonc" => Ok(OutputFormat::JsonColor),
            "table" => Ok(OutputFormat::Table),
            "tsv" => Ok(OutputFormat::Tsv),
            other => Err(CliError::config(format!("Invalid output format '{}'.", other))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OutputProducer;

impl OutputProducer {
    /// Registers `--output/-o` as a global argument. The default comes from
    /// the `core.output` config option, resolved once at CLI construction.
    pub fn register(events: &mut EventRegistry, default_format: &str) {
        let default_format = default_format.to_string();
        events.register(
            EVENT_PARSER_GLOBAL_CREATE,
            Arc::new(move |payload: &mut EventPayload<'_>| {
                if let EventPayload::GlobalArguments(global) = payload {
                    if let Ok(arg) = CommandArgument::new(
                        OUTPUT_FORMAT_DEST,
                        ArgType::new()
                            .options(&["--output", "-o"])
                            .choices(OUTPUT_FORMATS)
                            .default_value(default_format.clone())
                            .help("Output format."),
                    ) {
                        global.add(arg);
                    }
                }
            }),
        );
    }

    pub fn produce(&self, item: &CommandResultItem, format: OutputFormat) -> CliResult<String> {
        match format {
            OutputFormat::Json => format_json(&item.result, false),
            OutputFormat::JsonColor => format_json(&item.result, true),
            OutputFormat::Table => {
                // A query-filtered result is rendered as-is; the transformer
                // only applies to the handler's natural shape.
                let shaped = match &item.table_transformer {
                    Some(transformer) if !item.is_query_active => transformer(&item.result),
                    _ => item.result.clone(),
                };
                Ok(format_table(&shaped))
            }
            OutputFormat::Tsv => Ok(format_tsv(&item.result)),
        }
    }
}

fn format_json(value: &Value, color: bool) -> CliResult<String> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::config(format!("Failed to serialize result: {}", e)))?;
    if !color {
        return Ok(rendered + "\n");
    }
    // Line-wise colorization: keys cyan, everything else as-is.
    let colored: Vec<String> = rendered
        .lines()
        .map(|line| match line.split_once(':') {
            Some((key, rest)) if key.trim_start().starts_with('"') => {
                format!("{}:{}", key.cyan(), rest)
            }
            _ => line.to_string(),
        })
        .collect();
    Ok(colored.join("\n") + "\n")
}

/// Rows for tabular output: an array of objects becomes one row each, a
/// single object becomes one row. Nested values are skipped.
fn rows_of(value: &Value) -> Vec<&serde_json::Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

fn cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn format_table(value: &Value) -> String {
    let rows = rows_of(value);
    if rows.is_empty() {
        return match cell(value) {
            Some(scalar) => scalar + "\n",
            None => String::new(),
        };
    }
    // Column order follows the first row.
    let headers: Vec<&String> = rows[0]
        .iter()
        .filter(|(_, v)| cell(v).is_some())
        .map(|(k, _)| k)
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    let mut body: Vec<Vec<String>> = Vec::new();
    for row in &rows {
        let mut cells = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            let text = row
                .get(*header)
                .and_then(cell)
                .unwrap_or_default();
            widths[index] = widths[index].max(text.len());
            cells.push(text);
        }
        body.push(cells);
    }
    let mut out = String::new();
    for (header, width) in headers.iter().zip(&widths) {
        out.push_str(&format!("{:<width$}  ", capitalize(header), width = width));
    }
    out.push('\n');
    for width in &widths {
        out.push_str(&format!("{}  ", "-".repeat(*width)));
    }
    out.push('\n');
    for cells in body {
        for (text, width) in cells.iter().zip(&widths) {
            out.push_str(&format!("{:<width$}  ", text, width = width));
        }
        out.push('\n');
    }
    out
}

fn format_tsv(value: &Value) -> String {
    let rows = rows_of(value);
    if rows.is_empty() {
        return match cell(value) {
            Some(scalar) => scalar + "\n",
            None => String::new(),
        };
    }
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row.values().filter_map(cell).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(result: Value) -> CommandResultItem {
        CommandResultItem {
            result,
            table_transformer: None,
            is_query_active: false,
        }
    }

    #[test]
    fn test_json_output() {
        let producer = OutputProducer;
        let rendered = producer
            .produce(&item(json!({"name": "a", "size": 3})), OutputFormat::Json)
            .unwrap();
        assert!(rendered.contains("\"name\": \"a\""));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_table_output_aligns_columns() {
        let producer = OutputProducer;
        let rendered = producer
            .produce(
                &item(json!([
                    {"name": "first", "size": 1},
                    {"name": "b", "size": 20}
                ])),
                OutputFormat::Table,
            )
            .unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].contains("Name"));
        assert!(lines[0].contains("Size"));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].starts_with("first"));
    }

    #[test]
    fn test_table_transformer_applied() {
        let producer = OutputProducer;
        let result = CommandResultItem {
            result: json!([{"name": "x", "internal": {"deep": 1}}]),
            table_transformer: Some(Arc::new(|v: &Value| {
                json!([{ "label": v[0]["name"] }])
            })),
            is_query_active: false,
        };
        let rendered = producer.produce(&result, OutputFormat::Table).unwrap();
        assert!(rendered.contains("Label"));
        assert!(rendered.contains('x'));
        assert!(!rendered.contains("internal"));
    }

    #[test]
    fn test_tsv_output() {
        let producer = OutputProducer;
        let rendered = producer
            .produce(
                &item(json!([{"a": "1", "b": "2"}, {"a": "3", "b": "4"}])),
                OutputFormat::Tsv,
            )
            .unwrap();
        assert_eq!(rendered, "1\t2\n3\t4\n");
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
    }
}
