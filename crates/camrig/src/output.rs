//! Output formatting: table, JSON, YAML.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render a list of items in the chosen format. Tables go through `to_row`,
/// structured formats serialize the items themselves.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Json => render_json(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Output(e.to_string()))
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Output(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: &'static str,
        ports: u16,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn row(item: &Item) -> Row {
        Row {
            name: item.name.into(),
        }
    }

    #[test]
    fn table_uses_row_view() {
        let data = [Item {
            name: "eth0",
            ports: 8,
        }];
        let out = render_list(OutputFormat::Table, &data, row).unwrap();
        assert!(out.contains("Name"));
        assert!(out.contains("eth0"));
        assert!(!out.contains('8'));
    }

    #[test]
    fn json_serializes_items() {
        let data = [Item {
            name: "eth0",
            ports: 8,
        }];
        let out = render_list(OutputFormat::Json, &data, row).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["ports"], 8);
    }

    #[test]
    fn yaml_serializes_items() {
        let data = [Item {
            name: "eth1",
            ports: 4,
        }];
        let out = render_list(OutputFormat::Yaml, &data, row).unwrap();
        assert!(out.contains("name: eth1"));
        assert!(out.contains("ports: 4"));
    }
}
