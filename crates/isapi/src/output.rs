//! Output formatting: JSON, compact JSON, YAML, or the device's XML.

use std::io::{self, Write};

use isapi_api::{Normalized, Presentation};
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Presentation to request from the client for a given output format.
pub fn presentation(format: OutputFormat) -> Presentation {
    match format {
        OutputFormat::Xml => Presentation::Text,
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => Presentation::Dict,
    }
}

/// Render a normalized response in the selected format.
pub fn render(format: OutputFormat, response: Normalized) -> Result<String, CliError> {
    match response {
        Normalized::Text(text) => Ok(text),
        other => render_value(format, &other.into_value()),
    }
}

pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::JsonCompact => serde_json::to_string(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_owned(),
        OutputFormat::Xml => match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other)?,
        },
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn formats_documents() {
        let doc = Normalized::Document(json!({"DeviceInfo": {"@version": "2.0", "deviceName": "cam"}}));

        let compact = render(OutputFormat::JsonCompact, doc.clone()).unwrap();
        assert_eq!(compact, r#"{"DeviceInfo":{"@version":"2.0","deviceName":"cam"}}"#);

        let yaml = render(OutputFormat::Yaml, doc).unwrap();
        assert!(yaml.contains("deviceName: cam"));
        assert!(!yaml.ends_with('\n'));
    }

    #[test]
    fn text_passes_through_unchanged() {
        let xml = "<ResponseStatus><statusCode>1</statusCode></ResponseStatus>";
        let out = render(OutputFormat::Xml, Normalized::Text(xml.into())).unwrap();
        assert_eq!(out, xml);
        assert_eq!(presentation(OutputFormat::Xml), Presentation::Text);
        assert_eq!(presentation(OutputFormat::Yaml), Presentation::Dict);
    }
}
