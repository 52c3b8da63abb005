//! Diagnostic renderer for build-tool output

use super::{Diagnostic, Location, Severity};

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text with a source frame when the source is available
    Text,
    /// JSON format for programmatic consumption
    Json,
    /// JSON with pretty-printing
    JsonPretty,
}

/// Renders diagnostics against the source they were reported for
pub struct DiagnosticRenderer<'a> {
    source_name: &'a str,
    source: Option<&'a str>,
    output_format: OutputFormat,
}

impl<'a> DiagnosticRenderer<'a> {
    /// Create a text renderer for the named source
    pub fn new(source_name: &'a str) -> Self {
        Self {
            source_name,
            source: None,
            output_format: OutputFormat::Text,
        }
    }

    /// Attach the source text so code frames can be shown
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Render every diagnostic with the configured output format
    pub fn render_all(&self, diagnostics: &[Diagnostic]) -> String {
        match self.output_format {
            OutputFormat::Text => diagnostics
                .iter()
                .map(|d| self.render_text(d))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Json => serde_json::to_string(diagnostics)
                .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {e}\"}}")),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(diagnostics)
                .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {e}\"}}")),
        }
    }

    /// Render a diagnostic with text formatting
    pub fn render_text(&self, diagnostic: &Diagnostic) -> String {
        let severity = match diagnostic.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };

        let mut output = format!(
            "{severity}[{}]: {}\n  --> {}:{}\n",
            diagnostic.subject, diagnostic.message, self.source_name, diagnostic.location
        );

        if let Some(frame) = self.render_code_frame(&diagnostic.location) {
            output.push_str(&frame);
        }

        output
    }

    /// Render the offending source line with a caret under the column
    fn render_code_frame(&self, location: &Location) -> Option<String> {
        let source = self.source?;
        if !location.is_known() {
            return None;
        }

        let line_num = location.line as usize;
        let line = source.lines().nth(line_num - 1)?;
        let gutter_width = line_num.to_string().len();

        let mut frame = String::new();
        frame.push_str(&format!("{line_num:>gutter_width$} | {line}\n"));
        frame.push_str(&" ".repeat(gutter_width));
        frame.push_str(" | ");
        frame.push_str(&" ".repeat((location.column as usize).saturating_sub(1)));
        frame.push_str("^\n");
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_with_frame() {
        let source = ".a { color: red; }\n.unknown { color: blue; }\n";
        let diagnostic = Diagnostic::warning(
            "Class has no declared accessor",
            "unknown",
            Location::new(2, 1, 19),
        );

        let rendered = DiagnosticRenderer::new("main.css")
            .with_source(source)
            .render_text(&diagnostic);

        assert_eq!(
            rendered,
            "warning[unknown]: Class has no declared accessor\n  --> main.css:2:1\n2 | .unknown { color: blue; }\n  | ^\n"
        );
    }

    #[test]
    fn test_render_json() {
        let diagnostic = Diagnostic::warning("Unused accessor", "title", Location::unknown());
        let rendered = DiagnosticRenderer::new("main.css")
            .with_format(OutputFormat::Json)
            .render_all(&[diagnostic]);

        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["severity"], "warning");
        assert_eq!(value[0]["subject"], "title");
    }
}
