pub mod console;
pub mod json;
pub mod sarif;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ScanReport;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
    Sarif,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Some(Self::Console),
            "json" => Some(Self::Json),
            "sarif" => Some(Self::Sarif),
            _ => None,
        }
    }
}

/// Render a report in the specified format. Every format is deterministic:
/// rendering the same report twice yields identical bytes.
pub fn render(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render(report)),
        OutputFormat::Json => json::render(report),
        OutputFormat::Sarif => sarif::render(report),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    #[test]
    fn every_format_renders_identically_twice() {
        let report = testing::report(vec![
            testing::finding("f097.window_open_tabnabbing", Severity::Low, 3),
            testing::finding("f009.hardcoded_secret", Severity::High, 1),
        ]);
        for format in [OutputFormat::Console, OutputFormat::Json, OutputFormat::Sarif] {
            let first = render(&report, format).unwrap();
            let second = render(&report, format).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn lenient_format_names() {
        assert_eq!(OutputFormat::from_str_lenient("SARIF"), Some(OutputFormat::Sarif));
        assert_eq!(OutputFormat::from_str_lenient("text"), Some(OutputFormat::Console));
        assert_eq!(OutputFormat::from_str_lenient("html"), None);
    }
}
