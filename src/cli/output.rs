use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use crate::models::OutputFormat;
use crate::pipeline::RunStats;

pub trait Formatter {
    fn format_run_stats(&self, stats: &RunStats) -> String;
    fn format_candidates(&self, candidates: &[PathBuf]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_run_stats(&self, stats: &RunStats) -> String {
        let mut output = String::new();
        writeln!(output, "Generation Complete").unwrap();
        writeln!(output, "-------------------").unwrap();
        writeln!(output, "Files found: {}", stats.found).unwrap();
        writeln!(output, "Already processed: {}", stats.already_processed).unwrap();
        writeln!(output, "Files processed: {}", stats.processed).unwrap();
        writeln!(output, "Files skipped: {}", stats.skipped).unwrap();
        if stats.failed > 0 {
            writeln!(output, "Files failed: {}", stats.failed).unwrap();
        }
        writeln!(output, "Chunks: {}", stats.chunks).unwrap();
        writeln!(output, "Records written: {}", stats.records).unwrap();
        if stats.generation_failures > 0 || stats.write_failures > 0 {
            writeln!(
                output,
                "Failed chunks: {} generation, {} write",
                stats.generation_failures, stats.write_failures
            )
            .unwrap();
        }
        writeln!(output, "Output: {}", stats.output_file.display()).unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_candidates(&self, candidates: &[PathBuf]) -> String {
        if candidates.is_empty() {
            return "Dry run: no files to process.\n".to_string();
        }

        let mut output = String::new();
        writeln!(
            output,
            "Dry run: would process {} files",
            candidates.len()
        )
        .unwrap();
        for path in candidates {
            writeln!(output, "  {}", path.display()).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl Formatter for JsonFormatter {
    fn format_run_stats(&self, stats: &RunStats) -> String {
        self.render(stats)
    }

    fn format_candidates(&self, candidates: &[PathBuf]) -> String {
        let json = serde_json::json!({
            "dry_run": true,
            "count": candidates.len(),
            "files": candidates,
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
