use console::style;
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
        }
    }

    pub fn success(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => println!("{} {}", style("✓").green().bold(), message),
            OutputFormat::Json => println!("{}", status_json("success", message)),
        }
    }

    pub fn info(&self, message: impl Display) {
        // Informational lines would break the single JSON document on stdout
        if self.format == OutputFormat::Human {
            println!("{} {}", style("ℹ").blue().bold(), message);
        }
    }

    pub fn warning(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", style("⚠").yellow().bold(), message),
            OutputFormat::Json => eprintln!("{}", status_json("warning", message)),
        }
    }

    pub fn error(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", style("✗").red().bold(), message),
            OutputFormat::Json => eprintln!("{}", status_json("error", message)),
        }
    }

    /// Human mode only; JSON callers emit the rows through [`result`](Self::result)
    pub fn table<T: Tabled>(&self, rows: Vec<T>) {
        if self.format == OutputFormat::Json {
            return;
        }
        if rows.is_empty() {
            println!("{}", style("(no data)").dim());
        } else {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
    }

    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let output = match self.format {
            OutputFormat::Human => serde_json::to_value(&data)?,
            OutputFormat::Json => serde_json::json!({
                "status": "success",
                "data": data,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        if self.format == OutputFormat::Human {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    pub fn section(&self, title: impl Display) {
        if self.format == OutputFormat::Human {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn status_json(status: &str, message: impl Display) -> String {
    serde_json::json!({
        "status": status,
        "message": message.to_string(),
    })
    .to_string()
}
