//! Config command implementation

use crate::cli::ConfigArgs;
use crate::output::OutputWriter;
use crate::output_types::ConfigEntry;
use anyhow::Result;
use geocapture_core::config::LayeredConfig;

pub fn execute(args: ConfigArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let mut entries: Vec<ConfigEntry> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigEntry {
            key,
            value,
            source: format!("{:?}", source),
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    let validation = if args.validate {
        Some(config.validate())
    } else {
        None
    };

    if output.is_json() {
        output.result(serde_json::json!({
            "entries": entries,
            "valid": validation.as_ref().map(|v| v.is_ok()),
        }))?;
    } else {
        output.section("Configuration");
        output.table(entries);
    }

    match validation {
        Some(Err(e)) => Err(e.into()),
        Some(Ok(())) => {
            output.info("Configuration is valid");
            Ok(())
        }
        None => Ok(()),
    }
}
