//! Probe command implementation

use crate::output::OutputWriter;
use crate::output_types::ProbeOutput;
use anyhow::Result;
use geocapture_core::config::LayeredConfig;

pub async fn execute(
    config: &LayeredConfig,
    api_key: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let (client, status) = super::connect(config, api_key).await?;

    if output.is_json() {
        output.result(ProbeOutput {
            base_url: client.base_url().to_string(),
            status: status.status,
            version: status.version,
        })?;
    } else {
        output.success(format!("Connected to {}", client.base_url()));
        output.kv("Status", &status.status);
        if let Some(version) = &status.version {
            output.kv("Version", version);
        }
    }

    Ok(())
}
