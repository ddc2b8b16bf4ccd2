//! Network command implementation

use crate::output::OutputWriter;
use anyhow::Result;
use geocapture_core::config::LayeredConfig;

pub async fn execute(
    config: &LayeredConfig,
    api_key: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let (client, _) = super::connect(config, api_key).await?;
    let info = client.get_network_info().await?;

    if output.is_json() {
        output.result(&info)?;
    } else {
        output.section("Processing Network");
        output.kv("Available Nodes", info.available_nodes);
        output.kv("Queue Length", info.queue_length);
        output.kv(
            "Average Processing Time",
            format!("{:.0} s", info.average_processing_time),
        );
        output.kv("Pricing", format!("{:.2}", info.pricing));
    }

    Ok(())
}
