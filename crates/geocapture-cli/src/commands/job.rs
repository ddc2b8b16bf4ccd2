//! Job command implementation

use crate::cli::{JobArgs, JobCommand, WaitArgs};
use crate::output::OutputWriter;
use crate::output_types::PipelineRow;
use anyhow::Result;
use geocapture_client::{PollPolicy, ProcessingClient};
use geocapture_core::config::LayeredConfig;
use geocapture_core::models::{JobId, JobStatus, JobStatusReport};
use std::time::Duration;

pub async fn execute(
    args: JobArgs,
    config: &LayeredConfig,
    api_key: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let (client, _) = super::connect(config, api_key).await?;

    match args.command {
        JobCommand::Status(args) => {
            let job_id = JobId(args.job_id);
            let report = client.check_job_status(&job_id).await?;
            show_status(&job_id, &report, output)
        }
        JobCommand::Results(args) => show_results(&client, JobId(args.job_id), output).await,
        JobCommand::Wait(args) => wait(&client, args, output).await,
    }
}

fn show_status(job_id: &JobId, report: &JobStatusReport, output: &OutputWriter) -> Result<()> {
    if output.is_json() {
        return output.result(report);
    }

    output.section(format!("Job {}", job_id));
    output.kv("Status", report.status);
    output.kv("Progress", format!("{}%", report.progress));
    if let Some(stage) = &report.current_stage {
        output.kv("Stage", stage);
    }
    if let Some(remaining) = report.estimated_time_remaining {
        output.kv("Remaining", format!("{} s", remaining));
    }
    Ok(())
}

async fn show_results(client: &ProcessingClient, job_id: JobId, output: &OutputWriter) -> Result<()> {
    let results = client.get_job_results(&job_id).await?;

    if output.is_json() {
        return output.result(&results);
    }

    output.section(format!("Results for job {}", job_id));
    output.kv("Processing Time", format!("{:.1} s", results.processing_time));
    output.kv("Quality Score", format!("{:.2}", results.quality_score));
    if !results.render_nodes.is_empty() {
        output.kv("Render Nodes", results.render_nodes.join(", "));
    }

    let rows = results
        .results
        .iter()
        .map(|(pipeline, result)| PipelineRow {
            pipeline: pipeline.to_string(),
            point_count: result.point_count,
            file_size: result.file_size,
            url: result.url.clone(),
        })
        .collect();
    output.table(rows);
    Ok(())
}

async fn wait(client: &ProcessingClient, args: WaitArgs, output: &OutputWriter) -> Result<()> {
    let policy = PollPolicy {
        interval: Duration::from_secs(args.interval_secs),
        timeout: Duration::from_secs(args.timeout_secs),
        max_consecutive_errors: args.max_errors,
    };
    let job_id = JobId(args.job_id);

    output.info(format!("Waiting for job {}", job_id));
    let report = client.wait_for_completion(&job_id, &policy).await?;
    show_status(&job_id, &report, output)?;

    if report.status == JobStatus::Failed {
        anyhow::bail!("Job {} failed", job_id);
    }
    Ok(())
}
