use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::judge::{JudgeAdapter, OfflineJudge, RemoteJudge};
use crate::llm::factory;
use crate::pipeline::GenerationPipeline;
use crate::progress::{ProgressEvent, ProgressStream};
use crate::spec::ActivitySpec;
use crate::util::RunContext;

/// Run the full pipeline for a spec file. `dry_run` swaps in the canned LLM
/// client and the offline judge (python specs only).
pub async fn run(
    spec_path: String,
    config_path: Option<String>,
    out: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let config = Config::load(config_path.as_deref().map(Path::new))?;

    let content = fs::read_to_string(Path::new(&spec_path))
        .with_context(|| format!("Failed to read spec file: {}", spec_path))?;
    let spec: ActivitySpec =
        serde_json::from_str(&content).context("Failed to parse activity spec")?;
    spec.validate()?;

    let llm = factory::create_client(&config, dry_run)?;
    let judge: Box<dyn JudgeAdapter> = if dry_run {
        Box::new(OfflineJudge)
    } else {
        Box::new(RemoteJudge::new(
            config.judge.base_url.clone(),
            Duration::from_millis(config.judge.timeout_ms),
        )?)
    };

    let activity_id = format!("act-{:08x}", rand::random::<u32>());
    let ctx = RunContext::new(activity_id.clone());
    let progress = Arc::new(ProgressStream::new());

    // Surface progress events as they happen
    let (_, mut rx) = progress.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match &event.event {
                ProgressEvent::SlotStarted {
                    slot_index,
                    difficulty,
                    topics,
                } => info!(
                    "slot {} started ({}, {})",
                    slot_index,
                    difficulty,
                    topics.join(" + ")
                ),
                ProgressEvent::SlotContractFailed {
                    slot_index, error, ..
                } => warn!("slot {} contract failure: {}", slot_index, error),
                ProgressEvent::SlotDockerValidationFailed {
                    slot_index,
                    kind,
                    error,
                    ..
                } => warn!("slot {} {:?} failure: {}", slot_index, kind, error),
                ProgressEvent::SlotCompleted {
                    slot_index,
                    problem_id,
                } => info!("slot {} completed ({})", slot_index, problem_id),
                ProgressEvent::GenerationSoftFallbackApplied {
                    slot_index, from, to, ..
                } => warn!("slot {} downgraded {} -> {}", slot_index, from, to),
                _ => {}
            }
        }
    });

    let pipeline = GenerationPipeline::new(llm.as_ref(), judge.as_ref(), &config, progress);
    let result = pipeline.run(&spec, &ctx).await;
    printer.abort();

    let outcome = result.map_err(|failure| anyhow::anyhow!("{}", failure))?;

    let rendered = serde_json::to_string_pretty(&serde_json::json!({
        "activity_id": activity_id,
        "problems": outcome.problems,
        "rewrites": outcome.rewrites,
        "soft_fallbacks": outcome.soft_fallbacks,
    }))?;

    match out {
        Some(path) => {
            let path = PathBuf::from(path);
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote {} problem(s) to {}",
                outcome.problems.len(),
                path.display()
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
