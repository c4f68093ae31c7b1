use std::io::{Read, Write};

use anyhow::{Context, Result, anyhow, bail};

use pathway_engine::{Completion, ProgressionEngine, ProgressionError};
use pathway_types::{LearningPath, NodeId, NodeStatus, PathDraft, PathId, PathNode, Position};

/// Parse a draft from a file, or from stdin when `source` is `-`.
pub(crate) fn read_draft(source: &str) -> Result<PathDraft> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read draft from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))?
    };
    parse_draft(&content)
}

fn parse_draft(content: &str) -> Result<PathDraft> {
    serde_json::from_str(content).context("Draft is not a valid path document")
}

pub(crate) async fn import(
    engine: &ProgressionEngine,
    draft: PathDraft,
    user_id: &str,
    out: &mut impl Write,
) -> Result<()> {
    let path = engine
        .create_from_draft(draft, user_id)
        .await
        .context("Failed to create path")?;
    writeln!(out, "{}", path.id)?;
    Ok(())
}

pub(crate) async fn show(
    engine: &ProgressionEngine,
    path_id: PathId,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let path = engine
        .path_with_nodes(path_id)
        .await?
        .ok_or_else(|| anyhow!("Path {path_id} not found"))?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &path)?;
        writeln!(out)?;
    } else {
        write_path(&path, out)?;
    }
    Ok(())
}

pub(crate) async fn list(
    engine: &ProgressionEngine,
    user_id: &str,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let paths = engine.paths_for_user(user_id).await?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &paths)?;
        writeln!(out)?;
        return Ok(());
    }
    for path in &paths {
        writeln!(out, "{}  {:<9}  {}", path.id, path.status(), path.title)?;
    }
    Ok(())
}

pub(crate) async fn complete(
    engine: &ProgressionEngine,
    path_id: PathId,
    node_id: NodeId,
    out: &mut impl Write,
) -> Result<()> {
    let node = engine
        .node(path_id, node_id)
        .await?
        .ok_or_else(|| anyhow!("Node {node_id} not found in path {path_id}"))?;

    match engine.complete_node(path_id, node_id, node.position).await {
        Ok(completion) => write_completion(&completion, out),
        Err(err @ ProgressionError::CascadeIncomplete { .. }) => Err(err).with_context(|| {
            format!(
                "Run `pathway resume {path_id} {}` to finish",
                node.position
            )
        }),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn resume(
    engine: &ProgressionEngine,
    path_id: PathId,
    position: u32,
    out: &mut impl Write,
) -> Result<()> {
    let position = Position::try_new(position)?;
    let completion = engine.resume_cascade(path_id, position).await?;
    write_completion(&completion, out)
}

pub(crate) async fn progress(
    engine: &ProgressionEngine,
    path_id: PathId,
    out: &mut impl Write,
) -> Result<()> {
    let Some(progress) = engine.progress(path_id).await? else {
        bail!("Path {path_id} not found");
    };
    writeln!(
        out,
        "{}/{} nodes completed, {}/{} xp",
        progress.completed_nodes, progress.total_nodes, progress.xp_earned, progress.xp_available
    )?;
    if let Some(current) = progress.current {
        writeln!(out, "current: {current}")?;
    } else if progress.is_finished() {
        writeln!(out, "finished")?;
    }
    Ok(())
}

fn status_marker(node: &PathNode) -> &'static str {
    match node.status() {
        NodeStatus::Locked => "[ ]",
        NodeStatus::Unlocked => "[>]",
        NodeStatus::Completed => "[x]",
    }
}

fn write_path(path: &LearningPath, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{} ({})", path.title, path.status())?;
    writeln!(out, "topic: {}", path.topic)?;
    writeln!(out, "id: {}", path.id)?;
    for node in path.nodes().unwrap_or_default() {
        writeln!(
            out,
            "  {} {}. {} ({} xp)  {}",
            status_marker(node),
            node.position,
            node.title(),
            node.xp_reward,
            node.id
        )?;
    }
    Ok(())
}

fn write_completion(completion: &Completion, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Completed node {}", completion.position)?;
    if let Some(next) = completion.unlocked_next {
        writeln!(out, "Unlocked node {next}")?;
    }
    if completion.path_completed {
        writeln!(out, "Path completed")?;
    }
    Ok(())
}
