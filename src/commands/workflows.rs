use anyhow::{Context as _, Result};
use colored::Colorize;
use gateway::{Gateway, Workflow};

use crate::Context;
use crate::ui;

/// Workflows of an integration, newest version first within equal ids
fn fetch(gateway: &dyn Gateway, project_id: &str, integration_id: &str) -> Result<Vec<Workflow>> {
    let page = gateway
        .list_workflows(project_id, integration_id)
        .with_context(|| format!("Failed to list workflows of integration {integration_id}"))?;

    if page.next_page_cursor.is_some() {
        log::warn!("More workflows exist than the first page shows");
    }

    let mut workflows = page.items;
    workflows.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| b.workflow_version.cmp(&a.workflow_version))
    });
    Ok(workflows)
}

fn line(workflow: &Workflow) -> String {
    let mut line = format!("{} v{}", workflow.id.bold(), workflow.workflow_version);
    if !workflow.description.is_empty() {
        line.push_str(&format!("  {}", workflow.description));
    }
    if !workflow.tags.is_empty() {
        line.push_str(&format!("  [{}]", workflow.tags.join(", ")).dimmed().to_string());
    }
    line
}

pub fn run(ctx: &Context, project_id: &str, integration_id: &str) -> Result<()> {
    let gateway = ctx.settings.gateway()?;
    let pb = (!ctx.quiet).then(|| crate::progress::spinner("Fetching workflows..."));
    let workflows = fetch(&gateway, project_id, integration_id);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let workflows = workflows?;

    ui::header(&format!("Workflows of {integration_id}"));
    if workflows.is_empty() {
        ui::info("No workflows");
        return Ok(());
    }
    for workflow in &workflows {
        println!("  {}", line(workflow));
    }
    if !ctx.quiet {
        println!();
        ui::dim(&format!("{} workflow(s)", workflows.len()));
    }
    Ok(())
}
