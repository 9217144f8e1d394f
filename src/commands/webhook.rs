//! Webhook body templates
//!
//! `tokenize` turns `{{$.path}}` text into the tokenized JSON body the API
//! stores; `render` goes back.

use anyhow::{Context as _, Result};
use gateway::WebhookBody;
use gateway::template;

pub fn tokenize(template_text: &str) -> Result<()> {
    println!("{}", tokenize_to_json(template_text)?);
    Ok(())
}

pub fn render(body: &str) -> Result<()> {
    println!("{}", render_from_json(body)?);
    Ok(())
}

fn tokenize_to_json(template_text: &str) -> Result<String> {
    let body = template::tokenize(template_text).context("Failed to tokenize template")?;
    serde_json::to_string_pretty(&body).context("Failed to serialize webhook body")
}

fn render_from_json(body: &str) -> Result<String> {
    let body: WebhookBody = serde_json::from_str(body).context("Invalid webhook body JSON")?;
    Ok(template::render(&body))
}
