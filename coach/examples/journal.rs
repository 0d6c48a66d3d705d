//! Interactive journaling session against the OpenAI APIs.
//!
//! Usage: OPENAI_API_KEY=... cargo run -p quill-coach --example journal
//!
//! Each line you type becomes a block in the current note. Type `/search
//! <query>` to search notes, `/links` to list suggested links, or an empty
//! line to quit.

use std::sync::Arc;

use anyhow::Context;
use quill_coach::{CoachConfig, CoachSession, OpenAIChatProvider};
use quill_embeddings::{EmbeddingProvider, OpenAIProvider};
use quill_notes::BlockStore;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let embeddings = OpenAIProvider::new();
    if !embeddings.is_available() {
        anyhow::bail!("OPENAI_API_KEY is not set");
    }

    let session = CoachSession::new(
        BlockStore::shared(),
        Arc::new(embeddings),
        Arc::new(OpenAIChatProvider::new()),
        CoachConfig::default(),
    );

    println!("Coach: {}", session.opening_question().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        if let Some(query) = line.strip_prefix("/search ") {
            for hit in session.search_notes(query).await {
                println!("  {:.2}  {}", hit.similarity, hit.title);
            }
            continue;
        }

        if line == "/links" {
            for resolved in session.resolved_links().await {
                println!(
                    "  {} -> {} ({:.2}) [{} / {}]",
                    resolved.link.from_id,
                    resolved.link.to_id,
                    resolved.link.strength,
                    resolved.from_title,
                    resolved.to_title
                );
            }
            continue;
        }

        let report = session.submit_text(line).await?;
        if !report.links.is_empty() {
            println!("  ({} related blocks)", report.links.len());
        }
        println!("Coach: {}", report.reply);
    }

    Ok(())
}
