use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# dq configuration
#
# API keys are read from environment variables by default:
#   GEMINI_API_KEY, OPENAI_API_KEY
# You can also set them directly in this file (not recommended).

# ── Provider ─────────────────────────────────────────────────────
# type is "gemini" or "openai" (any OpenAI-compatible server).
# Without a type, a base_url implies "openai", otherwise "gemini".

[provider]
type = "gemini"
# api_key = "AIza..."             # or set GEMINI_API_KEY env var
# model = "gemini-1.5-flash"

# [provider]
# type = "openai"
# base_url = "http://localhost:11434/v1"
# model = "llama3.1"

# ── Query behavior ───────────────────────────────────────────────

[query]
max_attempts = 3          # provider calls per question, first included
backoff_secs = 2          # fixed wait between attempts
timeout_secs = 10         # per-call deadline, 0 disables it
temperature = 0.2
max_output_tokens = 1024
batch_concurrency = 1     # questions in flight per batch

# ── Storage ──────────────────────────────────────────────────────
# Supports ~, $VAR and ${VAR}.

[storage]
# documents_dir = "~/.config/dq/documents"     # <id>.txt files
# history_file = "~/.config/dq/history.jsonl"
"#;

pub fn run() -> Result<()> {
    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    let documents_dir = config_dir.join("documents");
    std::fs::create_dir_all(&documents_dir)
        .with_context(|| format!("Failed to create documents directory: {}", documents_dir.display()))?;

    if config_path.exists() {
        println!("Existing config file found:");
        println!("  {}", config_path.display());
        print!("\nOverwrite? (The existing file will be backed up) [y/N] ");

        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }

        backup_file(&config_path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Set your API key:   export GEMINI_API_KEY=\"AIza...\"");
    println!("  2. Add a document:     cp notes.txt {}/", documents_dir.display());
    println!("  3. Ask a question:     dq ask notes \"What is this about?\"");

    Ok(())
}

/// Back up a file to <name>.bak, appending a timestamp if .bak already exists.
fn backup_file(path: &Path) -> Result<()> {
    let mut backup = path.with_extension("toml.bak");

    if backup.exists() {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        backup = path.with_extension(format!("toml.bak.{}", timestamp));
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    println!("  Backed up to {}", backup.display());

    Ok(())
}
