//! Interactive search session.

use anyhow::{Context, Result};
use paperlens_rag::{SearchHit, SearchResponse, SearchService};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::error;

const HELP: &str = "Type a query to search.
  /top N   - return N results per query
  /help    - show this help
  quit     - exit (Ctrl+D also works)";

/// Print a response as numbered hits, or as pretty JSON.
pub fn print_response(response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(response).context("failed to serialize results")?;
        println!("{text}");
        return Ok(());
    }
    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (rank, hit) in response.results.iter().enumerate() {
        print_hit(rank + 1, hit, response.reranked);
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &SearchHit, reranked: bool) {
    let label = if reranked { "rerank score" } else { "similarity" };
    println!("\n{rank}. {} ({label} {:.4})", hit.title, hit.score);
    println!("   {} | {}", hit.source, hit.url);
    let preview: String = hit.abstract_text.chars().take(300).collect();
    if !preview.is_empty() {
        let ellipsis = if hit.abstract_text.chars().count() > 300 { "..." } else { "" };
        println!("   {preview}{ellipsis}");
    }
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// Read queries until `quit`, Ctrl+C or Ctrl+D.
pub async fn run_interactive(service: &SearchService, mut top_k: i64, json: bool) -> Result<()> {
    println!("PaperLens interactive search");
    println!("{HELP}\n");

    let mut editor = DefaultEditor::new().context("failed to create line editor")?;
    loop {
        let line = match editor.readline("search> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        if is_exit(line) {
            break;
        }
        match line {
            "/help" => println!("{HELP}"),
            _ if line.starts_with("/top") => match line["/top".len()..].trim().parse::<i64>() {
                Ok(n) if n >= 0 => {
                    top_k = n;
                    println!("Returning {top_k} results per query");
                }
                _ => eprintln!("Usage: /top N"),
            },
            query => match service.search(query, top_k).await {
                Ok(response) => print_response(&response, json)?,
                Err(e) => {
                    error!(error = %e, "search failed");
                    eprintln!("Search failed: {e}");
                }
            },
        }
    }
    println!("Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_ignore_case() {
        for line in ["quit", "QUIT", "Quit", "exit", "Exit"] {
            assert!(is_exit(line), "{line}");
        }
        assert!(!is_exit("quitting time"));
        assert!(!is_exit("quantum"));
    }
}
