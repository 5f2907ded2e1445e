use crate::chain::SqlChain;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

/// Answers questions read from `input` until `exit`, `quit` or end of input.
///
/// A failed question is reported and the loop waits for the next one.
pub async fn run_repl<R, W>(chain: &SqlChain, input: R, out: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "Welcome to the T-Shirt SQL Assistant!")?;
    writeln!(out, "Ask questions about the t-shirt inventory in plain English.")?;
    writeln!(out, "Type 'exit' or 'quit' to end the session.")?;

    let mut lines = input.lines();
    loop {
        write!(out, "\nYour question: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match chain.ask(&line).await {
            Ok(result) => {
                writeln!(out, "\nAnswer: {}", result.answer)?;
                if let Some(sql) = &result.sql {
                    writeln!(out, "SQL: {}", sql)?;
                }
            }
            Err(e) => {
                error!("Failed to answer question: {}", e);
                writeln!(out, "\nAn error occurred: {}", e)?;
                writeln!(out, "Please try rephrasing your question.")?;
            }
        }
    }

    writeln!(out, "\nGoodbye!")?;
    Ok(())
}

/// Connectivity check for every backend the chain uses. Returns whether all passed.
pub async fn verify<W: Write>(chain: &SqlChain, out: &mut W) -> std::io::Result<bool> {
    let mut ok = true;

    match chain.database().ping().await {
        Ok(()) => writeln!(out, "database: ok")?,
        Err(e) => {
            ok = false;
            error!("Database check failed: {}", e);
            writeln!(out, "database: FAILED ({})", e)?;
        }
    }

    let llm = chain.llm();
    match llm.verify().await {
        Ok(()) => writeln!(out, "llm ({}): ok", llm.backend_name())?,
        Err(e) => {
            ok = false;
            error!("LLM check failed: {}", e);
            writeln!(out, "llm ({}): FAILED ({})", llm.backend_name(), e)?;
        }
    }

    let embedder = chain.embedder();
    match embedder.embed_one("connectivity check").await {
        Ok(v) => writeln!(out, "embedding ({}): ok, {} dimensions", embedder.backend_name(), v.len())?,
        Err(e) => {
            ok = false;
            error!("Embedding check failed: {}", e);
            writeln!(out, "embedding ({}): FAILED ({})", embedder.backend_name(), e)?;
        }
    }

    info!("Connectivity check finished, all ok: {}", ok);
    Ok(ok)
}
