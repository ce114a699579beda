//! Interactive question loop.

use anyhow::Result;
use quake_rag::QuakeRag;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::error;

use crate::print_answer;

const PROMPT: &str = "quake> ";

/// Read questions until EOF, Ctrl-C, or `exit`/`quit`.
///
/// A failed question is reported and the loop continues.
pub async fn run(engine: &QuakeRag, k: usize) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask about the loaded events. Type 'exit' to quit.");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let _ = editor.add_history_entry(question);

        match engine.ask_with_k(question, k).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                error!(error = %e, "question failed");
                eprintln!("Error: {e}");
            }
        }
        println!();
    }

    Ok(())
}
