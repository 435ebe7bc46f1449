//! The interactive `session` subcommand: a stdin/stdout loop driving
//! `SessionEngine::turn` turn by turn until the session reaches review,
//! mirroring the conceptual HTTP surface in §6 without a network hop.

use std::io::{self, BufRead, Write};

use vnform_core::session::ClientInfo;
use vnform_session::protocol::TurnPrompt;
use vnform_session::SessionEngine;

pub async fn run(engine: &SessionEngine, form_id: &str) -> anyhow::Result<()> {
    let session_id = format!("sess-{}-{:x}", chrono::Utc::now().timestamp(), rand::random::<u32>());
    let (_session, mut prompt) = engine.start_session(session_id.clone(), form_id.to_string(), ClientInfo::default())?;
    println!("session: {session_id}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print_prompt(&prompt);
        if matches!(prompt, TurnPrompt::Review { .. }) {
            println!("(session is in review — run `vnform fill --session-id {session_id} --out <file.pdf>` to render the answered PDF)");
            break;
        }

        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let input = line?;

        let outcome = engine.turn(&session_id, &input).await?;
        if let Some(rejection) = &outcome.rejection {
            println!("{rejection}");
        }
        match outcome.prompt {
            Some(next) => prompt = next,
            None => break,
        }
    }
    Ok(())
}

fn print_prompt(prompt: &TurnPrompt) {
    match prompt {
        TurnPrompt::Ask { question, .. } => println!("{question}"),
        TurnPrompt::Confirm { question, .. } => println!("{question}"),
        TurnPrompt::Review { preview } => println!("{preview}"),
    }
}
