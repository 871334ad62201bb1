//! `actloop agent` — single-task or interactive mode.

use actloop_agent::{
    OrchestrationEvent, Orchestrator, OrchestratorOptions, TurnOutcome, system_prompt,
};
use actloop_config::AppConfig;
use actloop_core::message::Role;
use actloop_providers::OllamaProvider;
use actloop_tools::{JsonToolCallParser, default_registry};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(
    message: Option<String>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let model = model.unwrap_or_else(|| config.model.clone());

    let provider = Arc::new(OllamaProvider::new(
        &config.endpoint,
        config.request_timeout_secs,
    ));
    let registry = default_registry(&config.tools);
    let system = system_prompt(
        &registry.definitions(),
        config.identity.system_prompt.as_deref(),
    );
    let tool_names = registry.names().join(", ");
    let parser = JsonToolCallParser::new(registry.names());
    info!(endpoint = %config.endpoint, model = %model, tools = registry.names().len(), "Starting agent");

    let mut orchestrator = Orchestrator::new(
        provider,
        Arc::new(registry),
        Arc::new(parser),
        OrchestratorOptions::from(&config),
    );

    if let Some(msg) = message {
        run_turn(&mut orchestrator, &msg, &system, &model).await;
        return Ok(());
    }

    println!();
    println!("  actloop — interactive mode");
    println!();
    println!("  Endpoint:  {}", config.endpoint);
    println!("  Model:     {model}");
    println!("  Workspace: {}", config.tools.workspace_root.display());
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type a task and press Enter. Ctrl+C cancels the running task.");
    println!("  Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        run_turn(&mut orchestrator, line, &system, &model).await;
    }

    println!();
    println!("  Session summary:");
    for line in orchestrator.state().summary().to_string().lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}

/// Run one turn, printing events as they arrive. Ctrl+C cancels the turn.
async fn run_turn(orchestrator: &mut Orchestrator, message: &str, system: &str, model: &str) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    let outcome = {
        let turn = orchestrator.orchestrate(message, system, model, &tx, &cancel);
        tokio::pin!(turn);
        loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    eprintln!("\n  Cancelling...");
                    cancel.cancel();
                }
            }
        }
    };

    drop(tx);
    let _ = printer.await;

    match outcome {
        TurnOutcome::Completed { reason, .. } => {
            if let Some(reason) = reason {
                println!("  ✓ Done: {reason}");
            }
        }
        TurnOutcome::MaxIterations { .. } | TurnOutcome::Cancelled => {}
    }
    println!();
}

fn print_event(event: &OrchestrationEvent) {
    match event {
        OrchestrationEvent::Progress { text } => eprintln!("  · {text}"),
        OrchestrationEvent::ToolExecution { call, result } => {
            let mark = if result.success { "✓" } else { "✗" };
            eprintln!("  ⚙ {} {mark}", call.summary());
            if !result.success {
                eprintln!("    {}", result.text());
            }
        }
        OrchestrationEvent::Message { role, content } => {
            let prefix = match role {
                Role::Assistant => "Assistant >",
                Role::System => "[system]",
                Role::User => "You >",
            };
            println!();
            for line in content.lines() {
                println!("  {prefix} {line}");
            }
        }
    }
}
