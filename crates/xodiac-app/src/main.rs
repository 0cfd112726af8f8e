//! Xodiac application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install the tracing subscriber (stderr, so answers stay clean on stdout)
//! 3. Build the orchestrator with HTTP-backed providers
//! 4. Answer a one-shot query, or run an interactive session on stdin

mod cli;
mod render;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use xodiac_chat::{ChatError, ModeToggles, Orchestrator, Transcript};
use xodiac_core::{Role, XodiacConfig};

use cli::CliArgs;
use render::TerminalRenderer;

/// What the user asked for on one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Related(usize),
    Query(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    match line {
        "" => None,
        "/quit" | "/exit" => Some(Input::Quit),
        _ => match line.parse::<usize>() {
            Ok(n) => Some(Input::Related(n)),
            Err(_) => Some(Input::Query(line.to_string())),
        },
    }
}

/// Run one turn while rendering every published snapshot.
async fn run_turn<F>(
    orchestrator: &Orchestrator,
    renderer: &mut TerminalRenderer,
    turn: F,
) -> Result<Transcript, Box<dyn std::error::Error>>
where
    F: std::future::Future<Output = Result<Transcript, ChatError>>,
{
    let mut updates = orchestrator.subscribe();
    let mut stdout = std::io::stdout();
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            changed = updates.changed() => {
                if changed.is_ok() {
                    let snapshot = updates.borrow_and_update().clone();
                    renderer.render(&snapshot, &mut stdout)?;
                }
            }
        }
    };

    let transcript = result?;
    renderer.render(&transcript, &mut stdout)?;
    Ok(transcript)
}

/// Index of the trailing assistant entry, the target of related-question picks.
fn last_assistant_index(transcript: &Transcript) -> Option<usize> {
    let index = transcript.len().checked_sub(1)?;
    transcript
        .get(index)
        .filter(|e| e.role() == Role::Assistant)
        .map(|_| index)
}

async fn interactive(
    orchestrator: &Orchestrator,
    toggles: ModeToggles,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut renderer = TerminalRenderer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match parse_input(&line) {
            None => continue,
            Some(Input::Quit) => break,
            Some(Input::Query(query)) => {
                run_turn(orchestrator, &mut renderer, orchestrator.submit(&query, toggles)).await
            }
            Some(Input::Related(n)) => {
                let transcript = orchestrator.snapshot();
                match (last_assistant_index(&transcript), n.checked_sub(1)) {
                    (Some(entry), Some(question)) => {
                        run_turn(
                            orchestrator,
                            &mut renderer,
                            orchestrator.select_related(entry, question),
                        )
                        .await
                    }
                    _ => Err(ChatError::RelatedQuestionNotFound {
                        entry: transcript.len(),
                        index: n,
                    }
                    .into()),
                }
            }
        };

        if let Err(e) = outcome {
            tracing::debug!(error = %e, "Turn rejected");
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}

/// Write the config file, keeping values from an existing one.
///
/// Environment keys are not persisted.
fn init_config(path: &Path) -> xodiac_core::Result<&Path> {
    let config = if path.exists() {
        XodiacConfig::load_or_default(path)
    } else {
        XodiacConfig::default()
    };
    config.save(path)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = if config_file.exists() {
        match XodiacConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (XodiacConfig::default(), Some(e)),
        }
    } else {
        (XodiacConfig::default(), None)
    };
    config.apply_env_overrides();

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Xodiac v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config. Using defaults."
        ),
        None => tracing::info!(path = %config_file.display(), "Configuration resolved"),
    }

    if args.init_config {
        let path = init_config(&config_file)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let orchestrator = Orchestrator::from_config(&config)?;
    let toggles = args.toggles();

    match args.query() {
        Some(query) => {
            let mut renderer = TerminalRenderer::new();
            run_turn(&orchestrator, &mut renderer, orchestrator.submit(&query, toggles)).await?;
            println!();
        }
        None => interactive(&orchestrator, toggles).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), None);
        assert_eq!(parse_input("/quit"), Some(Input::Quit));
        assert_eq!(parse_input(" /exit "), Some(Input::Quit));
        assert_eq!(parse_input("2"), Some(Input::Related(2)));
        assert_eq!(
            parse_input(" what is rust "),
            Some(Input::Query("what is rust".to_string()))
        );
    }

    #[test]
    fn test_init_config_creates_and_preserves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init_config(&path).unwrap();
        let written = XodiacConfig::load(&path).unwrap();
        assert_eq!(written.search.model, XodiacConfig::default().search.model);

        std::fs::write(&path, "[search]\nmodel = \"custom-model\"\n").unwrap();
        init_config(&path).unwrap();
        let kept = XodiacConfig::load(&path).unwrap();
        assert_eq!(kept.search.model, "custom-model");
        assert_eq!(kept.general.log_level, XodiacConfig::default().general.log_level);
    }

    #[test]
    fn test_last_assistant_index_empty() {
        assert_eq!(last_assistant_index(&Transcript::default()), None);
    }
}
