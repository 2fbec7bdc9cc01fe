//! Parlance application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the persona registry, the Gemini client, and the speech backend
//! 4. Run the interactive chat loop, or list models

mod cli;
mod commands;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use parlance_chat::{ChatError, ConversationDispatcher, OutputRenderer, PersonaRegistry, Session};
use parlance_core::completion::CompletionService;
use parlance_core::config::ParlanceConfig;
use parlance_core::types::{Attachment, MediaKind, UserInput};
use parlance_gemini::GeminiClient;
use parlance_speech::{SpeechBackend, SpeechSynthesizer};

use cli::{CliArgs, Command};
use commands::{parse_line, Line, HELP};

// =============================================================================
// Chat loop
// =============================================================================

struct ChatRepl<C, S> {
    dispatcher: ConversationDispatcher<C>,
    renderer: OutputRenderer<S>,
    session: Session,
    pending: UserInput,
    export_dir: PathBuf,
    auto_speak: bool,
}

impl<C: CompletionService, S: SpeechSynthesizer> ChatRepl<C, S> {
    /// Handle one input line. Returns `false` when the user asked to quit.
    async fn handle(&mut self, line: Line) -> bool {
        match line {
            Line::Blank => {}
            Line::Quit => return false,
            Line::Help => println!("{HELP}"),
            Line::Message(text) => self.send(Some(text)).await,
            Line::Send => self.send(None).await,
            Line::Personas => {
                for persona in self.dispatcher.personas().iter() {
                    let marker = if persona.name == self.session.persona() {
                        "*"
                    } else {
                        " "
                    };
                    println!("{marker} {}", persona.name);
                }
            }
            Line::Persona(name) => {
                match self
                    .session
                    .switch_persona(self.dispatcher.personas(), &name)
                {
                    Ok(()) => println!("Persona: {name}"),
                    Err(e) => eprintln!("{e}"),
                }
            }
            Line::Prompt(prompt) => {
                let reset = prompt.is_none();
                self.session.set_custom_prompt(prompt);
                if reset {
                    println!("Custom prompt cleared; using persona '{}'", self.session.persona());
                } else {
                    println!("Custom prompt set");
                }
            }
            Line::Image(path) => self.attach(&path, MediaKind::Image),
            Line::Audio(path) => self.attach(&path, MediaKind::Audio),
            Line::Transcript(text) => {
                self.pending.audio_transcript = Some(text);
                println!("Transcript attached to the next message");
            }
            Line::Clear => {
                self.session.clear();
                self.pending = UserInput::default();
                println!("Chat history cleared");
            }
            Line::Save(path) => {
                let path = resolve_export_path(&self.export_dir, &path);
                match self.renderer.export_to_file(&self.session, &path) {
                    Ok(format) => println!("Saved {} history to {}", format, path.display()),
                    Err(e) => eprintln!("{e}"),
                }
            }
            Line::Speak => self.speak_last_reply().await,
            Line::History => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = self.renderer.render_session(&mut out, &self.session) {
                    tracing::warn!(error = %e, "Failed to render history");
                }
            }
        }
        true
    }

    fn attach(&mut self, path: &Path, expected: MediaKind) {
        let attachment = match Attachment::from_path(path) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("{e}");
                return;
            }
        };
        if attachment.kind() != Some(expected) {
            eprintln!("{} is not an {:?} file", path.display(), expected);
            return;
        }
        tracing::debug!(path = %path.display(), mime = %attachment.mime_type, "Attachment queued");
        match expected {
            MediaKind::Image => self.pending.images.push(attachment),
            MediaKind::Audio => self.pending.audio_clip = Some(attachment),
        }
        println!("Attached {} to the next message", path.display());
    }

    /// Send `text` with any queued attachments. The queue is kept when the
    /// dispatcher rejects the input before recording a turn.
    async fn send(&mut self, text: Option<String>) {
        let mut input = self.pending.clone();
        input.text = text;

        let result = self.dispatcher.send(&mut self.session, input).await;
        if !matches!(
            result,
            Err(ChatError::EmptyInput) | Err(ChatError::UnknownPersona(_))
        ) {
            self.pending = UserInput::default();
        }

        match result {
            Ok(_) => {
                if let Some(reply) = self.session.last_reply() {
                    let mut out = std::io::stdout().lock();
                    if let Err(e) = self.renderer.render(&mut out, reply) {
                        tracing::warn!(error = %e, "Failed to render reply");
                    }
                }
                if self.auto_speak {
                    self.speak_last_reply().await;
                }
            }
            Err(ChatError::EmptyInput) => eprintln!("Nothing to send"),
            Err(e) if e.is_retryable() => {
                eprintln!("{e} (temporary, send again to retry)");
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    async fn speak_last_reply(&self) {
        match self.renderer.speak_last_reply(&self.session).await {
            Ok(audio) => match save_audio(&self.export_dir, &audio) {
                Ok(path) => println!("Audio saved to {}", path.display()),
                Err(e) => eprintln!("Failed to save audio: {e}"),
            },
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// Relative transcript paths land under the configured export directory.
fn resolve_export_path(export_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        export_dir.join(path)
    }
}

/// Write reply audio to `dir/reply-<timestamp>.mp3`.
fn save_audio(dir: &Path, audio: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name = format!(
        "reply-{}.mp3",
        chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
    );
    let path = dir.join(name);
    std::fs::write(&path, audio)?;
    tracing::info!(path = %path.display(), bytes = audio.len(), "Reply audio saved");
    Ok(path)
}

async fn run_chat<C: CompletionService, S: SpeechSynthesizer>(
    mut repl: ChatRepl<C, S>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Parlance chat ({}). Type /help for commands.",
        repl.session.persona()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let keep_going = match parse_line(&line) {
            Ok(parsed) => repl.handle(parsed).await,
            Err(usage) => {
                eprintln!("{usage}");
                true
            }
        };
        if !keep_going {
            break;
        }
    }

    tracing::info!(
        session_id = %repl.session.id(),
        turns = repl.session.len(),
        "Chat session ended"
    );
    Ok(())
}

async fn run_models(client: &GeminiClient) -> Result<(), Box<dyn std::error::Error>> {
    let models = client.list_models().await?;
    for model in models.iter().filter(|m| m.supports_generate_content()) {
        println!(
            "{}  [{}]",
            model.name,
            model.supported_generation_methods.join(", ")
        );
    }
    tracing::info!(count = models.len(), "Models listed");
    Ok(())
}

// =============================================================================
// Entry point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = ParlanceConfig::load_or_default(&config_file);

    // Tracing: RUST_LOG wins, then --log-level, then the config file.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Parlance v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let client = GeminiClient::from_config(&config.model)?;

    if args.command() == Command::Models {
        return run_models(&client).await;
    }

    // Personas.
    let personas = Arc::new(PersonaRegistry::from_config(&config.personas)?);
    let session = Session::with_persona(&personas, args.resolve_persona(personas.default_persona()))?;
    tracing::info!(
        personas = personas.len(),
        persona = %session.persona(),
        "Persona registry ready"
    );

    // Speech.
    let speech = SpeechBackend::from_config(&config.speech);
    if args.speak && !speech.is_enabled() {
        tracing::warn!("--speak requested but speech is disabled in configuration");
    }

    let repl = ChatRepl {
        dispatcher: ConversationDispatcher::new(client, personas),
        renderer: OutputRenderer::new(speech),
        session,
        pending: UserInput::default(),
        export_dir: PathBuf::from(&config.general.export_dir),
        auto_speak: args.speak,
    };
    run_chat(repl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::completion::MockCompletionService;
    use parlance_core::config::PersonaConfig;
    use parlance_speech::MockSpeech;

    fn repl(session: Session) -> ChatRepl<MockCompletionService, MockSpeech> {
        ChatRepl {
            dispatcher: ConversationDispatcher::new(
                MockCompletionService::new(),
                Arc::new(PersonaRegistry::builtin()),
            ),
            renderer: OutputRenderer::new(MockSpeech::new()),
            session,
            pending: UserInput::default(),
            export_dir: PathBuf::from("."),
            auto_speak: false,
        }
    }

    fn png() -> Attachment {
        Attachment::new("image/png", vec![0x89, 0x50])
    }

    #[test]
    fn test_resolve_export_path() {
        let dir = Path::new("/data/exports");
        assert_eq!(
            resolve_export_path(dir, Path::new("chat.txt")),
            PathBuf::from("/data/exports/chat.txt")
        );
        assert_eq!(
            resolve_export_path(dir, Path::new("nested/chat.json")),
            PathBuf::from("/data/exports/nested/chat.json")
        );
        let absolute = std::env::temp_dir().join("chat.txt");
        assert_eq!(resolve_export_path(dir, &absolute), absolute);
    }

    #[tokio::test]
    async fn test_save_writes_under_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut repl = repl(Session::new(&PersonaRegistry::builtin()));
        repl.export_dir = dir.path().to_path_buf();

        assert!(repl.handle(Line::Message("hello".to_string())).await);
        assert!(repl.handle(Line::Save(PathBuf::from("chat.txt"))).await);

        let content = std::fs::read_to_string(dir.path().join("chat.txt")).unwrap();
        assert_eq!(content, "user: hello\nassistant: Echo: hello\n");
    }

    #[tokio::test]
    async fn test_successful_send_consumes_attachments() {
        let mut repl = repl(Session::new(&PersonaRegistry::builtin()));
        repl.pending.images.push(png());

        repl.send(Some("what is this?".to_string())).await;

        assert!(repl.pending.images.is_empty());
        assert_eq!(repl.session.turns()[0].image_count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_consumes_attachments() {
        let mut repl = repl(Session::new(&PersonaRegistry::builtin()));
        repl.dispatcher.service().push_failure("HTTP 503", true);
        repl.pending.images.push(png());

        repl.send(None).await;

        assert_eq!(repl.session.len(), 1);
        assert!(repl.pending.images.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_persona_keeps_attachments() {
        let solo = PersonaRegistry::from_config(&PersonaConfig {
            default: "Solo".to_string(),
            custom: [("Solo".to_string(), "Alone.".to_string())]
                .into_iter()
                .collect(),
        })
        .unwrap();
        let mut repl = repl(Session::new(&solo));
        repl.pending.images.push(png());
        repl.pending.audio_transcript = Some("hello there".to_string());

        repl.send(Some("look".to_string())).await;

        assert!(repl.session.is_empty());
        assert_eq!(repl.pending.images, vec![png()]);
        assert_eq!(repl.pending.audio_transcript.as_deref(), Some("hello there"));
        assert!(repl.pending.text.is_none());
    }

    #[tokio::test]
    async fn test_empty_input_keeps_attachments() {
        let mut repl = repl(Session::new(&PersonaRegistry::builtin()));
        repl.pending.audio_transcript = Some("   ".to_string());

        repl.send(Some("  ".to_string())).await;

        assert!(repl.session.is_empty());
        assert_eq!(repl.pending.audio_transcript.as_deref(), Some("   "));
    }
}
