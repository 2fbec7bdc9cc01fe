//! Line parser for the interactive chat prompt.
//!
//! Plain lines are messages. Lines starting with `/` are commands.

use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  /help                 show this help
  /personas             list personas
  /persona <name>       switch persona
  /prompt [text]        set a custom system prompt (no text resets it)
  /image <path>         attach an image to the next message
  /audio <path>         attach an audio clip to the next message
  /transcript <text>    attach an audio transcript to the next message
  /send                 send pending attachments without text
  /clear                clear the chat history
  /save <path>          export history (.txt or .json)
  /speak                speak the last reply
  /history              show the chat history
  /quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Message(String),
    Help,
    Personas,
    Persona(String),
    Prompt(Option<String>),
    Image(PathBuf),
    Audio(PathBuf),
    Transcript(String),
    Send,
    Clear,
    Save(PathBuf),
    Speak,
    History,
    Quit,
    Blank,
}

/// Parse one input line. Errors carry a usage message for the user.
pub fn parse_line(line: &str) -> Result<Line, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Line::Blank);
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(Line::Message(trimmed.to_string()));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    match (name.to_ascii_lowercase().as_str(), arg) {
        ("help" | "?", _) => Ok(Line::Help),
        ("personas", _) => Ok(Line::Personas),
        ("persona", Some(name)) => Ok(Line::Persona(name)),
        ("persona", None) => Err("usage: /persona <name>".to_string()),
        ("prompt", arg) => Ok(Line::Prompt(arg)),
        ("image", Some(path)) => Ok(Line::Image(PathBuf::from(path))),
        ("image", None) => Err("usage: /image <path>".to_string()),
        ("audio", Some(path)) => Ok(Line::Audio(PathBuf::from(path))),
        ("audio", None) => Err("usage: /audio <path>".to_string()),
        ("transcript", Some(text)) => Ok(Line::Transcript(text)),
        ("transcript", None) => Err("usage: /transcript <text>".to_string()),
        ("send", _) => Ok(Line::Send),
        ("clear", _) => Ok(Line::Clear),
        ("save", Some(path)) => Ok(Line::Save(PathBuf::from(path))),
        ("save", None) => Err("usage: /save <path.txt|path.json>".to_string()),
        ("speak", _) => Ok(Line::Speak),
        ("history", _) => Ok(Line::History),
        ("quit" | "exit", _) => Ok(Line::Quit),
        (other, _) => Err(format!("unknown command '/{other}', try /help")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_message() {
        assert_eq!(
            parse_line("  Explain recursion \n").unwrap(),
            Line::Message("Explain recursion".to_string())
        );
        assert_eq!(parse_line("   ").unwrap(), Line::Blank);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            parse_line("/persona Friendly Tutor").unwrap(),
            Line::Persona("Friendly Tutor".to_string())
        );
        assert_eq!(
            parse_line("/image ./cat.png").unwrap(),
            Line::Image(PathBuf::from("./cat.png"))
        );
        assert_eq!(
            parse_line("/save out/chat.json").unwrap(),
            Line::Save(PathBuf::from("out/chat.json"))
        );
        assert_eq!(
            parse_line("/transcript what time is it").unwrap(),
            Line::Transcript("what time is it".to_string())
        );
    }

    #[test]
    fn test_prompt_with_and_without_text() {
        assert_eq!(
            parse_line("/prompt Reply in French.").unwrap(),
            Line::Prompt(Some("Reply in French.".to_string()))
        );
        assert_eq!(parse_line("/prompt").unwrap(), Line::Prompt(None));
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(parse_line("/help").unwrap(), Line::Help);
        assert_eq!(parse_line("/CLEAR").unwrap(), Line::Clear);
        assert_eq!(parse_line("/send").unwrap(), Line::Send);
        assert_eq!(parse_line("/speak").unwrap(), Line::Speak);
        assert_eq!(parse_line("/history").unwrap(), Line::History);
        assert_eq!(parse_line("/personas").unwrap(), Line::Personas);
        assert_eq!(parse_line("/exit").unwrap(), Line::Quit);
    }

    #[test]
    fn test_missing_argument_is_usage_error() {
        assert!(parse_line("/persona").unwrap_err().starts_with("usage"));
        assert!(parse_line("/image   ").unwrap_err().starts_with("usage"));
        assert!(parse_line("/save").unwrap_err().starts_with("usage"));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_line("/dance now").unwrap_err();
        assert!(err.contains("/dance"));
    }
}
