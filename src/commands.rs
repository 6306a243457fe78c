//! Local slash-command interpreter.
//!
//! Sits in front of the submission path: recognized commands short-circuit
//! and never become submissions. Parsing is pure; execution lives in the
//! engine, which routes each shape to the right collaborator.

pub const COMMAND_PREFIX: char = '/';

/// The three command shapes, plus pass-through for ordinary input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Not a recognized command; treat the input as a normal submission.
    Passthrough,
    /// Pure local action, no network involved.
    Local(LocalCommand),
    /// One-shot request/response call; the reply becomes a system turn.
    OneShot(OneShotCommand),
    /// Out-of-band control frame sent over the live connection, bypassing
    /// the queue entirely; usable even while a turn is in flight.
    Control { command: String, args: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    Help,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneShotCommand {
    Reset,
    Compact,
    Status,
    Usage,
    Budget,
    Model { name: Option<String> },
}

pub fn interpret(input: &str) -> CommandAction {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix(COMMAND_PREFIX) else {
        return CommandAction::Passthrough;
    };

    let (token, args) = match rest.split_once(char::is_whitespace) {
        Some((token, args)) => (token, args.trim()),
        None => (rest, ""),
    };

    match token.to_ascii_lowercase().as_str() {
        "help" => CommandAction::Local(LocalCommand::Help),
        "clear" => CommandAction::Local(LocalCommand::Clear),
        "reset" => CommandAction::OneShot(OneShotCommand::Reset),
        "compact" => CommandAction::OneShot(OneShotCommand::Compact),
        "status" => CommandAction::OneShot(OneShotCommand::Status),
        "usage" => CommandAction::OneShot(OneShotCommand::Usage),
        "budget" => CommandAction::OneShot(OneShotCommand::Budget),
        "model" => CommandAction::OneShot(OneShotCommand::Model {
            name: if args.is_empty() {
                None
            } else {
                Some(args.to_string())
            },
        }),
        "stop" => CommandAction::Control {
            command: "stop".to_string(),
            args: args.to_string(),
        },
        "agents" => CommandAction::Control {
            command: "agents".to_string(),
            args: args.to_string(),
        },
        // Unrecognized tokens fall through to the backend as plain text.
        _ => CommandAction::Passthrough,
    }
}

pub fn help_text() -> &'static str {
    "Available commands:\n\
     /help -show this help\n\
     /clear -clear the transcript\n\
     /reset -reset the agent session\n\
     /compact -compact the conversation context\n\
     /status -show session status\n\
     /usage -show token usage\n\
     /budget -show spend against budget\n\
     /model [name] -show or switch the active model\n\
     /stop -stop the current run\n\
     /agents -list available agents"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(interpret("hello there"), CommandAction::Passthrough);
        assert_eq!(interpret("  leading spaces"), CommandAction::Passthrough);
    }

    #[test]
    fn test_local_and_one_shot_commands_parse() {
        assert_eq!(interpret("/help"), CommandAction::Local(LocalCommand::Help));
        assert_eq!(interpret("/clear"), CommandAction::Local(LocalCommand::Clear));
        assert_eq!(
            interpret("/reset"),
            CommandAction::OneShot(OneShotCommand::Reset)
        );
        assert_eq!(
            interpret("/model"),
            CommandAction::OneShot(OneShotCommand::Model { name: None })
        );
        assert_eq!(
            interpret("/model gpt-large"),
            CommandAction::OneShot(OneShotCommand::Model {
                name: Some("gpt-large".to_string())
            })
        );
    }

    #[test]
    fn test_control_commands_carry_args() {
        assert_eq!(
            interpret("/stop now please"),
            CommandAction::Control {
                command: "stop".to_string(),
                args: "now please".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_slash_token_passes_through() {
        assert_eq!(interpret("/definitely-not-a-command"), CommandAction::Passthrough);
    }

    #[test]
    fn test_command_token_is_case_insensitive() {
        assert_eq!(interpret("/HELP"), CommandAction::Local(LocalCommand::Help));
    }
}
