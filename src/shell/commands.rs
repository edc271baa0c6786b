use std::fmt;

use crate::coordinator::ShellAction;
use crate::sensing::SensorKind;
use crate::tutor::{ChatMode, ExplanationSection, SummaryStyle};

pub const HELP: &str = "\
commands:
  camera | mic              toggle a sensor
  open | close              open or close the assistant
  yes | no                  answer the assistant prompt
  say <text>                chat with the assistant
  mode <mode> [text]        simple, im5, story, quiz, resources, youtube
  video <url> [style]       summary, notes or quiz of a video
  explain <topic>           structured explanation
  section <id>              overview, keyConcepts, examples, learningPath
  stop | mute | unmute      narration controls
  breathe | stopbreathe     calming exercise
  quotes                    list calming quotes
  quote add <text>          add a calming quote
  quote edit <n> <text>     replace quote n
  quote rm <n>              delete quote n
  mood                      recent mood summary
  status | help | quit";

/// One parsed line of shell input.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellInput {
    Action(ShellAction),
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingArgument(&'static str),
    InvalidArgument { what: &'static str, value: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(word) => write!(f, "unknown command '{word}' (try 'help')"),
            CommandError::MissingArgument(what) => write!(f, "missing {what}"),
            CommandError::InvalidArgument { what, value } => {
                write!(f, "'{value}' is not a valid {what}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Parses a line of input. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ShellInput>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let rest_or = |what| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument(what))
        } else {
            Ok(rest.to_string())
        }
    };

    let action = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Some(ShellInput::Help)),
        "status" => return Ok(Some(ShellInput::Status)),
        "camera" | "cam" => ShellAction::ToggleSensor(SensorKind::Camera),
        "mic" | "microphone" => ShellAction::ToggleSensor(SensorKind::Microphone),
        "open" => ShellAction::OpenAssistant,
        "yes" | "y" => ShellAction::AcceptPrompt,
        "no" | "n" => ShellAction::DeclinePrompt,
        "close" => ShellAction::CloseAssistant,
        "say" => ShellAction::SendMessage(rest_or("message")?),
        "mode" => parse_mode(rest)?,
        "video" => parse_video(rest)?,
        "explain" => ShellAction::Explain(rest_or("topic")?),
        "section" => {
            let id = rest_or("section id")?;
            let section = ExplanationSection::parse(&id).ok_or(CommandError::InvalidArgument {
                what: "section",
                value: id,
            })?;
            ShellAction::NarrateSection(section)
        }
        "stop" => ShellAction::StopNarration,
        "mute" => ShellAction::SetMuted(true),
        "unmute" => ShellAction::SetMuted(false),
        "breathe" => ShellAction::StartBreathing,
        "stopbreathe" => ShellAction::StopBreathing,
        "quotes" => ShellAction::ListQuotes,
        "quote" => parse_quote(rest)?,
        "mood" => ShellAction::ShowMood,
        "quit" | "exit" => ShellAction::Shutdown,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(ShellInput::Action(action)))
}

fn parse_mode(rest: &str) -> Result<ShellAction, CommandError> {
    let (tag, input) = match rest.split_once(char::is_whitespace) {
        Some((tag, input)) => (tag, Some(input.trim().to_string())),
        None => (rest, None),
    };
    if tag.is_empty() {
        return Err(CommandError::MissingArgument("mode"));
    }
    let mode = ChatMode::parse(tag).ok_or_else(|| CommandError::InvalidArgument {
        what: "mode",
        value: tag.to_string(),
    })?;
    Ok(ShellAction::Intervene {
        mode,
        input: input.filter(|text| !text.is_empty()),
    })
}

/// Quote numbers are shown 1-based.
fn parse_quote_number(raw: Option<&str>) -> Result<usize, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument("quote number"))?;
    match raw.parse::<usize>() {
        Ok(number) if number > 0 => Ok(number - 1),
        _ => Err(CommandError::InvalidArgument {
            what: "quote number",
            value: raw.to_string(),
        }),
    }
}

fn parse_quote(rest: &str) -> Result<ShellAction, CommandError> {
    let (verb, tail) = match rest.split_once(char::is_whitespace) {
        Some((verb, tail)) => (verb, tail.trim()),
        None => (rest, ""),
    };
    match verb {
        "" | "list" => Ok(ShellAction::ListQuotes),
        "add" if tail.is_empty() => Err(CommandError::MissingArgument("quote")),
        "add" => Ok(ShellAction::AddQuote(tail.to_string())),
        "edit" => {
            let (number, text) = match tail.split_once(char::is_whitespace) {
                Some((number, text)) => (Some(number), text.trim()),
                None => (Some(tail).filter(|t| !t.is_empty()), ""),
            };
            let index = parse_quote_number(number)?;
            if text.is_empty() {
                return Err(CommandError::MissingArgument("quote"));
            }
            Ok(ShellAction::EditQuote {
                index,
                text: text.to_string(),
            })
        }
        "rm" | "remove" | "delete" => Ok(ShellAction::RemoveQuote(parse_quote_number(
            Some(tail).filter(|t| !t.is_empty()),
        )?)),
        other => Err(CommandError::InvalidArgument {
            what: "quote command",
            value: other.to_string(),
        }),
    }
}

fn parse_video(rest: &str) -> Result<ShellAction, CommandError> {
    let mut parts = rest.split_whitespace();
    let url = parts
        .next()
        .ok_or(CommandError::MissingArgument("video url"))?
        .to_string();
    let style = match parts.next() {
        Some(raw) => SummaryStyle::parse(raw).ok_or_else(|| CommandError::InvalidArgument {
            what: "summary style",
            value: raw.to_string(),
        })?,
        None => SummaryStyle::default(),
    };
    Ok(ShellAction::SummarizeVideo { url, style })
}
