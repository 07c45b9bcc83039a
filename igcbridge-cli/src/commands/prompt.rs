//! Line commands accepted on stdin while `igcbridge run` is active.

use std::time::Duration;

use igcbridge::config::positive_duration;

/// Help text printed for `help`.
pub const HELP: &str = "\
Commands:
  start [pilot]    Start recording (optional pilot name for this flight)
  stop             Stop recording and close the flight log
  status           Show connection and recording status
  json             Show status as JSON
  interval <secs>  Change the seconds between recorded fixes
  help             Show this help
  quit             Stop recording and exit";

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptCommand {
    Start { pilot: Option<String> },
    Stop,
    Status,
    StatusJson,
    Interval(Duration),
    Help,
    Quit,
    /// Blank line
    Empty,
    /// Known command with a bad argument
    Invalid(String),
    Unknown(String),
}

impl PromptCommand {
    /// Parse one line typed at the prompt. Command words are case-insensitive.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "" => PromptCommand::Empty,
            "start" | "record" => PromptCommand::Start {
                pilot: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "stop" => PromptCommand::Stop,
            "status" => PromptCommand::Status,
            "json" => PromptCommand::StatusJson,
            "interval" => match rest.parse::<f64>().ok().and_then(positive_duration) {
                Some(interval) => PromptCommand::Interval(interval),
                None => {
                    PromptCommand::Invalid("interval needs a positive number of seconds".into())
                }
            },
            "help" | "?" => PromptCommand::Help,
            "quit" | "exit" | "q" => PromptCommand::Quit,
            _ => PromptCommand::Unknown(word.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_commands() {
        assert_eq!(PromptCommand::parse("stop"), PromptCommand::Stop);
        assert_eq!(PromptCommand::parse("  STATUS "), PromptCommand::Status);
        assert_eq!(PromptCommand::parse("json"), PromptCommand::StatusJson);
        assert_eq!(PromptCommand::parse("?"), PromptCommand::Help);
        assert_eq!(PromptCommand::parse("exit"), PromptCommand::Quit);
        assert_eq!(PromptCommand::parse(""), PromptCommand::Empty);
    }

    #[test]
    fn test_start_with_pilot() {
        assert_eq!(
            PromptCommand::parse("start"),
            PromptCommand::Start { pilot: None }
        );
        assert_eq!(
            PromptCommand::parse("start  Jane  Pilot "),
            PromptCommand::Start {
                pilot: Some("Jane  Pilot".to_string())
            }
        );
    }

    #[test]
    fn test_interval() {
        assert_eq!(
            PromptCommand::parse("interval 0.5"),
            PromptCommand::Interval(Duration::from_millis(500))
        );
        assert!(matches!(
            PromptCommand::parse("interval"),
            PromptCommand::Invalid(_)
        ));
        assert!(matches!(
            PromptCommand::parse("interval -2"),
            PromptCommand::Invalid(_)
        ));
        assert!(matches!(
            PromptCommand::parse("interval 1e20"),
            PromptCommand::Invalid(_)
        ));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(
            PromptCommand::parse("fly now"),
            PromptCommand::Unknown("fly".to_string())
        );
    }
}
