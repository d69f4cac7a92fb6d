/// Terminal command parsing.
///
/// A plain line edits the link input, an empty line submits, and lines
/// starting with `:` are commands.
use clipdrop_shared::models::DownloadFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(String),
    Submit,
    Format(DownloadFormat),
    /// Variant id or label; `None` selects automatic quality.
    Quality(Option<String>),
    Clear,
    History,
    ClearHistory,
    /// 1-based history position.
    Open(usize),
    Help,
    Quit,
}

pub const HELP: &str = "\
Paste a link and press Enter to fetch it, then Enter again to download.
  :audio | :video        choose the download format
  :quality <id|label>    choose a quality (:quality auto to reset)
  :clear                 clear the current link
  :history               list recent downloads
  :open <n>              fetch history entry n again
  :clear-history         forget all history
  :help                  show this help
  :quit                  exit";

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Submit);
    }

    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Input(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    match (name.as_str(), arg) {
        ("audio", None) => Ok(Command::Format(DownloadFormat::Audio)),
        ("video", None) => Ok(Command::Format(DownloadFormat::Video)),
        ("quality" | "q", Some(a)) if a.eq_ignore_ascii_case("auto") => Ok(Command::Quality(None)),
        ("quality" | "q", Some(a)) => Ok(Command::Quality(Some(a.to_string()))),
        ("quality" | "q", None) => Err("Usage: :quality <id|label|auto>".to_string()),
        ("clear", None) => Ok(Command::Clear),
        ("history", None) => Ok(Command::History),
        ("clear-history", None) => Ok(Command::ClearHistory),
        ("open", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Command::Open(n)),
            _ => Err(format!("Not a history position: {}", n)),
        },
        ("open", None) => Err("Usage: :open <n>".to_string()),
        ("help" | "h", None) => Ok(Command::Help),
        ("quit" | "q!" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("Unknown command: {} (try :help)", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines() {
        assert_eq!(parse(""), Ok(Command::Submit));
        assert_eq!(parse("   "), Ok(Command::Submit));
        assert_eq!(
            parse(" https://youtu.be/abc123 "),
            Ok(Command::Input("https://youtu.be/abc123".into()))
        );
    }

    #[test]
    fn test_format_and_quality() {
        assert_eq!(parse(":audio"), Ok(Command::Format(DownloadFormat::Audio)));
        assert_eq!(parse(":VIDEO"), Ok(Command::Format(DownloadFormat::Video)));
        assert_eq!(parse(":quality 720p"), Ok(Command::Quality(Some("720p".into()))));
        assert_eq!(parse(":q 22"), Ok(Command::Quality(Some("22".into()))));
        assert_eq!(parse(":quality AUTO"), Ok(Command::Quality(None)));
        assert!(parse(":quality").is_err());
    }

    #[test]
    fn test_history_commands() {
        assert_eq!(parse(":history"), Ok(Command::History));
        assert_eq!(parse(":clear-history"), Ok(Command::ClearHistory));
        assert_eq!(parse(":open 3"), Ok(Command::Open(3)));
        assert!(parse(":open 0").is_err());
        assert!(parse(":open x").is_err());
    }

    #[test]
    fn test_misc() {
        assert_eq!(parse(":clear"), Ok(Command::Clear));
        assert_eq!(parse(":help"), Ok(Command::Help));
        assert_eq!(parse(":quit"), Ok(Command::Quit));
        assert!(parse(":bogus").is_err());
        assert!(parse(":audio now").is_err());
    }
}
