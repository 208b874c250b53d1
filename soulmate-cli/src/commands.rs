use std::path::PathBuf;

pub const HELP: &str = "\
/characters            list characters
/select <n|name>       chat with a character
/phone | /meet         switch between phone and face-to-face
/history               show the current transcript
/regen <n>             regenerate from message n
/edit <n> <text>       rewrite message n
/delete <n>            delete message n
/transfer <amount>     send a transfer
/image <path>          send a picture
/sticker <n>           send sticker n
/moments               show the feed
/refresh               let a character post
/post <text>           post on the feed
/like <n>              like or unlike post n
/comment <n> <text>    comment on post n
/memory                show what the character remembers
/settings              show settings
/quit                  exit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Characters,
    Select(String),
    Phone,
    Meet,
    History,
    Regenerate(usize),
    Edit(usize, String),
    Delete(usize),
    Transfer(f64),
    Image(PathBuf),
    Sticker(usize),
    Moments,
    Refresh,
    Post(String),
    Like(usize),
    Comment(usize, String),
    Memory,
    Settings,
    Exit,
}

#[derive(Debug, PartialEq)]
pub enum LocalCommandResult {
    Command(Command),

    /// Looked like a command but could not be parsed; carries the usage hint
    Invalid(String),

    /// Plain chat text for the active character
    Message(String),
}

/// Indices are shown 1-based; the result is 0-based.
fn index(arg: &str) -> Option<usize> {
    arg.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn index_and_text(rest: &str) -> Option<(usize, String)> {
    let (n, text) = rest.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((index(n)?, text.to_string()))
}

pub fn handle_local_command(input: &str) -> LocalCommandResult {
    let input = input.trim();
    let Some(body) = input.strip_prefix('/') else {
        return LocalCommandResult::Message(input.to_string());
    };
    let (name, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    let rest = rest.trim();

    let parsed = match name {
        "help" => Some(Command::Help),
        "characters" => Some(Command::Characters),
        "select" if !rest.is_empty() => Some(Command::Select(rest.to_string())),
        "phone" => Some(Command::Phone),
        "meet" => Some(Command::Meet),
        "history" => Some(Command::History),
        "regen" => index(rest).map(Command::Regenerate),
        "edit" => index_and_text(rest).map(|(i, text)| Command::Edit(i, text)),
        "delete" => index(rest).map(Command::Delete),
        "transfer" => rest.parse::<f64>().ok().map(Command::Transfer),
        "image" if !rest.is_empty() => Some(Command::Image(PathBuf::from(rest))),
        "sticker" => index(rest).map(Command::Sticker),
        "moments" => Some(Command::Moments),
        "refresh" => Some(Command::Refresh),
        "post" if !rest.is_empty() => Some(Command::Post(rest.to_string())),
        "like" => index(rest).map(Command::Like),
        "comment" => index_and_text(rest).map(|(i, text)| Command::Comment(i, text)),
        "memory" => Some(Command::Memory),
        "settings" => Some(Command::Settings),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    };

    match parsed {
        Some(command) => LocalCommandResult::Command(command),
        None => LocalCommandResult::Invalid(format!("Unknown or incomplete command: /{name}. Type /help.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            handle_local_command("  你好  "),
            LocalCommandResult::Message("你好".to_string())
        );
    }

    #[test]
    fn test_indices_are_one_based() {
        assert_eq!(
            handle_local_command("/regen 3"),
            LocalCommandResult::Command(Command::Regenerate(2))
        );
        assert_eq!(
            handle_local_command("/comment 1 好看 真好看"),
            LocalCommandResult::Command(Command::Comment(0, "好看 真好看".to_string()))
        );
        assert!(matches!(
            handle_local_command("/delete 0"),
            LocalCommandResult::Invalid(_)
        ));
    }

    #[test]
    fn test_incomplete_commands_are_invalid() {
        for input in ["/edit 2", "/transfer abc", "/select", "/post", "/unknown"] {
            assert!(
                matches!(handle_local_command(input), LocalCommandResult::Invalid(_)),
                "{input}"
            );
        }
        assert_eq!(
            handle_local_command("/transfer 52.5"),
            LocalCommandResult::Command(Command::Transfer(52.5))
        );
    }
}
