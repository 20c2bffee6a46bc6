/// Inbound slash commands. Anything without a leading `/` is free text and
/// is interpreted against the session's current step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/start`: reset the session and ask for an identifier.
    Start,
    /// `/renegociar [N]`: explicit installment request; `None` when the
    /// argument is missing or not a number.
    Negotiate { count: Option<u32> },
    Help,
    Unknown { verb: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserInput {
    Command(ChatCommand),
    Text(String),
}

pub fn classify_input(text: &str) -> UserInput {
    let trimmed = text.trim();
    let Some(stripped) = trimmed.strip_prefix('/') else {
        return UserInput::Text(trimmed.to_owned());
    };

    let mut parts = stripped.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    // `/command@botname` addressing is used in group chats.
    let verb = verb.split('@').next().unwrap_or_default().to_owned();

    let command = match verb.as_str() {
        "start" => ChatCommand::Start,
        "renegociar" | "negotiate" => {
            ChatCommand::Negotiate { count: parts.next().and_then(parse_count_token) }
        }
        "help" | "ajuda" => ChatCommand::Help,
        _ => ChatCommand::Unknown { verb },
    };

    UserInput::Command(command)
}

/// Parses a bare installment count, e.g. a free-text reply of `3` or `3x`.
pub fn parse_installment_count(text: &str) -> Option<u32> {
    parse_count_token(text.trim())
}

fn parse_count_token(token: &str) -> Option<u32> {
    let digits = token.strip_suffix('x').unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
