use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, DISPLAY_NAME_COMMAND, NO_ARG_COMMANDS, SIGN_IN_COMMAND, SINGLE_PATH_COMMANDS,
};

/// One line of interactive input, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub question: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            question: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = split_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == DISPLAY_NAME_COMMAND.command {
                let mut intent = Intent::new(DISPLAY_NAME_COMMAND.action, text);
                intent
                    .command_args
                    .insert("name".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if command == SIGN_IN_COMMAND.command {
                let mut parts = split_args(arg).into_iter();
                let email = parts.next().unwrap_or_default();
                let display_name = parts.collect::<Vec<String>>().join(" ");
                let mut intent = Intent::new(SIGN_IN_COMMAND.action, text);
                intent
                    .command_args
                    .insert("email".to_string(), Value::String(email));
                intent
                    .command_args
                    .insert("display_name".to_string(), Value::String(display_name));
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("ask", text);
    intent.question = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn plain_text_is_a_question() {
        let intent = parse_intent("  What does a high ALT mean?  ");
        assert_eq!(intent.action, "ask");
        assert_eq!(intent.question.as_deref(), Some("What does a high ALT mean?"));
    }

    #[test]
    fn parse_pick_quoted_path() {
        let intent = parse_intent("/pick \"/tmp/lab results.pdf\"");
        assert_eq!(intent.action, "pick_file");
        assert_eq!(intent.command_args["path"], json!("/tmp/lab results.pdf"));
        assert_eq!(intent.arg("path"), Some("/tmp/lab results.pdf"));
    }

    #[test]
    fn parse_avatar_unquoted_path() {
        let intent = parse_intent("/avatar me.png");
        assert_eq!(intent.action, "set_avatar");
        assert_eq!(intent.arg("path"), Some("me.png"));
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/analyze").action, "run_analysis");
        assert_eq!(parse_intent("/REPORT").action, "show_report");
        assert_eq!(parse_intent("/signout").action, "sign_out");
        assert_eq!(parse_intent("/exit").action, "quit");
        assert_eq!(parse_intent("/quit").action, "quit");
    }

    #[test]
    fn parse_sign_in_with_display_name() {
        let intent = parse_intent("/signin ada@example.com Ada Lovelace");
        assert_eq!(intent.action, "sign_in");
        assert_eq!(intent.arg("email"), Some("ada@example.com"));
        assert_eq!(intent.arg("display_name"), Some("Ada Lovelace"));

        let bare = parse_intent("/signin ada@example.com");
        assert_eq!(bare.arg("display_name"), None);
    }

    #[test]
    fn parse_display_name_keeps_spaces() {
        let intent = parse_intent("/name  Grace Hopper ");
        assert_eq!(intent.action, "set_display_name");
        assert_eq!(intent.arg("name"), Some("Grace Hopper"));
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
