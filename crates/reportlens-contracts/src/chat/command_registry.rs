#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "pick",
        action: "pick_file",
    },
    CommandSpec {
        command: "avatar",
        action: "set_avatar",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "analyze",
        action: "run_analysis",
    },
    CommandSpec {
        command: "report",
        action: "show_report",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "whoami",
        action: "whoami",
    },
    CommandSpec {
        command: "signout",
        action: "sign_out",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const DISPLAY_NAME_COMMAND: CommandSpec = CommandSpec {
    command: "name",
    action: "set_display_name",
};

pub(crate) const SIGN_IN_COMMAND: CommandSpec = CommandSpec {
    command: "signin",
    action: "sign_in",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/pick",
    "/analyze",
    "/report",
    "/reset",
    "/whoami",
    "/signin",
    "/signout",
    "/name",
    "/avatar",
    "/status",
    "/help",
    "/quit",
];
