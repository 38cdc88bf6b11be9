use clap::{Parser, Subcommand};

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<std::path::PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(author = "hamsterbar contributors")]
#[command(version, about = "Hamster time tracking status for your bar")]
pub(super) struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Override path to the configuration directory (directory that contains hamsterbar.json)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Action {
    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::shells::Shell,
    },

    /// Run the panel, printing one JSON line per update to stdout.
    #[command(name = "daemon", alias = "d")]
    Daemon,

    #[command(flatten)]
    WithHamster(ActionWithHamster),
}

/// One-shot commands that talk to the running hamster services.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ActionWithHamster {
    /// Stop tracking the ongoing activity
    #[command(name = "stop")]
    Stop,

    /// Start tracking an activity, e.g. `coding@work #rust`
    #[command(name = "start")]
    Start { activity: String },

    /// Open the dialog to add a new fact
    #[command(name = "add")]
    Add,

    /// Open the dialog to edit the fact with the given id
    #[command(name = "edit")]
    Edit { id: i32 },

    /// Open the hamster overview
    #[command(name = "overview")]
    Overview,

    /// Open the hamster preferences
    #[command(name = "preferences", alias = "prefs")]
    Preferences,

    /// Print today's facts and their total
    #[command(name = "today")]
    Today,

    /// Print the known activities
    #[command(name = "activities")]
    Activities {
        /// Only list activities matching this
        #[arg(default_value = "")]
        search: String,
    },
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, config, action } = other;
        Opt { log_debug, config_path: config, action }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Opt {
        RawOpt::try_parse_from(std::iter::once("hamsterbar").chain(args.iter().copied())).unwrap().into()
    }

    #[test]
    fn test_command_is_valid() {
        RawOpt::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let opt = parse(&["daemon", "--debug", "--config", "/tmp/hamsterbar"]);
        assert_eq!(opt, Opt { log_debug: true, config_path: Some("/tmp/hamsterbar".into()), action: Action::Daemon });
    }

    #[test]
    fn test_hamster_actions() {
        assert_eq!(parse(&["stop"]).action, Action::WithHamster(ActionWithHamster::Stop));
        assert_eq!(
            parse(&["start", "coding@work"]).action,
            Action::WithHamster(ActionWithHamster::Start { activity: "coding@work".to_string() })
        );
        assert_eq!(parse(&["edit", "42"]).action, Action::WithHamster(ActionWithHamster::Edit { id: 42 }));
        assert_eq!(
            parse(&["activities"]).action,
            Action::WithHamster(ActionWithHamster::Activities { search: String::new() })
        );
    }

    #[test]
    fn test_edit_requires_numeric_id() {
        assert!(RawOpt::try_parse_from(["hamsterbar", "edit", "latest"]).is_err());
    }
}
