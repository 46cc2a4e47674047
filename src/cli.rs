use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "carlease",
    version,
    about = "Interactive client for the car lease analysis backend"
)]
pub struct Cli {
    /// Backend base URL; overrides LEASE_API_URL.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Ask the backend for the faster, less thorough analysis by default.
    #[arg(long, default_value_t = false)]
    pub fast: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "upload_and_poll",
    version,
    about = "Upload one lease PDF, wait for the analysis and print it as JSON"
)]
pub struct UploadAndPollCli {
    pub pdf: PathBuf,

    #[arg(long, alias = "host")]
    pub api_url: Option<String>,

    #[arg(long, default_value_t = false)]
    pub fast: bool,

    /// Polling budget in seconds; overrides LEASE_POLL_TIMEOUT_SECS.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log in before uploading so the lease is stored under this account.
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

/// One line typed at the `carlease` prompt.
#[derive(Parser, Debug)]
#[command(
    name = "carlease",
    no_binary_name = true,
    disable_version_flag = true,
    help_template = "{subcommands}"
)]
pub struct ReplLine {
    #[command(subcommand)]
    pub command: ReplCommand,
}

impl ReplLine {
    /// Splits on whitespace and parses. `None` for a blank line.
    pub fn parse_line(line: &str) -> Option<Result<Self, clap::Error>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        Some(Self::try_parse_from(words))
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ReplCommand {
    /// Check that the backend is reachable
    Health,
    /// Create an account
    Register(CredentialArgs),
    /// Log in and keep the token for this session
    Login(CredentialArgs),
    /// Log out and forget the token
    Logout,
    /// Show who is logged in
    Whoami,
    /// Upload a lease PDF for analysis
    Upload(UploadArgs),
    /// Show where the current analysis stands
    Status,
    /// Show the current analysis
    Show,
    /// Save the current analysis under a name
    Save {
        #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// List saved contracts
    Saved,
    /// Remove a saved contract
    Remove { index: usize },
    /// Compare saved contracts (all of them when no indices are given)
    Compare { indices: Vec<usize> },
    /// List leases stored on the backend for this account
    History {
        /// Add them to the saved contracts
        #[arg(long, default_value_t = false)]
        import: bool,
    },
    /// Pick the saved contract to chat about
    Select { index: usize },
    /// Ask a question about the selected contract
    Chat {
        #[arg(required = true, trailing_var_arg = true, num_args = 1.., allow_hyphen_values = true)]
        message: Vec<String>,
    },
    /// Show the chat transcript
    Transcript,
    /// Leave
    #[command(alias = "exit")]
    Quit,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CredentialArgs {
    pub username: String,
    pub password: String,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct UploadArgs {
    pub path: PathBuf,

    #[arg(long, default_value_t = false)]
    pub fast: bool,
}

/// Converts the 1-based index shown to the user.
pub fn zero_based(index: usize) -> Option<usize> {
    index.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ReplCommand {
        ReplLine::parse_line(line).unwrap().unwrap().command
    }

    #[test]
    fn test_blank_line() {
        assert!(ReplLine::parse_line("   ").is_none());
    }

    #[test]
    fn test_upload_with_fast_flag() {
        assert_eq!(
            parse("upload leases/civic.pdf --fast"),
            ReplCommand::Upload(UploadArgs {
                path: PathBuf::from("leases/civic.pdf"),
                fast: true
            })
        );
    }

    #[test]
    fn test_multi_word_arguments() {
        assert_eq!(
            parse("save Honda Civic 2023"),
            ReplCommand::Save {
                name: vec!["Honda".into(), "Civic".into(), "2023".into()]
            }
        );
        assert_eq!(
            parse("chat is the -fee negotiable?"),
            ReplCommand::Chat {
                message: vec!["is".into(), "the".into(), "-fee".into(), "negotiable?".into()]
            }
        );
    }

    #[test]
    fn test_compare_indices_optional() {
        assert_eq!(parse("compare"), ReplCommand::Compare { indices: vec![] });
        assert_eq!(parse("compare 1 3"), ReplCommand::Compare { indices: vec![1, 3] });
    }

    #[test]
    fn test_unknown_command_is_error() {
        assert!(ReplLine::parse_line("frobnicate").unwrap().is_err());
        assert!(ReplLine::parse_line("remove one").unwrap().is_err());
    }

    #[test]
    fn test_zero_based() {
        assert_eq!(zero_based(1), Some(0));
        assert_eq!(zero_based(0), None);
    }
}
