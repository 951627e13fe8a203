use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use strands_config::ProviderKind;

/// Strands: a terminal chat assistant with tool use.
#[derive(Parser, Debug)]
#[command(name = "strands", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error, or a full filter directive).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Model provider override.
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Model id override.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Session id to chat in.
    #[arg(short = 's', long, default_value = "default")]
    pub session: String,

    /// Send one prompt, print the answer, and exit.
    #[arg(short = 'p', long)]
    pub prompt: Option<String>,

    /// Attach an image or document to the prompt. Repeatable.
    #[arg(short = 'a', long = "attach", value_name = "PATH", requires = "prompt")]
    pub attachments: Vec<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Bedrock,
    Claude,
    Scripted,
}

impl From<Provider> for ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Bedrock => ProviderKind::Bedrock,
            Provider::Claude => ProviderKind::Claude,
            Provider::Scripted => ProviderKind::Scripted,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["strands"]).unwrap();
        assert_eq!(args.session, "default");
        assert!(args.prompt.is_none());
        assert!(args.provider.is_none());
        assert!(args.attachments.is_empty());
        assert!(!args.print_config);
    }

    #[test]
    fn attachments_need_a_prompt() {
        let args = Args::try_parse_from([
            "strands", "-p", "compare", "-a", "a.pdf", "--attach", "b.png",
        ])
        .unwrap();
        assert_eq!(
            args.attachments,
            vec![PathBuf::from("a.pdf"), PathBuf::from("b.png")]
        );
        assert!(Args::try_parse_from(["strands", "--attach", "a.pdf"]).is_err());
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "strands",
            "--provider",
            "scripted",
            "-m",
            "claude-sonnet-4-5-20250929",
            "-p",
            "2+2",
            "--config",
            "/tmp/strands.toml",
        ])
        .unwrap();
        assert_eq!(args.provider, Some(Provider::Scripted));
        assert_eq!(ProviderKind::from(args.provider.unwrap()), ProviderKind::Scripted);
        assert_eq!(args.model.as_deref(), Some("claude-sonnet-4-5-20250929"));
        assert_eq!(args.prompt.as_deref(), Some("2+2"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/strands.toml")));
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(Args::try_parse_from(["strands", "--provider", "gemini"]).is_err());
    }
}
