mod cli;
mod render;
mod repl;
mod setup;

use std::process::ExitCode;

use strands_agent::UserInput;
use strands_common::{SessionId, StrandsError};
use strands_config::StrandsConfig;
use tracing_subscriber::EnvFilter;

/// Load environment variables from a .env file (KEY=VALUE lines).
/// Variables already set in the environment win.
fn load_dotenv() {
    let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        std::path::PathBuf::from(".env"),
        // Workspace root, two levels up from crates/strands-app/
        manifest_dir.join("..").join("..").join(".env"),
    ];

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().trim_start_matches("export ").trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
        return;
    }
}

/// Map a bare level name onto the workspace crates; pass anything else
/// through as a raw filter directive.
fn log_directive(arg: Option<&str>, config: &StrandsConfig) -> String {
    match arg {
        None => config.logging.level.directive().to_string(),
        Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => {
            format!("strands={level},strands_agent={level}")
        }
        Some(raw) => raw.to_string(),
    }
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("strands=info,strands_agent=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    load_dotenv();
    let args = cli::parse();

    // An explicit --config must load; the default location falls back to defaults.
    let (mut config, config_error) = match strands_config::load_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) if args.config.is_some() => {
            eprintln!("strands: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => (StrandsConfig::default(), Some(e)),
    };

    if let Some(provider) = args.provider {
        config.model.provider = provider.into();
    }
    if let Some(model) = &args.model {
        config.model.model_id = model.clone();
    }

    init_logging(&log_directive(args.log_level.as_deref(), &config));
    tracing::info!("Strands v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    if args.print_config {
        println!("{}", strands_config::config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let session = SessionId::from(args.session.as_str());
    let prompt = match args.prompt.as_deref() {
        Some(prompt) => match repl::prompt_input(prompt, args.attachments.as_slice()) {
            Ok(input) => Some(input),
            Err(e) => {
                eprintln!("strands: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    match runtime.block_on(run(config, session, prompt)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("strands: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: StrandsConfig,
    session: SessionId,
    prompt: Option<UserInput>,
) -> Result<ExitCode, StrandsError> {
    let client = setup::build_client(&config)?;
    let controller = setup::build_controller(&config, client)?;

    match prompt {
        Some(prompt) => {
            let mut renderer = render::Renderer::new(std::io::stdout());
            let ok = repl::run_turn(&controller, &session, prompt, &mut renderer).await?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        None => {
            repl::run(&controller, &session).await?;
            tracing::info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}
