use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use locale_translator::languages::find_language;
use locale_translator::pipeline::{
    init_default_config, HandlerResponse, Mode, ProcessRequest, ServiceConfig,
};
use locale_translator::server;

#[derive(Parser, Debug)]
#[command(name = "locale-translator")]
#[command(
    about = "Translate or fill locale JSON files through a chat-completion API",
    long_about = None
)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for locale-translator.toml upwards)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Listen address (overrides [server].listen)
        #[arg(long, value_name = "ADDR")]
        listen: Option<SocketAddr>,
    },
    /// Translate a locale JSON file once and exit
    Translate {
        /// Input locale .json
        #[arg(value_name = "JSON")]
        input: PathBuf,

        /// Output .json (default: stdout)
        #[arg(short, long, value_name = "JSON")]
        output: Option<PathBuf>,

        /// Language of the input values (or keys, in fillEmpty mode), e.g. en
        #[arg(long, default_value = "en")]
        from: String,

        /// Target language, e.g. de
        #[arg(long)]
        to: String,

        /// translate | fillEmpty
        #[arg(long, default_value = "translate")]
        mode: String,

        /// API key (default: OPENAI_KEY or [openai].api_key)
        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(command) = args.command else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  locale-translator serve\n  \
             locale-translator translate en.json --to de -o de.json\n\n\
             TIPS:\n  - Set OPENAI_KEY or pass --key / a \"key\" field in requests.\n  \
             - Default config search: locale-translator.toml (upwards), \
             or set LOCALE_TRANSLATOR_CONFIG.\n"
        );
        return Ok(());
    };

    let cfg = ServiceConfig::load(args.config.as_deref()).context("build config")?;

    match command {
        Command::Serve { listen } => {
            let handler = Arc::new(cfg.build_handler()?);
            server::serve(listen.unwrap_or(cfg.listen), handler).await
        }
        Command::Translate {
            input,
            output,
            from,
            to,
            mode,
            key,
        } => {
            if Mode::parse(&mode).is_none() {
                return Err(anyhow::anyhow!(
                    "unknown mode {mode:?} (expected translate or fillEmpty)"
                ));
            }
            for code in [&from, &to] {
                if find_language(code).is_none() {
                    warn!(
                        code = code.as_str(),
                        "language code is not in the catalog, sending as-is"
                    );
                }
            }
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("read input: {}", input.display()))?;

            let handler = cfg.build_handler()?;
            let req = ProcessRequest {
                text: Some(text),
                input_language: Some(from),
                output_language: Some(to),
                mode: Some(mode),
                key,
            };
            let data = match handler.handle(req).await {
                HandlerResponse::Success(data) => data,
                HandlerResponse::BadRequest(msg) | HandlerResponse::Failure(msg) => {
                    return Err(anyhow::anyhow!(msg));
                }
            };

            let mut pretty = serde_json::to_string_pretty(&data).context("serialize output")?;
            pretty.push('\n');
            match output {
                Some(path) => std::fs::write(&path, pretty)
                    .with_context(|| format!("write output: {}", path.display()))?,
                None => print!("{pretty}"),
            }
            Ok(())
        }
    }
}
