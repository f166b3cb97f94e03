//! CLI entry point for `mailrender`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};

use mailrender::config::Config;
use mailrender::parser::eml;
use mailrender::{CommandTouchUp, FormatOptions, TouchUp, TouchUpContext};

#[derive(Parser)]
#[command(
    name = "mailrender",
    version,
    about = "Render email messages as terminal-safe text"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// `.eml` file to render
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an .eml file
    Render {
        path: PathBuf,
        #[command(flatten)]
        opts: RenderArgs,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(clap::Args, Default)]
struct RenderArgs {
    /// Wrap width in columns (0 disables wrapping)
    #[arg(short, long)]
    width: Option<usize>,

    /// Print the sections as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Run the touch-up command on the output
    #[arg(long)]
    llm: bool,

    /// Touch-up command line (reads text on stdin, writes stdout)
    #[arg(long, value_name = "CMD", env = "MAILRENDER_TOUCH_UP_CMD")]
    touch_up_cmd: Option<String>,

    /// Seconds before the touch-up command is abandoned
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailrender::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Render { path, opts }) => cmd_render(&path, &opts, &config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match cli.file {
            Some(path) => cmd_render(&path, &RenderArgs::default(), &config),
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        },
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailrender::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailrender.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Render one message and print it to stdout.
fn cmd_render(path: &Path, args: &RenderArgs, config: &Config) -> anyhow::Result<()> {
    let message = eml::parse_eml(path)?;

    let mut options = FormatOptions::from(&config.render);
    if let Some(width) = args.width {
        options.wrap_width = width;
    }
    options.use_llm |= args.llm;

    if args.json {
        let rendered = mailrender::render_sections(&message, &options)?;
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    let command_line = args
        .touch_up_cmd
        .as_deref()
        .or(config.render.touch_up_command.as_deref());
    let hook = command_line.and_then(CommandTouchUp::from_command_line);
    if options.use_llm && hook.is_none() {
        tracing::warn!("Touch-up requested but no command configured");
    }

    let timeout = args.timeout.unwrap_or(config.render.touch_up_timeout_secs);
    let ctx = TouchUpContext::with_timeout(Duration::from_secs(timeout));

    let text = mailrender::format_email_for_terminal(
        &ctx,
        &message,
        &options,
        hook.as_ref().map(|h| h as &dyn TouchUp),
    )?;
    print!("{text}");
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailrender", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
