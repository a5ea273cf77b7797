use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "repograde",
    version,
    about = "Analyze and grade repository combinations"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into an exit code.
///
/// Exit codes:
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — selection/repository not found
///   4 — database error
///   5 — scanner/analysis toolchain error
///   6 — LLM API error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("not found") || lower.contains("no matching selection") {
        3
    } else if lower.contains("config") {
        2
    } else if lower.contains("sqlite") || lower.contains("store error") {
        4
    } else if lower.contains("scan") || lower.contains("scanner") || lower.contains("clone failed")
    {
        5
    } else if lower.contains("llm") {
        6
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // reqwest is built without a default TLS provider; every HTTP
    // client in the process depends on this install. A failure means a
    // provider is already in place, which is just as good.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
