use clap::Parser;

use lagtty::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (stderr; stdout belongs to the shaped session)
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        lagtty::logging::init_json();
    } else {
        lagtty::logging::init();
    }

    if cli.list_profiles {
        lagtty::profiles::print_listing();
        return;
    }

    if cli.command.is_empty() {
        eprintln!("lagtty: simulate laggy terminal connections");
        eprintln!();
        eprintln!("error: no command specified");
        eprintln!();
        eprintln!("Usage: lagtty [flags] -- <command> [args...]");
        eprintln!();
        eprintln!("Quick examples:");
        eprintln!("  lagtty --serial 9600 -- bash      # 9600 baud serial");
        eprintln!("  lagtty --profile 3g -- htop       # 3G mobile network");
        eprintln!("  lagtty --rtt 200ms -- vim         # 200ms round-trip latency");
        eprintln!();
        eprintln!("Run 'lagtty --help' for full options.");
        std::process::exit(1);
    }

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    // process::exit also skips dropping the runtime, which matters here:
    // the upstream reader may still be parked on a blocking stdin read.
    match lagtty::session::run(settings).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("session failed: {e}");
            std::process::exit(1);
        }
    }
}
