//! Binary entry point: parse arguments, run one collection cycle, map the
//! outcome to an exit code.

use clap::Parser;

use kimi_usage::cli::Cli;
use kimi_usage::core::logging;
use kimi_usage::core::pipeline;
use kimi_usage::error::ExitCode;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(
        cli.effective_log_level(),
        cli.effective_log_format(),
        cli.effective_log_file(),
        cli.verbose,
    );

    let config = cli.into_config();
    let code = match pipeline::collect_once(&config).await {
        Ok(summary) => {
            if summary.destination_failures > 0 {
                tracing::warn!(
                    failures = summary.destination_failures,
                    "some destinations were not written"
                );
            }
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "collection cycle failed");
            e.exit_code()
        }
    };

    std::process::exit(code.into());
}
