//! `wa-core` binary entry point.

use clap::Parser;
use tracing::error;
use wa_core::cli::{execute, Cli};
use wa_core::exit_codes::ExitCode;
use wa_core::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let code = match execute(&cli) {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            let code = ExitCode::from_error(&err);
            error!(
                error = %err,
                error_code = err.code(),
                exit_code = code.as_i32(),
                "command failed"
            );
            code
        }
    };
    std::process::exit(code.as_i32());
}
