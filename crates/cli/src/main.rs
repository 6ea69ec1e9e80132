use std::process::ExitCode;

fn main() -> ExitCode {
    chatflow_cli::run()
}
