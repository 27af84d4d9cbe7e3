use std::process::ExitCode;

fn main() -> ExitCode {
    mesero_cli::run()
}
