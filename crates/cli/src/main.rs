use std::process::ExitCode;

fn main() -> ExitCode {
    cobranca_cli::run()
}
