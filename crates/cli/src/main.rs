use std::process::ExitCode;

fn main() -> ExitCode {
    bizassist_cli::run()
}
