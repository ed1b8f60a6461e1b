use std::process::ExitCode;

fn main() -> ExitCode {
    groupware_cli::run()
}
