use std::process::ExitCode;

fn main() -> ExitCode {
    macuser_lib::run()
}
