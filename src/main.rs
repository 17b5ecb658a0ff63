use std::process::ExitCode;

fn main() -> ExitCode {
    steam_monitor_lib::run()
}
