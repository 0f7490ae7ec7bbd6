mod app;

use std::process::ExitCode;

fn main() -> ExitCode {
    match app::bootstrap::build_app() {
        Ok(wiring) => app::loop_runner::run(wiring),
        Err(code) => code,
    }
}
