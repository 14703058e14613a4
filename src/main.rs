//! Binary entrypoint that launches the Doctor Chat Bot service.

use std::process::ExitCode;

use doctor_chat_bot::start_doctor_chat;

/// Load configuration from the environment and serve the chat UI and API.
fn main() -> ExitCode {
    start_doctor_chat::run()
}
