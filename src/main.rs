use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match vlmpilot_lib::run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "vlmpilot failed");
            eprintln!("vlmpilot: {e}");
            ExitCode::FAILURE
        }
    }
}
