use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match congestion_history_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
