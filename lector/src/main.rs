use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    lector::app::run().await
}
