use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cubepick::app::main().await
}
