use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    mgen_konnector::run().await
}
