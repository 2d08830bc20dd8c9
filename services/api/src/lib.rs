mod cli;
mod infra;
mod routes;
mod server;

use onest_adapter::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
