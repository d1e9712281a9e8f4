use dotenv::dotenv;
use log::info;

use kenobot::commands::start;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Starting kenobot");
    start().await
}
