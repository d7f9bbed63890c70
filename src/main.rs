use csv_upload_relay::{server, Config, Error};
use log::error;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the environment may be set directly.
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    let listener = TcpListener::bind(config.bind_addr).await?;

    server::serve(listener, config).await
}
