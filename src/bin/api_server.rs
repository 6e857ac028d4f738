//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Entry point of the order intake API. Connects to the order store and to RabbitMQ, then
// serves HTTP until Ctrl-C.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rabbitmq::RabbitMQBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

use order_intake::{
    Api, Config, OrderServiceImpl,
    outbounds::{messaging::RabbitMessagePublisher, persistence::PostgresOrderRepository},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP API accepting orders and publishing them to the orders queue")]
struct Args {
    /// Address to bind, overrides API_ADDR
    #[arg(short, long)]
    addr: Option<SocketAddr>,

    /// Maximum log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = Config::try_from_env().map_err(anyhow::Error::msg)?;
    let addr = args.addr.unwrap_or(config.api_addr);

    let repository = PostgresOrderRepository::connect(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to the order store")?;
    repository.migrate().await.context("migrating the order store")?;

    let client = RabbitMQBuilder::new(&config.rabbit_url, &config.app_id)
        .publisher(&config.orders_queue)
        .build()
        .await
        .context("connecting to RabbitMQ")?;
    let connection = client.connection();
    let publisher = client.get_publishers().take_ownership(&config.orders_queue)?;

    let order_service = OrderServiceImpl::new(
        Arc::new(repository),
        Arc::new(RabbitMessagePublisher::new(publisher.get_dispatcher())),
        config.limits.clone(),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        shutdown.cancel();
    });

    Api::new(addr, Arc::new(order_service))
        .serve(cancel.cancelled_owned())
        .await
        .context("serving the API")?;

    publisher.close().await?;
    connection.close().await?;

    info!("API server exited");
    Ok(())
}
