//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Entry point of the order worker. Consumes the orders queue into the order store until
// Ctrl-C, dead-lettering messages that keep failing.
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rabbitmq::RabbitMQBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

use order_intake::{
    Config, OrderMessageHandlerImpl, OrderWorker,
    domain::ports::QueueError,
    outbounds::{
        messaging::{RabbitDeliverySource, RabbitMessagePublisher},
        persistence::PostgresOrderRepository,
    },
};

/// Prefetch of the orders subscription; one message in flight per worker.
const PREFETCH: u16 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "Consumes the orders queue into the order store")]
struct Args {
    /// Maximum log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Failed deliveries of one message before it is dead-lettered, overrides MAX_DELIVERY_ATTEMPTS
    #[arg(short, long)]
    max_delivery_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = Config::try_from_env().map_err(anyhow::Error::msg)?;
    let max_delivery_attempts = args
        .max_delivery_attempts
        .unwrap_or(config.max_delivery_attempts);

    let repository = PostgresOrderRepository::connect(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to the order store")?;
    repository.migrate().await.context("migrating the order store")?;

    let (client, server) = RabbitMQBuilder::new(&config.rabbit_url, &config.app_id)
        .publisher(&config.dead_letter_queue)
        .subscriber(&config.orders_queue, PREFETCH)
        .build()
        .await
        .context("connecting to RabbitMQ")?;
    let connection = server.connection();
    let dead_letter = client.get_publishers().take_ownership(&config.dead_letter_queue)?;
    let subscription = server.get_subscribers().take_ownership(&config.orders_queue)?;

    let worker = OrderWorker::new(Arc::new(OrderMessageHandlerImpl::new(Arc::new(repository))))
        .with_dead_letter(
            Arc::new(RabbitMessagePublisher::new(dead_letter.get_dispatcher())),
            max_delivery_attempts,
        );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        shutdown.cancel();
    });

    info!(
        "Consuming {} (dead-letter queue {}, max attempts {})",
        config.orders_queue, config.dead_letter_queue, max_delivery_attempts
    );

    let run_result = worker
        .run(
            async move { Ok::<_, QueueError>(RabbitDeliverySource::new(subscription)) },
            cancel,
        )
        .await;

    dead_letter.close().await?;
    connection.close().await?;

    run_result?;
    info!("Order worker exited");
    Ok(())
}
