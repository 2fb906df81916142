use std::sync::Arc;

use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use slack_scheduler::{
    application::{
        handlers::dispatch_worker::DispatchWorker,
        scheduler::Scheduler,
        services::clock::{Clock, SystemClock},
        usecases::{
            cancel_message::CancelMessageUseCase, get_message::GetMessageUseCase,
            list_channels::ListChannelsUseCase, list_messages::ListMessagesUseCase,
            schedule_message::ScheduleMessageUseCase,
        },
    },
    config::Config,
    domain::repositories::{CredentialRepository, ScheduledMessageStore},
    infrastructure::{
        provider::slack::SlackClient,
        repositories::{
            in_memory::{InMemoryCredentialRepository, InMemoryScheduledMessageStore},
            postgres::{PostgresCredentialRepository, PostgresScheduledMessageStore},
        },
    },
    presentation::http::endpoints::{
        channels::ChannelsEndpoints, health::HealthEndpoints, messages::MessagesEndpoints,
        root::ApiState,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::try_parse().map_err(anyhow::Error::msg)?;

    let (store, credentials): (Arc<dyn ScheduledMessageStore>, Arc<dyn CredentialRepository>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                (
                    PostgresScheduledMessageStore::new(pool.clone()),
                    PostgresCredentialRepository::new(pool),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, falling back to the in-memory store");
                (
                    Arc::new(InMemoryScheduledMessageStore::new()),
                    Arc::new(InMemoryCredentialRepository::new()),
                )
            }
        };

    let provider = SlackClient::new(config.slack_base_url.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        credentials.clone(),
        provider.clone(),
        clock.clone(),
        config.retry.clone(),
    ));
    let scheduler = Scheduler::new(store.clone(), worker, clock, config.scheduler.clone());
    scheduler.start().await;

    let state = Arc::new(ApiState {
        schedule_message_usecase: Arc::new(ScheduleMessageUseCase::new(store.clone())),
        cancel_message_usecase: Arc::new(CancelMessageUseCase::new(store.clone())),
        list_messages_usecase: Arc::new(ListMessagesUseCase::new(store.clone())),
        get_message_usecase: Arc::new(GetMessageUseCase::new(store.clone())),
        list_channels_usecase: Arc::new(ListChannelsUseCase::new(credentials, provider)),
    });

    let api_service = OpenApiService::new(
        (
            HealthEndpoints,
            MessagesEndpoints::new(state.clone()),
            ChannelsEndpoints::new(state),
        ),
        "Slack Scheduler API",
        "0.1.0",
    )
    .server(format!("http://localhost:{}/api", config.port));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    tracing::info!(port = config.port, "starting server");
    Server::new(TcpListener::bind(("0.0.0.0", config.port)))
        .run(app)
        .await?;

    scheduler.stop().await;
    Ok(())
}
