//! Process startup: wire configuration into a ready-to-use engine.
//!
//! Order matters. The provider is built first so a missing API key fails
//! before any network traffic, then the archive is opened, then the room
//! inventory is fetched. Without rooms there is no system prompt, so a
//! failed fetch aborts startup.

use staybot_archive::ArchiveWriter;
use staybot_config::AppConfig;
use staybot_core::archive::ChatArchive;
use staybot_core::error::{PersistenceError, ProviderError};
use staybot_core::provider::Provider;
use staybot_core::tool::ToolRegistry;
use staybot_tools::{HotelApi, HotelApiError, RoomInventory, hotel_registry};
use std::sync::Arc;
use tracing::info;

use crate::engine::{ChatEngine, EngineSettings};
use crate::session::Session;
use crate::transcript::TranscriptStore;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Could not open chat archive: {0}")]
    Archive(#[from] PersistenceError),

    #[error("Could not load room inventory: {0}")]
    Rooms(#[from] HotelApiError),
}

/// Everything a transport needs to serve chats.
pub struct Runtime {
    pub config: AppConfig,
    pub engine: Arc<ChatEngine>,
    pub archive: Arc<dyn ChatArchive>,
    pub writer: ArchiveWriter,
    pub rooms: RoomInventory,
    system_prompt: String,
}

impl Runtime {
    /// Start with the provider selected by configuration.
    pub async fn start(config: AppConfig) -> Result<Self, BootstrapError> {
        let provider = staybot_providers::factory::build_from_config(&config.provider)?;
        Self::start_with_provider(config, provider).await
    }

    /// Start with an already built provider.
    pub async fn start_with_provider(
        config: AppConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, BootstrapError> {
        let archive = staybot_archive::open(&config.archive).await?;

        let hotel = Arc::new(HotelApi::new(&config.hotel.base_url));
        let rooms = hotel.fetch_rooms().await?;
        let tools = hotel_registry(hotel);

        Ok(Self::assemble(config, provider, tools, rooms, archive))
    }

    /// Wire already prepared parts together. Spawns the archive writer, so it
    /// must run inside a Tokio runtime.
    pub fn assemble(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        rooms: RoomInventory,
        archive: Arc<dyn ChatArchive>,
    ) -> Self {
        let writer = ArchiveWriter::spawn(archive.clone());
        let system_prompt = config.assistant.render(&rooms.raw);
        let settings = EngineSettings::from_config(&config);
        info!(
            provider = provider.name(),
            model = %settings.model,
            streaming = provider.is_streaming(),
            archive = archive.name(),
            rooms = rooms.len(),
            tools = tools.len(),
            "Runtime ready"
        );
        let engine = Arc::new(ChatEngine::new(provider, Arc::new(tools), settings));

        Self {
            config,
            engine,
            archive,
            writer,
            rooms,
            system_prompt,
        }
    }

    /// The rendered system prompt every session starts with.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// A fresh session whose committed turns are archived.
    pub fn new_session(&self) -> Session {
        Session::new(TranscriptStore::new(self.system_prompt.clone()).with_archive(self.writer.clone()))
    }

    /// Wait for queued archive writes.
    pub async fn shutdown(&self) {
        self.writer.flush().await;
        info!("Archive flushed");
    }
}
