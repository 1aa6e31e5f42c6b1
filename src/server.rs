//! Server actor
//!
//! The process-wide registry of channels, created lazily on first
//! reference. Runs for the process lifetime; channels are not reclaimed
//! when they empty (see DESIGN.md). Lookups are request/reply messages so
//! the registry is only ever read inside this loop.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::channel::{ChannelActor, ChannelHandle};
use crate::envelope::ChannelInfo;
use crate::error::AppError;
use crate::types::ChannelId;

/// Commands accepted by the server's mailbox
#[derive(Debug)]
pub enum ServerCommand {
    /// Resolve a channel by id
    FindChannel {
        id: ChannelId,
        reply: oneshot::Sender<Option<ChannelHandle>>,
    },
    /// Atomically resolve or create+spawn a channel; at most one channel
    /// instance ever exists per id
    FindOrCreateChannel {
        info: ChannelInfo,
        reply: oneshot::Sender<ChannelHandle>,
    },
    /// Add a channel to the registry; no-op if the id already exists
    RegisterChannel {
        id: ChannelId,
        handle: ChannelHandle,
    },
    /// Remove a channel by id; no-op if absent
    UnregisterChannel { id: ChannelId },
}

/// Cloneable mailbox handle to the server actor
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<ServerCommand>,
}

impl ServerHandle {
    pub async fn find_channel(&self, id: &ChannelId) -> Result<Option<ChannelHandle>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ServerCommand::FindChannel {
                id: id.clone(),
                reply,
            })
            .map_err(|_| AppError::ActorGone)?;
        rx.await.map_err(|_| AppError::ActorGone)
    }

    pub async fn find_or_create_channel(
        &self,
        info: ChannelInfo,
    ) -> Result<ChannelHandle, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ServerCommand::FindOrCreateChannel { info, reply })
            .map_err(|_| AppError::ActorGone)?;
        rx.await.map_err(|_| AppError::ActorGone)
    }

    pub fn register_channel(&self, id: ChannelId, handle: ChannelHandle) {
        let _ = self.tx.send(ServerCommand::RegisterChannel { id, handle });
    }

    pub fn unregister_channel(&self, id: ChannelId) {
        let _ = self.tx.send(ServerCommand::UnregisterChannel { id });
    }
}

/// The server actor: sole owner of the channel registry
pub struct ServerActor {
    channels: HashMap<ChannelId, ChannelHandle>,
    receiver: mpsc::UnboundedReceiver<ServerCommand>,
}

impl ServerActor {
    /// Spawn the server actor task and return its handle
    pub fn spawn() -> ServerHandle {
        let (tx, receiver) = mpsc::unbounded_channel();
        let actor = Self {
            channels: HashMap::new(),
            receiver,
        };
        tokio::spawn(actor.run());
        ServerHandle { tx }
    }

    async fn run(mut self) {
        info!("server actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("server actor stopped");
    }

    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::FindChannel { id, reply } => {
                let _ = reply.send(self.channels.get(&id).cloned());
            }
            ServerCommand::FindOrCreateChannel { info, reply } => {
                let channel = self
                    .channels
                    .entry(info.id.clone())
                    .or_insert_with(|| {
                        info!(channel = %info.id, "channel created");
                        ChannelActor::spawn(info)
                    })
                    .clone();
                let _ = reply.send(channel);
            }
            ServerCommand::RegisterChannel { id, handle } => {
                self.channels.entry(id).or_insert(handle);
            }
            ServerCommand::UnregisterChannel { id } => {
                if self.channels.remove(&id).is_some() {
                    debug!(channel = %id, "channel unregistered");
                }
            }
        }
    }
}
