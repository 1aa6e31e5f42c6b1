//! Channel actor
//!
//! Owns one top-level scope: the registry of connected users and the
//! registry of live groups. It is the name-resolution point for routing:
//! all lookups are request/reply messages through the mailbox, never direct
//! map reads from a foreign task.
//!
//! Unregistering a user cascades into every group the channel owns, so a
//! disconnect cleans up group memberships without the session walking them.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::envelope::{ChannelInfo, GroupInfo};
use crate::error::AppError;
use crate::group::{GroupActor, GroupHandle};
use crate::types::{GroupId, UserId};
use crate::user::UserRef;

/// A group as seen from outside its actor: the immutable descriptor plus
/// the mailbox handle
#[derive(Debug, Clone)]
pub struct GroupRef {
    pub info: GroupInfo,
    pub handle: GroupHandle,
}

/// Commands accepted by a channel's mailbox
#[derive(Debug)]
pub enum ChannelCommand {
    /// Add a user to the channel registry (last-wins on duplicate ids)
    RegisterUser(UserRef),
    /// Remove a user and cascade the removal into every group
    UnregisterUser(UserId),
    /// Add a group to the registry; no-op if the id already exists
    RegisterGroup(GroupRef),
    /// Remove a group by id; no-op if absent
    UnregisterGroup(GroupId),
    /// Atomically resolve or create+spawn a group
    FindOrCreateGroup {
        info: GroupInfo,
        reply: oneshot::Sender<GroupRef>,
    },
    /// Resolve a connected user by id
    FindUser {
        id: UserId,
        reply: oneshot::Sender<Option<UserRef>>,
    },
    /// Resolve a live group by id
    FindGroup {
        id: GroupId,
        reply: oneshot::Sender<Option<GroupRef>>,
    },
}

/// Cloneable mailbox handle to one channel actor
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<ChannelCommand>,
}

impl ChannelHandle {
    pub fn register_user(&self, user: UserRef) {
        let _ = self.tx.send(ChannelCommand::RegisterUser(user));
    }

    pub fn unregister_user(&self, id: UserId) {
        let _ = self.tx.send(ChannelCommand::UnregisterUser(id));
    }

    pub fn register_group(&self, group: GroupRef) {
        let _ = self.tx.send(ChannelCommand::RegisterGroup(group));
    }

    pub fn unregister_group(&self, id: GroupId) {
        let _ = self.tx.send(ChannelCommand::UnregisterGroup(id));
    }

    pub async fn find_or_create_group(&self, info: GroupInfo) -> Result<GroupRef, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ChannelCommand::FindOrCreateGroup { info, reply })
            .map_err(|_| AppError::ActorGone)?;
        rx.await.map_err(|_| AppError::ActorGone)
    }

    pub async fn find_user(&self, id: &UserId) -> Result<Option<UserRef>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ChannelCommand::FindUser {
                id: id.clone(),
                reply,
            })
            .map_err(|_| AppError::ActorGone)?;
        rx.await.map_err(|_| AppError::ActorGone)
    }

    pub async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRef>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ChannelCommand::FindGroup {
                id: id.clone(),
                reply,
            })
            .map_err(|_| AppError::ActorGone)?;
        rx.await.map_err(|_| AppError::ActorGone)
    }
}

/// The channel actor: one spawned task per channel, sole owner of its
/// user and group registries
pub struct ChannelActor {
    info: ChannelInfo,
    users: HashMap<UserId, UserRef>,
    groups: HashMap<GroupId, GroupRef>,
    /// Own handle, passed to spawned groups so they can report emptiness
    handle: ChannelHandle,
    receiver: mpsc::UnboundedReceiver<ChannelCommand>,
}

impl ChannelActor {
    /// Spawn a channel actor task and return its handle
    pub fn spawn(info: ChannelInfo) -> ChannelHandle {
        let (tx, receiver) = mpsc::unbounded_channel();
        let handle = ChannelHandle { tx };
        let actor = Self {
            info,
            users: HashMap::new(),
            groups: HashMap::new(),
            handle: handle.clone(),
            receiver,
        };
        tokio::spawn(actor.run());
        handle
    }

    async fn run(mut self) {
        info!(channel = %self.info.id, "channel actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(channel = %self.info.id, "channel actor stopped");
    }

    fn handle_command(&mut self, cmd: ChannelCommand) {
        match cmd {
            ChannelCommand::RegisterUser(user) => {
                info!(channel = %self.info.id, user = %user.profile.id, "user registered");
                self.users.insert(user.profile.id.clone(), user);
            }
            ChannelCommand::UnregisterUser(id) => {
                if self.users.remove(&id).is_some() {
                    info!(channel = %self.info.id, user = %id, "user unregistered");
                }
                // Cascade regardless: groups that empty out will ask to be
                // unregistered on their own.
                for group in self.groups.values() {
                    group.handle.unregister_user(id.clone());
                }
            }
            ChannelCommand::RegisterGroup(group) => {
                self.groups.entry(group.info.id.clone()).or_insert(group);
            }
            ChannelCommand::UnregisterGroup(id) => {
                if self.groups.remove(&id).is_some() {
                    debug!(channel = %self.info.id, group = %id, "group unregistered");
                }
            }
            ChannelCommand::FindOrCreateGroup { info, reply } => {
                let owner = self.handle.clone();
                let channel_id = self.info.id.clone();
                let group = self
                    .groups
                    .entry(info.id.clone())
                    .or_insert_with(|| {
                        debug!(channel = %channel_id, group = %info.id, "group created");
                        let handle = GroupActor::spawn(info.id.clone(), owner);
                        GroupRef { info, handle }
                    })
                    .clone();
                let _ = reply.send(group);
            }
            ChannelCommand::FindUser { id, reply } => {
                let _ = reply.send(self.users.get(&id).cloned());
            }
            ChannelCommand::FindGroup { id, reply } => {
                let _ = reply.send(self.groups.get(&id).cloned());
            }
        }
    }
}
