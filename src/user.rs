//! Session: the per-connection user actor
//!
//! Bridges the connection pump to the routing graph. Holds the adopted
//! identity, the joined channel, the locally tracked group memberships
//! (keyed by group id), and the outbound queue. The read pump feeds decoded
//! envelopes into `handle_envelope`; every reply and forwarded copy is a
//! re-encoded mutation of the inbound envelope.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::activity::{ActivityKind, UserActivity};
use crate::channel::{ChannelHandle, GroupRef};
use crate::envelope::{
    Command, Envelope, MessageBody, ResponseCode, ResponseInfo, Target, TargetKind, UserInfo,
    MSG_CONNECTED, MSG_GROUP_JOINED,
};
use crate::error::AppError;
use crate::outbound::OutboundSender;
use crate::server::ServerHandle;
use crate::types::GroupId;

/// A user as seen by the registries: the immutable profile plus the
/// outbound queue producer
#[derive(Debug, Clone)]
pub struct UserRef {
    pub profile: UserInfo,
    pub outbound: OutboundSender,
}

/// Per-connection session state, driven by the read pump
pub struct Session {
    /// Pre-identity connection id, used in logs until connect
    conn_id: Uuid,
    server: ServerHandle,
    /// Identity adopted on `user-connect`
    profile: Option<UserInfo>,
    /// The single channel this session has joined
    channel: Option<ChannelHandle>,
    /// Joined groups within that channel, keyed by group id
    groups: HashMap<GroupId, GroupRef>,
    outbound: OutboundSender,
    activity: mpsc::UnboundedSender<UserActivity>,
}

impl Session {
    pub fn new(
        conn_id: Uuid,
        server: ServerHandle,
        outbound: OutboundSender,
        activity: mpsc::UnboundedSender<UserActivity>,
    ) -> Self {
        Self {
            conn_id,
            server,
            profile: None,
            channel: None,
            groups: HashMap::new(),
            outbound,
            activity,
        }
    }

    /// Dispatch one decoded envelope
    ///
    /// The activity event for the command is emitted before its handler
    /// runs. Commands other than connect are silently ignored until a
    /// channel has been joined. Errors returned here are fatal to the
    /// connection; protocol failures become wire responses instead.
    pub async fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), AppError> {
        let kind = match envelope.command {
            Command::UserConnect => ActivityKind::ChannelConnect,
            Command::MessageSend => ActivityKind::MessageSend,
            Command::GroupJoin => ActivityKind::GroupJoin,
            Command::GroupLeave => ActivityKind::GroupLeave,
        };
        self.emit_activity(kind, Some(envelope.clone()));

        match envelope.command {
            Command::UserConnect => self.handle_connect(envelope).await,
            Command::MessageSend if self.channel.is_some() => self.handle_send(envelope).await,
            Command::GroupJoin if self.channel.is_some() => self.handle_group_join(envelope).await,
            Command::GroupLeave if self.channel.is_some() => {
                self.handle_group_leave(envelope).await
            }
            _ => {
                debug!(conn = %self.conn_id, command = ?envelope.command, "command before connect ignored");
                Ok(())
            }
        }
    }

    /// Full disconnect sequence, run when the read pump exits for any
    /// reason: activity event, channel unregistration (which cascades into
    /// group memberships), outbound shutdown.
    pub async fn disconnect(&mut self) {
        self.emit_activity(ActivityKind::Disconnect, None);

        if let (Some(channel), Some(profile)) = (&self.channel, &self.profile) {
            channel.unregister_user(profile.id.clone());
        }

        self.outbound.shutdown().await;
    }

    async fn handle_connect(&mut self, mut envelope: Envelope) -> Result<(), AppError> {
        let (Some(user), Some(chan)) = (envelope.user.clone(), envelope.channel.clone()) else {
            envelope.response = Some(ResponseInfo::failure(ResponseCode::InvalidPayload));
            return self.reply(&envelope);
        };

        debug!(conn = %self.conn_id, user = %user.id, channel = %chan.id, "user connecting");

        let channel = self.server.find_or_create_channel(chan).await?;
        channel.register_user(UserRef {
            profile: user.clone(),
            outbound: self.outbound.clone(),
        });
        self.profile = Some(user);
        self.channel = Some(channel);

        envelope.message = Some(MessageBody::text(MSG_CONNECTED));
        envelope.response = Some(ResponseInfo::success());
        self.reply(&envelope)
    }

    async fn handle_send(&mut self, mut envelope: Envelope) -> Result<(), AppError> {
        let (Some(_), Some(target)) = (envelope.message.as_ref(), envelope.target.clone()) else {
            envelope.response = Some(ResponseInfo::failure(ResponseCode::InvalidPayload));
            return self.reply(&envelope);
        };

        match target.kind {
            TargetKind::Direct => self.send_direct(envelope, target).await,
            TargetKind::Group => self.send_group(envelope, target).await,
        }
    }

    async fn send_direct(&mut self, mut envelope: Envelope, target: Target) -> Result<(), AppError> {
        let Some(target_user) = target.user else {
            return Ok(());
        };
        let Some(channel) = self.channel.clone() else {
            return Ok(());
        };

        match channel.find_user(&target_user.id).await? {
            None => {
                envelope.user = self.profile.clone();
                envelope.response =
                    Some(ResponseInfo::failure(ResponseCode::UserTargetNotConnected));
                self.reply(&envelope)
            }
            Some(peer) => {
                // The target receives a copy of the envelope as sent.
                self.forward(&peer, envelope.encode()?);

                envelope.user = self.profile.clone();
                if let Some(t) = envelope.target.as_mut() {
                    t.user = Some(peer.profile.clone());
                }
                envelope.response = Some(ResponseInfo::success());
                self.reply(&envelope)
            }
        }
    }

    async fn send_group(&mut self, mut envelope: Envelope, target: Target) -> Result<(), AppError> {
        let Some(target_group) = target.group else {
            return Ok(());
        };
        let (Some(channel), Some(profile)) = (self.channel.clone(), self.profile.clone()) else {
            return Ok(());
        };

        match channel.find_group(&target_group.id).await? {
            None => {
                envelope.user = Some(profile);
                envelope.response =
                    Some(ResponseInfo::failure(ResponseCode::GroupTargetNotConnected));
                self.reply(&envelope)
            }
            Some(group) => {
                envelope.user = Some(profile.clone());
                if let Some(t) = envelope.target.as_mut() {
                    t.group = Some(group.info.clone());
                }

                // Fan-out runs inside the group's own loop, excluding the
                // sender.
                group.handle.broadcast(envelope.encode()?, profile.id);

                envelope.response = Some(ResponseInfo::success());
                self.reply(&envelope)
            }
        }
    }

    async fn handle_group_join(&mut self, mut envelope: Envelope) -> Result<(), AppError> {
        let Some(group_info) = envelope.group.clone() else {
            envelope.response = Some(ResponseInfo::failure(ResponseCode::InvalidPayload));
            return self.reply(&envelope);
        };
        let (Some(channel), Some(profile)) = (self.channel.clone(), self.profile.clone()) else {
            return Ok(());
        };

        let user_ref = UserRef {
            profile: profile.clone(),
            outbound: self.outbound.clone(),
        };
        // Registration is confirmed by the group. A rejection means the
        // group dissolved after we resolved it; its unregistration was
        // queued at the channel before the rejection reply, so re-resolving
        // lands us in a fresh instance.
        let group = loop {
            let group = channel.find_or_create_group(group_info.clone()).await?;
            match group.handle.register_user(user_ref.clone()).await {
                Ok(true) => break group,
                Ok(false) | Err(AppError::ActorGone) => {
                    debug!(conn = %self.conn_id, group = %group.info.id, "group dissolved during join, retrying");
                }
                Err(e) => return Err(e),
            }
        };
        self.groups.insert(group.info.id.clone(), group.clone());

        envelope.user = Some(profile);
        envelope.group = Some(group.info);
        envelope.message = Some(MessageBody::text(MSG_GROUP_JOINED));
        envelope.response = Some(ResponseInfo::success());
        self.reply(&envelope)
    }

    async fn handle_group_leave(&mut self, mut envelope: Envelope) -> Result<(), AppError> {
        let Some(group_info) = envelope.group.clone() else {
            envelope.response = Some(ResponseInfo::failure(ResponseCode::InvalidPayload));
            return self.reply(&envelope);
        };
        let (Some(channel), Some(profile)) = (self.channel.clone(), self.profile.clone()) else {
            return Ok(());
        };

        // Unknown group id: no-op, no response.
        let Some(group) = channel.find_group(&group_info.id).await? else {
            return Ok(());
        };

        self.groups.remove(&group.info.id);
        group.handle.unregister_user(profile.id.clone());

        envelope.user = Some(profile);
        envelope.group = Some(group.info);
        envelope.response = Some(ResponseInfo::success());
        self.reply(&envelope)
    }

    /// Encode and enqueue a reply to this session's own queue
    ///
    /// A full queue drops the reply (recoverable); a closed queue means the
    /// write pump is gone and the connection is already dying.
    fn reply(&self, envelope: &Envelope) -> Result<(), AppError> {
        let frame = envelope.encode()?;
        match self.outbound.enqueue(frame) {
            Ok(()) => Ok(()),
            Err(AppError::QueueFull) => {
                warn!(conn = %self.conn_id, "own outbound queue full, reply dropped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort delivery of a forwarded copy to another user's queue
    fn forward(&self, peer: &UserRef, frame: String) {
        match peer.outbound.enqueue(frame) {
            Ok(()) => {}
            Err(AppError::QueueFull) => {
                warn!(conn = %self.conn_id, peer = %peer.profile.id, "peer queue full, copy dropped");
            }
            Err(_) => {
                debug!(conn = %self.conn_id, peer = %peer.profile.id, "peer queue closed, copy dropped");
            }
        }
    }

    fn emit_activity(&self, kind: ActivityKind, envelope: Option<Envelope>) {
        let _ = self.activity.send(UserActivity { kind, envelope });
    }
}
