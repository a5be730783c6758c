//! Room/channel management over a plain tokio task loop
//!
//! A single task owns [`RoomManagerState`] and drains an `mpsc` channel of
//! [`RoomCommand`]s; callers get a cheap, cloneable [`RoomManagerHandle`].
//! No shared lock: every mutation happens on the owning task, so the
//! invariants ("at most one room entry per connection tracked in
//! `connection_rooms`", "empty rooms are removed") never race.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use super::config::RoomConfig;
use super::handler::ConnectionId;
use super::messages::{
    BroadcastToRoom, ConnectionDisconnected, GetRoomInfo, JoinRoomRequest, LeaveRoomRequest,
    RoomInfoResponse,
};

/// Unique identifier for a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new room ID
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the room ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A member of a room
#[derive(Debug, Clone)]
pub struct RoomMember {
    /// The connection ID
    pub connection_id: ConnectionId,
    /// Channel for sending messages to this member
    pub sender: mpsc::Sender<Message>,
    /// Optional user ID if authenticated
    pub user_id: Option<String>,
    /// When the member joined
    pub joined_at: DateTime<Utc>,
}

impl RoomMember {
    /// Create a new room member
    #[must_use]
    pub fn new(connection_id: ConnectionId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            connection_id,
            sender,
            user_id: None,
            joined_at: Utc::now(),
        }
    }

    /// Create an authenticated room member
    #[must_use]
    pub fn authenticated(
        connection_id: ConnectionId,
        sender: mpsc::Sender<Message>,
        user_id: String,
    ) -> Self {
        Self {
            connection_id,
            sender,
            user_id: Some(user_id),
            joined_at: Utc::now(),
        }
    }
}

/// A chat room / channel
#[derive(Debug)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,
    /// Members currently in the room
    pub members: HashMap<ConnectionId, RoomMember>,
    /// When the room was created
    pub created_at: DateTime<Utc>,
    /// Last activity time (for idle cleanup)
    pub last_activity: DateTime<Utc>,
    /// Optional metadata
    pub metadata: HashMap<String, String>,
}

impl Room {
    /// Create a new empty room
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        let now = Utc::now();
        Self {
            id,
            members: HashMap::new(),
            created_at: now,
            last_activity: now,
            metadata: HashMap::new(),
        }
    }

    /// Get the number of members in the room
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if the room is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Update the last activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Owning state for the room manager task
#[derive(Debug, Default)]
struct RoomManagerState {
    /// All rooms indexed by ID
    rooms: HashMap<RoomId, Room>,
    /// Rooms each connection is a member of (for cleanup on disconnect)
    connection_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
    /// Maximum members per room
    max_members_per_room: usize,
    /// Maximum rooms per connection
    max_rooms_per_connection: usize,
}

impl RoomManagerState {
    fn handle_join(&mut self, request: JoinRoomRequest) {
        let room_id = request.room_id;
        let member = request.member;
        let connection_id = member.connection_id;

        let connection_rooms = self.connection_rooms.entry(connection_id).or_default();

        if connection_rooms.len() >= self.max_rooms_per_connection {
            tracing::warn!(
                connection_id = %connection_id,
                limit = self.max_rooms_per_connection,
                "Connection at max room limit"
            );
            return;
        }

        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));

        if room.members.len() >= self.max_members_per_room {
            tracing::warn!(
                room_id = %room_id,
                limit = self.max_members_per_room,
                "Room at max capacity"
            );
            return;
        }

        room.members.insert(connection_id, member);
        room.touch();
        connection_rooms.insert(room_id.clone());

        tracing::info!(
            room_id = %room_id,
            connection_id = %connection_id,
            member_count = room.members.len(),
            "Member joined room"
        );
    }

    fn handle_leave(&mut self, request: LeaveRoomRequest) {
        let room_id = &request.room_id;
        let connection_id = request.connection_id;

        if let Some(room) = self.rooms.get_mut(room_id) {
            room.members.remove(&connection_id);
            room.touch();

            tracing::info!(
                room_id = %room_id,
                connection_id = %connection_id,
                member_count = room.members.len(),
                "Member left room"
            );

            if room.is_empty() {
                self.rooms.remove(room_id);
                tracing::debug!(room_id = %room_id, "Empty room removed");
            }
        }

        if let Some(rooms) = self.connection_rooms.get_mut(&connection_id) {
            rooms.remove(room_id);
        }
    }

    async fn handle_broadcast(&self, request: BroadcastToRoom) {
        let room_id = &request.room_id;
        let exclude_sender = request.exclude_sender;

        let Some(room) = self.rooms.get(room_id) else {
            return;
        };

        let senders: Vec<_> = room
            .members
            .values()
            .filter(|m| {
                exclude_sender
                    .map(|id| m.connection_id != id)
                    .unwrap_or(true)
            })
            .map(|m| m.sender.clone())
            .collect();

        let total = senders.len();
        let mut sent = 0;
        for sender in senders {
            if sender.send(request.message.clone()).await.is_ok() {
                sent += 1;
            }
        }
        tracing::debug!(room_id = %room_id, sent, total, "Broadcast completed");
    }

    fn handle_disconnected(&mut self, request: ConnectionDisconnected) {
        let connection_id = request.connection_id;

        if let Some(room_ids) = self.connection_rooms.remove(&connection_id) {
            for room_id in room_ids {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    room.members.remove(&connection_id);

                    if room.is_empty() {
                        self.rooms.remove(&room_id);
                        tracing::debug!(room_id = %room_id, "Empty room removed after disconnect");
                    }
                }
            }
        }

        tracing::debug!(connection_id = %connection_id, "Connection removed from all rooms");
    }

    fn handle_room_info(&self, request: GetRoomInfo) -> RoomInfoResponse {
        let room_id = request.room_id;
        if let Some(room) = self.rooms.get(&room_id) {
            RoomInfoResponse {
                room_id,
                member_count: room.member_count(),
                exists: true,
            }
        } else {
            RoomInfoResponse {
                room_id,
                member_count: 0,
                exists: false,
            }
        }
    }
}

/// Commands accepted by the room manager task.
///
/// [`GetRoomInfo`] carries a reply channel since there's no actor envelope
/// to route a response back through.
enum RoomCommand {
    Join(JoinRoomRequest),
    Leave(LeaveRoomRequest),
    Broadcast(BroadcastToRoom),
    Disconnected(ConnectionDisconnected),
    Info(GetRoomInfo, oneshot::Sender<RoomInfoResponse>),
}

/// Shared room manager handle for `AppState` access
pub type SharedRoomManager = Arc<RoomManagerHandle>;

/// Handle to the room manager task. Cheap to clone; every clone shares the
/// same underlying command channel.
#[derive(Debug, Clone)]
pub struct RoomManagerHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    pub async fn join_room(&self, request: JoinRoomRequest) {
        let _ = self.tx.send(RoomCommand::Join(request)).await;
    }

    pub async fn leave_room(&self, request: LeaveRoomRequest) {
        let _ = self.tx.send(RoomCommand::Leave(request)).await;
    }

    pub async fn broadcast_to_room(&self, request: BroadcastToRoom) {
        let _ = self.tx.send(RoomCommand::Broadcast(request)).await;
    }

    pub async fn connection_disconnected(&self, request: ConnectionDisconnected) {
        let _ = self.tx.send(RoomCommand::Disconnected(request)).await;
    }

    /// Returns `None` if the room manager task has already shut down.
    pub async fn get_room_info(&self, request: GetRoomInfo) -> Option<RoomInfoResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Info(request, reply_tx))
            .await
            .ok()?;
        reply_rx.await.ok()
    }
}

/// Room manager: owns all room state on a single background task.
pub struct RoomManager;

impl RoomManager {
    /// Spawn the room manager task and return a handle to it.
    pub fn spawn(config: RoomConfig) -> RoomManagerHandle {
        let (tx, mut rx) = mpsc::channel::<RoomCommand>(1024);

        let mut state = RoomManagerState {
            max_members_per_room: config.max_members,
            max_rooms_per_connection: config.max_rooms_per_connection,
            ..Default::default()
        };

        tokio::spawn(async move {
            tracing::info!("WebSocket room manager started");

            while let Some(command) = rx.recv().await {
                match command {
                    RoomCommand::Join(request) => state.handle_join(request),
                    RoomCommand::Leave(request) => state.handle_leave(request),
                    RoomCommand::Broadcast(request) => state.handle_broadcast(request).await,
                    RoomCommand::Disconnected(request) => state.handle_disconnected(request),
                    RoomCommand::Info(request, reply_tx) => {
                        let _ = reply_tx.send(state.handle_room_info(request));
                    }
                }
            }

            tracing::info!(
                rooms = state.rooms.len(),
                connections = state.connection_rooms.len(),
                "WebSocket room manager shutting down"
            );
        });

        RoomManagerHandle { tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_from_string() {
        let id: RoomId = "test-room".into();
        assert_eq!(id.as_str(), "test-room");
    }

    #[test]
    fn test_room_creation() {
        let room = Room::new("test".into());
        assert!(room.is_empty());
        assert_eq!(room.member_count(), 0);
    }

    #[tokio::test]
    async fn test_room_member_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let member = RoomMember::new(ConnectionId::new(), tx);
        assert!(member.user_id.is_none());
    }

    #[tokio::test]
    async fn test_authenticated_member() {
        let (tx, _rx) = mpsc::channel(32);
        let member = RoomMember::authenticated(ConnectionId::new(), tx, "user123".to_string());
        assert_eq!(member.user_id, Some("user123".to_string()));
    }

    #[tokio::test]
    async fn join_then_info_reports_member_count() {
        let handle = RoomManager::spawn(RoomConfig {
            enabled: true,
            max_members: 10,
            max_rooms_per_connection: 10,
            idle_timeout_secs: 3600,
        });

        let (tx, _rx) = mpsc::channel(32);
        let member = RoomMember::new(ConnectionId::new(), tx);
        handle.join_room(JoinRoomRequest::new("room-1", member)).await;

        let info = handle
            .get_room_info(GetRoomInfo::new("room-1"))
            .await
            .expect("room manager task alive");
        assert!(info.exists);
        assert_eq!(info.member_count, 1);
    }

    #[tokio::test]
    async fn leave_empties_and_removes_room() {
        let handle = RoomManager::spawn(RoomConfig {
            enabled: true,
            max_members: 10,
            max_rooms_per_connection: 10,
            idle_timeout_secs: 3600,
        });

        let (tx, _rx) = mpsc::channel(32);
        let connection_id = ConnectionId::new();
        let member = RoomMember::new(connection_id, tx);
        handle.join_room(JoinRoomRequest::new("room-1", member)).await;
        handle
            .leave_room(LeaveRoomRequest::new("room-1", connection_id))
            .await;

        let info = handle
            .get_room_info(GetRoomInfo::new("room-1"))
            .await
            .expect("room manager task alive");
        assert!(!info.exists);
    }

    #[tokio::test]
    async fn disconnect_clears_all_memberships() {
        let handle = RoomManager::spawn(RoomConfig {
            enabled: true,
            max_members: 10,
            max_rooms_per_connection: 10,
            idle_timeout_secs: 3600,
        });

        let (tx, _rx) = mpsc::channel(32);
        let connection_id = ConnectionId::new();
        let member = RoomMember::new(connection_id, tx);
        handle.join_room(JoinRoomRequest::new("room-a", member.clone())).await;
        handle.join_room(JoinRoomRequest::new("room-b", member)).await;

        handle
            .connection_disconnected(ConnectionDisconnected::new(connection_id))
            .await;

        let info_a = handle
            .get_room_info(GetRoomInfo::new("room-a"))
            .await
            .unwrap();
        let info_b = handle
            .get_room_info(GetRoomInfo::new("room-b"))
            .await
            .unwrap();
        assert!(!info_a.exists);
        assert!(!info_b.exists);
    }
}
