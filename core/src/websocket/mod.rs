//! WebSocket support (C10: live collaboration fan-out)
//!
//! WebSocket connections upgrade from HTTP on the same port as the REST and
//! GraphQL surfaces. Room membership and broadcast fan-out are owned by a
//! single background task (see [`RoomManager`]) reached through a cloneable
//! [`SharedRoomManager`] handle — no actor runtime, just an `mpsc` command
//! channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use questforge_core::prelude::*;
//! use questforge_core::websocket::{WebSocketUpgrade, WebSocket, SharedRoomManager};
//!
//! async fn ws_handler(
//!     ws: WebSocketUpgrade,
//!     State(rooms): State<SharedRoomManager>,
//! ) -> impl IntoResponse {
//!     ws.on_upgrade(|socket| handle_socket(socket, rooms))
//! }
//!
//! async fn handle_socket(mut socket: WebSocket, rooms: SharedRoomManager) {
//!     while let Some(Ok(msg)) = socket.recv().await {
//!         // Handle WebSocket messages
//!     }
//! }
//! ```

mod broadcast;
mod config;
mod handler;
mod messages;
mod rooms;

// Re-exports
pub use broadcast::{BroadcastTarget, Broadcaster};
pub use config::{RoomConfig, WebSocketConfig};
pub use handler::{ConnectionId, WebSocketConnection};
pub use messages::{
    BroadcastToRoom, ConnectionDisconnected, GetRoomInfo, JoinRoomRequest, LeaveRoomRequest,
    RoomInfoResponse,
};
pub use rooms::{Room, RoomId, RoomManager, RoomManagerHandle, RoomMember, SharedRoomManager};

// Re-export axum WebSocket types for convenience
pub use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
