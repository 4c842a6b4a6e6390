//! Process-wide directory of rooms.
//!
//! [`ConnectionManager::register_client`] is the only way a connection
//! enters a room:
//! 1. non-human roles are refused,
//! 2. under the directory lock the room is found or created (exactly
//!    one room per id, even when connections race) and a member place
//!    is reserved,
//! 3. the room's dispatch task is asked to seat the client; a taken
//!    slot is refused,
//! 4. the client's pumps are started.
//!
//! Rooms with no members are evicted after an idle period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use room_core::{Role, RoomError, Slot};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ai::AiResponder;
use crate::client::{self, Client, ClientParts, Liveness};
use crate::config::Config;
use crate::connection::Connection;
use crate::room::RoomHandle;
use crate::room_task::RoomSettings;
use crate::types::{ClientHandle, ClientId};

/// Tunables the manager hands to rooms and clients.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub outbound_capacity: usize,
    pub inbound_capacity: usize,
    pub liveness: Liveness,
    pub room: RoomSettings,
}

impl ManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            outbound_capacity: config.outbound_capacity,
            inbound_capacity: config.inbound_capacity,
            liveness: Liveness {
                heartbeat_interval: config.heartbeat_interval(),
                client_timeout: config.client_timeout(),
            },
            room: RoomSettings {
                ai_system_prompt: config.ai.system_prompt.clone(),
                ai_timeout: config.ai.timeout(),
            },
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct ConnectionManager {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    ai: Arc<dyn AiResponder>,
    settings: ManagerSettings,
}

impl ConnectionManager {
    /// `settings` are expected to come from a validated [`Config`];
    /// zero queue capacities or timer periods are not accepted by tokio.
    pub fn new(ai: Arc<dyn AiResponder>, settings: ManagerSettings) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            ai,
            settings,
        }
    }

    /// Seat `conn` in `room_id` as `role` and start its pumps.
    ///
    /// On error the connection has already been closed with the reason.
    pub async fn register_client<C: Connection>(
        &self,
        room_id: &str,
        role: Role,
        conn: C,
    ) -> Result<Client, RoomError> {
        let slot = match Slot::try_from(role) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(room = %room_id, role = %role, "rejecting connection: invalid role");
                conn.reject(&e.to_string()).await;
                return Err(e);
            }
        };

        let room = self.reserve(room_id).await;

        let id = ClientId::next();
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::channel(self.settings.outbound_capacity);
        let handle = ClientHandle { id, slot, outbound };

        if let Err(e) = room.join(handle).await {
            warn!(room = %room_id, client = %id, role = %slot, error = %e, "rejecting connection");
            conn.reject(&e.to_string()).await;
            return Err(e);
        }

        info!(room = %room_id, client = %id, role = %slot, "client registered");
        Ok(client::spawn_pumps(
            conn,
            ClientParts {
                id,
                slot,
                room_id: room_id.to_string(),
                room_tx: room.sender(),
                outbound_rx,
                cancel,
                liveness: self.settings.liveness,
            },
        ))
    }

    /// Find or create the room and reserve a member place in it.
    async fn reserve(&self, room_id: &str) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;

        if rooms.get(room_id).is_some_and(RoomHandle::is_closed) {
            warn!(room = %room_id, "replacing room whose dispatch loop died");
            rooms.remove(room_id);
        }

        let room = rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!(room = %room_id, "room created");
            RoomHandle::spawn(
                room_id,
                Arc::clone(&self.ai),
                self.settings.room.clone(),
                self.settings.inbound_capacity,
            )
        });
        room.occupancy().reserve();
        room.clone()
    }

    /// Occupied slots of a room, or `None` if it does not exist.
    pub async fn occupied_slots(&self, room_id: &str) -> Option<Vec<Slot>> {
        let room = self.rooms.lock().await.get(room_id).cloned()?;
        room.occupied_slots().await.ok()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Drop rooms that have had no members for at least `idle`.
    pub async fn evict_idle_rooms(&self, idle: Duration) -> usize {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|id, room| {
            let idle = room.occupancy().is_idle(idle);
            if idle {
                info!(room = %id, "evicting idle room");
            }
            !idle
        });
        before - rooms.len()
    }

    /// Start a background task that periodically evicts idle rooms.
    pub fn start_eviction_task(self: Arc<Self>, interval: Duration, idle: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.evict_idle_rooms(idle).await;
                if removed > 0 {
                    info!(removed, "idle room sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ScriptedResponder;
    use crate::connection::memory::{self, PeerEvent};

    fn manager() -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(
            Arc::new(ScriptedResponder::new(vec![])),
            ManagerSettings::default(),
        ))
    }

    #[tokio::test]
    async fn ai_role_is_refused_without_side_effects() {
        let manager = manager();
        let (conn, mut peer) = memory::pair(4);

        let err = manager.register_client("r1", Role::Ai, conn).await.unwrap_err();

        assert_eq!(err, RoomError::InvalidRole(Role::Ai));
        assert!(matches!(peer.recv().await, Some(PeerEvent::Rejected(_))));
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_claims_seat_exactly_one() {
        let manager = manager();
        let mut tasks = Vec::new();
        let mut peers = Vec::new();

        for _ in 0..16 {
            let (conn, peer) = memory::pair(4);
            peers.push(peer);
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.register_client("fresh", Role::Interviewer, conn).await
            }));
        }

        let mut seated = Vec::new();
        let mut refused = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(client) => seated.push(client),
                Err(RoomError::SlotOccupied(Slot::Interviewer)) => refused += 1,
                Err(other) => panic!("unexpected error {other}"),
            }
        }

        assert_eq!(seated.len(), 1);
        assert_eq!(refused, 15);
        assert_eq!(manager.room_count().await, 1);
        assert_eq!(manager.occupied_slots("fresh").await, Some(vec![Slot::Interviewer]));
    }

    #[tokio::test]
    async fn idle_rooms_are_evicted_only_when_empty() {
        let manager = manager();
        let (conn, mut peer) = memory::pair(4);
        let client = manager.register_client("r1", Role::Polee, conn).await.unwrap();

        assert_eq!(manager.evict_idle_rooms(Duration::ZERO).await, 0);

        peer.disconnect();
        client.closed().await;
        // Leave is processed asynchronously by the room.
        while manager.occupied_slots("r1").await != Some(vec![]) {
            tokio::task::yield_now().await;
        }

        assert_eq!(manager.evict_idle_rooms(Duration::from_secs(3600)).await, 0);
        assert_eq!(manager.evict_idle_rooms(Duration::ZERO).await, 1);
        assert_eq!(manager.room_count().await, 0);
        assert_eq!(manager.occupied_slots("r1").await, None);
    }
}
