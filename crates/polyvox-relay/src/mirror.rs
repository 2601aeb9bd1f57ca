//! Best-effort Redis mirror of room membership.
//!
//! The in-process registry is authoritative; the mirror exists so external
//! tooling can inspect room occupancy. Every operation here is best
//! effort: failures are logged and never affect socket handling. The TTL
//! bounds staleness when a relay dies without cleaning up.

use redis::AsyncCommands;

/// Default TTL applied to each room's membership set.
pub const DEFAULT_MIRROR_TTL_SECS: u64 = 600;

pub struct MembershipMirror {
    client: redis::Client,
    ttl_secs: u64,
}

impl MembershipMirror {
    /// Creates a mirror against the given Redis URL. No connection is made
    /// until the first operation.
    pub fn new(url: &str, ttl_secs: u64) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            ttl_secs,
        })
    }

    fn key(room_id: &str) -> String {
        format!("room:{}:peers", room_id)
    }

    /// Records a peer in the room's membership set and refreshes the TTL.
    pub async fn add(&self, room_id: &str, peer_id: &str) {
        if let Err(e) = self.try_add(room_id, peer_id).await {
            tracing::warn!(
                room_id = %room_id,
                peer_id = %peer_id,
                "membership mirror add failed: {}",
                e
            );
        }
    }

    /// Removes a peer from the room's membership set.
    pub async fn remove(&self, room_id: &str, peer_id: &str) {
        if let Err(e) = self.try_remove(room_id, peer_id).await {
            tracing::warn!(
                room_id = %room_id,
                peer_id = %peer_id,
                "membership mirror remove failed: {}",
                e
            );
        }
    }

    async fn try_add(&self, room_id: &str, peer_id: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(room_id);
        let _: i64 = conn.sadd(&key, peer_id).await?;
        let _: bool = conn.expire(&key, self.ttl_secs as i64).await?;
        Ok(())
    }

    async fn try_remove(&self, room_id: &str, peer_id: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.srem(Self::key(room_id), peer_id).await?;
        Ok(())
    }
}
