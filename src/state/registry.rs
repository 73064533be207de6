use super::{AppState, Room, RoomError};
use std::sync::Arc;

impl AppState {
    /// Look up a room, or create and register an empty one when `create` is
    /// set. Creating over an existing code fails with `AlreadyExists`; plain
    /// joins of an unknown code fail with `NotFound`.
    pub async fn get_or_create_room(
        &self,
        code: &str,
        create: bool,
    ) -> Result<Arc<Room>, RoomError> {
        let mut rooms = self.rooms.lock().await;

        if let Some(room) = rooms.get(code) {
            if create {
                return Err(RoomError::AlreadyExists(format!(
                    "room '{}' already exists, pick another code or join it instead",
                    code
                )));
            }
            return Ok(room.clone());
        }

        if !create {
            return Err(RoomError::NotFound(format!("room '{}' not found", code)));
        }

        let room = Arc::new(Room::new(code.to_string(), self.config.clone()));
        rooms.insert(code.to_string(), room.clone());
        tracing::info!(room = %code, "created room");
        Ok(room)
    }

    /// Drop the room from the directory if its last player is gone. Called
    /// after every departure and after every kick. The emptiness check reads
    /// the room's atomic player count, so the directory lock is never held
    /// while waiting on a room lock.
    pub async fn remove_room_if_empty(&self, room: &Room) {
        let mut rooms = self.rooms.lock().await;
        if room.player_count() == 0 && rooms.remove(&room.code).is_some() {
            tracing::info!(room = %room.code, "removed empty room");
        }
    }

    /// Number of registered rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AppState, RoomError};

    #[tokio::test]
    async fn test_create_and_join_room() {
        let state = AppState::new();

        let room = state.get_or_create_room("ABCD", true).await.unwrap();
        assert_eq!(room.code, "ABCD");
        assert_eq!(state.room_count().await, 1);

        // Joining the same code returns the same room
        let joined = state.get_or_create_room("ABCD", false).await.unwrap();
        assert!(std::sync::Arc::ptr_eq(&room, &joined));
    }

    #[tokio::test]
    async fn test_create_collision_fails() {
        let state = AppState::new();
        state.get_or_create_room("ABCD", true).await.unwrap();

        let err = state.get_or_create_room("ABCD", true).await.unwrap_err();
        assert!(matches!(err, RoomError::AlreadyExists(_)));
        assert_eq!(err.code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_join_unknown_room_fails() {
        let state = AppState::new();
        let err = state.get_or_create_room("NOPE", false).await.unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_room_only_when_empty() {
        let state = AppState::new();
        let room = state.get_or_create_room("ABCD", true).await.unwrap();
        let id = room.join("ada".to_string(), None).await;

        state.remove_room_if_empty(&room).await;
        assert_eq!(state.room_count().await, 1);

        room.leave(&id).await;
        state.remove_room_if_empty(&room).await;
        assert_eq!(state.room_count().await, 0);
    }
}
