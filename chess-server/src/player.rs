//! 玩家管理

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use protocol::{PlayerId, ProtocolError, SessionId, MAX_NICKNAME_LEN};

/// 玩家状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// 在线，在大厅
    Online,
    /// 在线，在对局中
    InSession(SessionId),
    /// 断线中（对局保留，等待重连）
    Disconnected(SessionId),
}

/// 玩家信息
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String) -> Self {
        Self {
            id,
            nickname,
            status: PlayerStatus::Online,
        }
    }
}

/// 玩家管理器
pub struct PlayerManager {
    /// 玩家 ID -> 玩家信息
    players: HashMap<PlayerId, Player>,
    /// 昵称 -> 玩家 ID（昵称唯一性检查）
    nickname_to_id: HashMap<String, PlayerId>,
    /// ID 生成器
    next_id: AtomicU64,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            nickname_to_id: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> PlayerId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 验证昵称
    pub fn validate_nickname(nickname: &str) -> Result<(), ProtocolError> {
        if nickname.trim().is_empty() {
            return Err(ProtocolError::NicknameEmpty);
        }
        let len = nickname.chars().count();
        if len > MAX_NICKNAME_LEN {
            return Err(ProtocolError::NicknameTooLong {
                len,
                max: MAX_NICKNAME_LEN,
            });
        }
        Ok(())
    }

    /// 登录玩家
    pub fn login(&mut self, nickname: String) -> Result<PlayerId, ProtocolError> {
        Self::validate_nickname(&nickname)?;

        if self.nickname_to_id.contains_key(&nickname) {
            return Err(ProtocolError::NicknameOccupied);
        }

        let id = self.generate_id();
        self.players.insert(id, Player::new(id, nickname.clone()));
        self.nickname_to_id.insert(nickname, id);

        Ok(id)
    }

    /// 玩家断线，返回所在对局
    pub fn disconnect(&mut self, player_id: PlayerId) -> Option<SessionId> {
        let player = self.players.get_mut(&player_id)?;
        match player.status {
            PlayerStatus::InSession(session_id) => {
                player.status = PlayerStatus::Disconnected(session_id);
                Some(session_id)
            }
            _ => None,
        }
    }

    /// 玩家重连，返回所在对局
    pub fn reconnect(&mut self, player_id: PlayerId) -> Option<SessionId> {
        let player = self.players.get_mut(&player_id)?;
        match player.status {
            PlayerStatus::Disconnected(session_id) => {
                player.status = PlayerStatus::InSession(session_id);
                Some(session_id)
            }
            _ => None,
        }
    }

    /// 移除玩家（彻底离线）
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&player_id)?;
        self.nickname_to_id.remove(&player.nickname);
        Some(player)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn set_status(&mut self, player_id: PlayerId, status: PlayerStatus) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.status = status;
        }
    }

    pub fn get_nickname(&self, player_id: PlayerId) -> Option<&str> {
        self.players.get(&player_id).map(|p| p.nickname.as_str())
    }

    pub fn exists(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    pub fn online_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_assigns_unique_ids() {
        let mut manager = PlayerManager::new();

        let id1 = manager.login("玩家1".to_string()).unwrap();
        let id2 = manager.login("玩家2".to_string()).unwrap();

        assert!(id1 > 0);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_duplicate_nickname_rejected() {
        let mut manager = PlayerManager::new();

        manager.login("玩家1".to_string()).unwrap();
        assert!(matches!(
            manager.login("玩家1".to_string()),
            Err(ProtocolError::NicknameOccupied)
        ));
    }

    #[test]
    fn test_nickname_validation() {
        let mut manager = PlayerManager::new();

        assert!(matches!(
            manager.login("".to_string()),
            Err(ProtocolError::NicknameEmpty)
        ));
        assert!(matches!(
            manager.login("   ".to_string()),
            Err(ProtocolError::NicknameEmpty)
        ));
        assert!(matches!(
            manager.login("a".repeat(MAX_NICKNAME_LEN + 1)),
            Err(ProtocolError::NicknameTooLong { .. })
        ));
    }

    #[test]
    fn test_nickname_freed_after_remove() {
        let mut manager = PlayerManager::new();

        let id = manager.login("玩家1".to_string()).unwrap();
        manager.remove(id);

        assert!(manager.login("玩家1".to_string()).is_ok());
    }

    #[test]
    fn test_disconnect_reconnect() {
        let mut manager = PlayerManager::new();

        let id = manager.login("玩家1".to_string()).unwrap();
        manager.set_status(id, PlayerStatus::InSession(7));

        assert_eq!(manager.disconnect(id), Some(7));
        assert!(matches!(
            manager.get(id).unwrap().status,
            PlayerStatus::Disconnected(7)
        ));

        assert_eq!(manager.reconnect(id), Some(7));
        assert!(matches!(
            manager.get(id).unwrap().status,
            PlayerStatus::InSession(7)
        ));

        // 大厅中的玩家断线不保留对局
        let id2 = manager.login("玩家2".to_string()).unwrap();
        assert_eq!(manager.disconnect(id2), None);
    }
}
