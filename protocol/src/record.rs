//! 对局快照：持久化和回放

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::BoardState;
use crate::constants::PROTOCOL_VERSION;
use crate::error::ChessError;
use crate::fen::Fen;
use crate::message::{GameResult, SessionId, SessionState};
use crate::moves::{Move, MoveGenerator};
use crate::notation::Notation;
use crate::rules::RuleEngine;

/// 对局快照
///
/// 每次走法落定后和对局终结时各写一份。走法以坐标记谱保存，
/// 回放时从初始 FEN 逐步重演。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// 格式版本
    pub version: u8,
    /// 对局 ID
    pub session_id: SessionId,
    /// 白方昵称
    pub white_player: String,
    /// 黑方昵称
    pub black_player: String,
    /// 对局开始时的 FEN
    pub initial_fen: String,
    /// 当前局面的 FEN
    pub fen: String,
    /// 已走的走法（坐标记谱）
    pub moves: Vec<String>,
    /// 对局状态
    pub status: SessionState,
    /// 对局结果（仅正常结束时）
    pub result: Option<GameResult>,
    /// 保存时间
    pub saved_at: DateTime<Utc>,
}

impl GameSnapshot {
    /// 创建快照
    pub fn new(
        session_id: SessionId,
        white_player: String,
        black_player: String,
        state: &BoardState,
        moves: Vec<String>,
        status: SessionState,
        result: Option<GameResult>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            session_id,
            white_player,
            black_player,
            initial_fen: crate::fen::INITIAL_FEN.to_string(),
            fen: Fen::to_string(state),
            moves,
            status,
            result,
            saved_at: Utc::now(),
        }
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 反序列化
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 从初始 FEN 重演全部走法
    ///
    /// 重复历史从初始局面重新累计，快照边界之前的历史不保留。
    pub fn replay(&self) -> Result<(BoardState, Vec<Move>), ChessError> {
        let mut state = Fen::parse(&self.initial_fen)?;
        let mut applied = Vec::with_capacity(self.moves.len());

        for text in &self.moves {
            let (from, to, promotion) = Notation::parse(text)?;
            let mv = MoveGenerator::generate_legal(&state)
                .into_iter()
                .find(|m| m.from == from && m.to == to && m.promotion == promotion)
                .ok_or(ChessError::IllegalMove { from, to })?;
            state = RuleEngine::apply_move(&state, &mv)?;
            applied.push(mv);
        }

        Ok((state, applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> GameSnapshot {
        let mut state = BoardState::initial();
        let mut moves = Vec::new();
        for text in ["e2e4", "e7e5", "g1f3"] {
            let (from, to, promotion) = Notation::parse(text).unwrap();
            let mv = MoveGenerator::generate_legal(&state)
                .into_iter()
                .find(|m| m.from == from && m.to == to && m.promotion == promotion)
                .unwrap();
            state = RuleEngine::apply_move(&state, &mv).unwrap();
            moves.push(text.to_string());
        }

        GameSnapshot::new(
            7,
            "白方".to_string(),
            "黑方".to_string(),
            &state,
            moves,
            SessionState::InProgress,
            None,
        )
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = sample_snapshot();
        let json = snapshot.to_json().unwrap();
        assert_eq!(GameSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_replay_reaches_saved_fen() {
        let snapshot = sample_snapshot();
        let (state, applied) = snapshot.replay().unwrap();

        assert_eq!(applied.len(), 3);
        assert_eq!(Fen::to_string(&state), snapshot.fen);
    }

    #[test]
    fn test_replay_rejects_illegal_move() {
        let mut snapshot = sample_snapshot();
        snapshot.moves.push("e1e8".to_string());

        assert!(matches!(
            snapshot.replay(),
            Err(ChessError::IllegalMove { .. })
        ));
    }

    #[test]
    fn test_replay_rejects_malformed_move() {
        let mut snapshot = sample_snapshot();
        snapshot.moves.push("不是走法".to_string());

        assert!(matches!(
            snapshot.replay(),
            Err(ChessError::MalformedMove { .. })
        ));
    }
}
