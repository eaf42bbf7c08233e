//! 规则引擎：走法执行和局面判定

use serde::{Deserialize, Serialize};

use crate::board::BoardState;
use crate::error::ChessError;
use crate::moves::{Move, MoveGenerator, MoveKind};
use crate::piece::{PieceKind, Side, Square};

/// 和棋原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawReason {
    /// 双方协议和棋
    Agreement,
    /// 逼和（无合法走法且不被将军）
    Stalemate,
    /// 五十回合规则
    FiftyMoves,
    /// 三次重复局面
    Repetition,
    /// 子力不足
    InsufficientMaterial,
}

impl std::fmt::Display for DrawReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrawReason::Agreement => "协议和棋",
            DrawReason::Stalemate => "逼和",
            DrawReason::FiftyMoves => "五十回合",
            DrawReason::Repetition => "三次重复局面",
            DrawReason::InsufficientMaterial => "子力不足",
        };
        write!(f, "{}", s)
    }
}

/// 局面判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// 正常，轮到走子方行棋
    Normal,
    /// 走子方被将军但有合法走法
    Check,
    /// 走子方被将死
    Checkmate,
    /// 逼和
    Stalemate,
    /// 自动和棋
    Draw(DrawReason),
}

impl GameStatus {
    /// 局面是否已终结
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameStatus::Checkmate | GameStatus::Stalemate | GameStatus::Draw(_)
        )
    }
}

/// 四个角落格子及其影响的易位权利
const ROOK_CORNERS: [(u8, u8, Side, bool); 4] = [
    (0, 0, Side::White, false),
    (7, 0, Side::White, true),
    (0, 7, Side::Black, false),
    (7, 7, Side::Black, true),
];

/// 规则引擎
pub struct RuleEngine;

impl RuleEngine {
    /// 执行走法，返回新局面
    ///
    /// 纯函数：输入局面不被修改，失败时不产生任何变化。
    /// 走法必须出自当前局面的合法走法集合，否则返回 [`ChessError::IllegalMove`]。
    pub fn apply_move(state: &BoardState, mv: &Move) -> Result<BoardState, ChessError> {
        // 双方必须各有且仅有一个王，否则局面已损坏
        for side in [Side::White, Side::Black] {
            let kings = state.board.count_kings(side);
            if kings != 1 {
                return Err(ChessError::InvariantViolation {
                    reason: format!("{:?} 方有 {} 个王", side, kings),
                });
            }
        }

        if !MoveGenerator::generate_legal(state).contains(mv) {
            return Err(ChessError::IllegalMove {
                from: mv.from,
                to: mv.to,
            });
        }

        let side = state.side_to_move;
        let piece = state
            .board
            .get(mv.from)
            .ok_or(ChessError::NoPiece { square: mv.from })?;

        let mut next = state.clone();
        MoveGenerator::apply_to_board(&mut next.board, mv);

        // 易位权利只会失效，绝不恢复
        if piece.kind == PieceKind::King {
            next.castling.revoke_all(side);
        }
        for &(file, rank, owner, king_side) in &ROOK_CORNERS {
            let corner = Square::new_unchecked(file, rank);
            // 车离开原位或角落上发生吃子都使对应权利失效
            if mv.from == corner || mv.to == corner {
                if king_side {
                    next.castling.revoke_king_side(owner);
                } else {
                    next.castling.revoke_queen_side(owner);
                }
            }
        }

        // 过路兵窗口仅存在一回合
        next.en_passant = if mv.kind == MoveKind::DoublePawnPush {
            Square::new(mv.from.file, (mv.from.rank as i8 + side.pawn_direction()) as u8)
        } else {
            None
        };

        if piece.kind == PieceKind::Pawn || mv.is_capture() {
            next.halfmove_clock = 0;
        } else {
            next.halfmove_clock += 1;
        }

        if side == Side::Black {
            next.fullmove_number += 1;
        }

        next.side_to_move = side.opponent();
        let key = next.repetition_key();
        next.position_history.push(key);

        Ok(next)
    }

    /// 判定局面状态
    ///
    /// 判定顺序：无合法走法（将死/逼和）优先于自动和棋条件，
    /// 自动和棋条件优先于将军。
    pub fn classify(state: &BoardState) -> GameStatus {
        let side = state.side_to_move;
        let in_check = MoveGenerator::is_in_check(&state.board, side);

        if MoveGenerator::generate_legal(state).is_empty() {
            return if in_check {
                GameStatus::Checkmate
            } else {
                GameStatus::Stalemate
            };
        }

        // 五十回合 = 100 个半回合
        if state.halfmove_clock >= 100 {
            return GameStatus::Draw(DrawReason::FiftyMoves);
        }

        if state.repetition_count() >= 3 {
            return GameStatus::Draw(DrawReason::Repetition);
        }

        if Self::is_insufficient_material(state) {
            return GameStatus::Draw(DrawReason::InsufficientMaterial);
        }

        if in_check {
            GameStatus::Check
        } else {
            GameStatus::Normal
        }
    }

    /// 子力不足判定
    ///
    /// 覆盖：王对王、王单象对王、王单马对王、王象对王象（同色格象）。
    fn is_insufficient_material(state: &BoardState) -> bool {
        let mut minors: Vec<(PieceKind, Square)> = Vec::new();

        for (sq, piece) in state.board.all_pieces() {
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Bishop | PieceKind::Knight => minors.push((piece.kind, sq)),
                // 兵、车、后都具备将死能力
                _ => return false,
            }
        }

        match minors.as_slice() {
            [] => true,
            [(_, _)] => true,
            [(PieceKind::Bishop, a), (PieceKind::Bishop, b)] => {
                // 同色格象无法配合将死
                (a.file + a.rank) % 2 == (b.file + b.rank) % 2
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::Fen;

    fn play(state: BoardState, moves: &[&str]) -> BoardState {
        let mut state = state;
        for text in moves {
            let (from, to, promotion) = crate::notation::Notation::parse(text).unwrap();
            let mv = MoveGenerator::generate_legal(&state)
                .into_iter()
                .find(|m| m.from == from && m.to == to && m.promotion == promotion)
                .unwrap_or_else(|| panic!("走法不合法: {}", text));
            state = RuleEngine::apply_move(&state, &mv).unwrap();
        }
        state
    }

    #[test]
    fn test_fools_mate() {
        let state = play(BoardState::initial(), &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert_eq!(RuleEngine::classify(&state), GameStatus::Checkmate);
    }

    #[test]
    fn test_apply_move_is_pure() {
        let state = BoardState::initial();
        let mv = MoveGenerator::generate_legal(&state)[0];

        let _ = RuleEngine::apply_move(&state, &mv).unwrap();
        assert_eq!(state, BoardState::initial());
    }

    #[test]
    fn test_illegal_move_rejected() {
        let state = BoardState::initial();
        let mv = Move::new(
            Square::from_algebraic("e2").unwrap(),
            Square::from_algebraic("e5").unwrap(),
            MoveKind::Quiet,
        );

        assert!(matches!(
            RuleEngine::apply_move(&state, &mv),
            Err(ChessError::IllegalMove { .. })
        ));
    }

    #[test]
    fn test_invariant_violation_on_missing_king() {
        let state = Fen::parse("8/8/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let mv = Move::new(
            Square::from_algebraic("a1").unwrap(),
            Square::from_algebraic("a2").unwrap(),
            MoveKind::Quiet,
        );

        let err = RuleEngine::apply_move(&state, &mv).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_castling_rights_never_restored() {
        // 王走开再回到原位，权利不恢复
        let state = play(
            BoardState::initial(),
            &["e2e4", "e7e5", "e1e2", "b8c6", "e2e1", "c6b8"],
        );

        assert!(!state.castling.king_side(Side::White));
        assert!(!state.castling.queen_side(Side::White));
        assert!(state.castling.king_side(Side::Black));
        assert!(state.castling.queen_side(Side::Black));
    }

    #[test]
    fn test_rook_move_revokes_one_side() {
        let state = play(BoardState::initial(), &["h2h4", "a7a5", "h1h3", "a8a6"]);

        assert!(!state.castling.king_side(Side::White));
        assert!(state.castling.queen_side(Side::White));
        assert!(state.castling.king_side(Side::Black));
        assert!(!state.castling.queen_side(Side::Black));
    }

    #[test]
    fn test_rook_capture_revokes_rights() {
        // 白车吃掉 a8 车，黑方长易位权利失效
        let state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let state = play(state, &["a1a8"]);

        assert!(state.castling.king_side(Side::Black));
        assert!(!state.castling.queen_side(Side::Black));
        // 白车离开 a1，白方长易位同样失效
        assert!(!state.castling.queen_side(Side::White));
        assert!(state.castling.king_side(Side::White));
    }

    #[test]
    fn test_en_passant_window_one_move() {
        let state = play(BoardState::initial(), &["e2e4"]);
        assert_eq!(state.en_passant, Some(Square::from_algebraic("e3").unwrap()));

        // 下一步后窗口关闭
        let state = play(state, &["g8f6"]);
        assert_eq!(state.en_passant, None);
    }

    #[test]
    fn test_halfmove_clock() {
        // 马跳增加半回合计数
        let state = play(BoardState::initial(), &["g1f3", "g8f6"]);
        assert_eq!(state.halfmove_clock, 2);

        // 兵走重置
        let state = play(state, &["e2e4"]);
        assert_eq!(state.halfmove_clock, 0);
    }

    #[test]
    fn test_fullmove_number() {
        let state = play(BoardState::initial(), &["e2e4"]);
        assert_eq!(state.fullmove_number, 1);

        let state = play(state, &["e7e5"]);
        assert_eq!(state.fullmove_number, 2);
    }

    #[test]
    fn test_fifty_move_draw() {
        let mut state = Fen::parse("7k/8/8/8/8/8/8/K6R w - - 99 80").unwrap();
        assert_eq!(RuleEngine::classify(&state), GameStatus::Normal);

        let mv = MoveGenerator::generate_legal(&state)
            .into_iter()
            .find(|m| !m.is_capture() && state.board.get(m.from).unwrap().kind != PieceKind::Pawn)
            .unwrap();
        state = RuleEngine::apply_move(&state, &mv).unwrap();

        assert_eq!(state.halfmove_clock, 100);
        assert_eq!(
            RuleEngine::classify(&state),
            GameStatus::Draw(DrawReason::FiftyMoves)
        );
    }

    #[test]
    fn test_threefold_repetition() {
        // 双方马来回跳，初始局面第三次出现
        let state = play(
            BoardState::initial(),
            &[
                "g1f3", "g8f6", "f3g1", "f6g8", // 初始局面第二次
                "g1f3", "g8f6", "f3g1", "f6g8", // 初始局面第三次
            ],
        );

        assert_eq!(state.repetition_count(), 3);
        assert_eq!(
            RuleEngine::classify(&state),
            GameStatus::Draw(DrawReason::Repetition)
        );
    }

    #[test]
    fn test_stalemate() {
        // 经典逼和局面：黑王 h8，白后 g6，白王 f7，黑方无路可走
        let state = Fen::parse("7k/5K2/6Q1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(RuleEngine::classify(&state), GameStatus::Stalemate);
    }

    #[test]
    fn test_insufficient_material() {
        // 王对王
        let state = Fen::parse("7k/8/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert_eq!(
            RuleEngine::classify(&state),
            GameStatus::Draw(DrawReason::InsufficientMaterial)
        );

        // 王单马对王
        let state = Fen::parse("7k/8/8/8/8/8/8/KN6 w - - 0 1").unwrap();
        assert_eq!(
            RuleEngine::classify(&state),
            GameStatus::Draw(DrawReason::InsufficientMaterial)
        );

        // 王象对王象（同色格）：c1 和 f8 都是深色格
        let state = Fen::parse("5b1k/8/8/8/8/8/8/K1B5 w - - 0 1").unwrap();
        assert_eq!(
            RuleEngine::classify(&state),
            GameStatus::Draw(DrawReason::InsufficientMaterial)
        );

        // 王象对王象（异色格）不是自动和棋
        let state = Fen::parse("4b2k/8/8/8/8/8/8/K1B5 w - - 0 1").unwrap();
        assert_eq!(RuleEngine::classify(&state), GameStatus::Normal);

        // 有兵就有将死可能
        let state = Fen::parse("7k/8/8/8/8/8/P7/K7 w - - 0 1").unwrap();
        assert_eq!(RuleEngine::classify(&state), GameStatus::Normal);
    }

    #[test]
    fn test_check_status() {
        let state = play(BoardState::initial(), &["e2e4", "f7f6", "d1h5"]);
        assert_eq!(RuleEngine::classify(&state), GameStatus::Check);
    }

    #[test]
    fn test_checkmate_takes_priority_over_fifty_moves() {
        // 半回合计数已满但局面是将死，判将死
        let state = Fen::parse("r7/1r6/8/8/8/8/8/K6k w - - 100 90").unwrap();
        assert_eq!(RuleEngine::classify(&state), GameStatus::Checkmate);
    }
}
