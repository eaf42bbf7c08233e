//! 棋盘状态

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::piece::{Piece, PieceKind, Side, Square};

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 8x8 棋盘，索引为 rank * 8 + file，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; 64],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        for (file, &kind) in back_rank.iter().enumerate() {
            let file = file as u8;
            board.set(Square::new_unchecked(file, 0), Some(Piece::new(kind, Side::White)));
            board.set(Square::new_unchecked(file, 7), Some(Piece::new(kind, Side::Black)));
            board.set(
                Square::new_unchecked(file, 1),
                Some(Piece::new(PieceKind::Pawn, Side::White)),
            );
            board.set(
                Square::new_unchecked(file, 6),
                Some(Piece::new(PieceKind::Pawn, Side::Black)),
            );
        }

        board
    }

    /// 获取指定格子的棋子
    pub fn get(&self, sq: Square) -> Option<Piece> {
        if sq.is_valid() {
            self.squares[sq.to_index()]
        } else {
            None
        }
    }

    /// 设置指定格子的棋子
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        if sq.is_valid() {
            self.squares[sq.to_index()] = piece;
        }
    }

    /// 移动棋子（不检查规则），返回被吃的棋子
    pub fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.get(from);
        let captured = self.get(to);
        self.set(from, None);
        self.set(to, piece);
        captured
    }

    /// 查找指定阵营的王的位置
    pub fn find_king(&self, side: Side) -> Option<Square> {
        for rank in 0..BOARD_SIZE {
            for file in 0..BOARD_SIZE {
                let sq = Square::new_unchecked(file as u8, rank as u8);
                if let Some(piece) = self.get(sq) {
                    if piece.kind == PieceKind::King && piece.side == side {
                        return Some(sq);
                    }
                }
            }
        }
        None
    }

    /// 统计指定阵营的王的数量（用于不变量检查）
    pub fn count_kings(&self, side: Side) -> usize {
        self.squares
            .iter()
            .flatten()
            .filter(|p| p.kind == PieceKind::King && p.side == side)
            .count()
    }

    /// 获取指定阵营的所有棋子位置
    pub fn pieces(&self, side: Side) -> Vec<(Square, Piece)> {
        let mut result = Vec::new();
        for rank in 0..BOARD_SIZE {
            for file in 0..BOARD_SIZE {
                let sq = Square::new_unchecked(file as u8, rank as u8);
                if let Some(piece) = self.get(sq) {
                    if piece.side == side {
                        result.push((sq, piece));
                    }
                }
            }
        }
        result
    }

    /// 获取所有棋子
    pub fn all_pieces(&self) -> Vec<(Square, Piece)> {
        let mut result = Vec::new();
        for rank in 0..BOARD_SIZE {
            for file in 0..BOARD_SIZE {
                let sq = Square::new_unchecked(file as u8, rank as u8);
                if let Some(piece) = self.get(sq) {
                    result.push((sq, piece));
                }
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

/// 王车易位权利
///
/// 权利一经撤销便永久失效，任何操作都不会重新设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    /// 四项权利全部保留（初始局面）
    pub fn all() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    /// 四项权利全部失效
    pub fn none() -> Self {
        Self {
            white_king_side: false,
            white_queen_side: false,
            black_king_side: false,
            black_queen_side: false,
        }
    }

    /// 指定阵营的短易位权利
    pub fn king_side(&self, side: Side) -> bool {
        match side {
            Side::White => self.white_king_side,
            Side::Black => self.black_king_side,
        }
    }

    /// 指定阵营的长易位权利
    pub fn queen_side(&self, side: Side) -> bool {
        match side {
            Side::White => self.white_queen_side,
            Side::Black => self.black_queen_side,
        }
    }

    /// 撤销指定阵营的全部权利（王移动后）
    pub fn revoke_all(&mut self, side: Side) {
        match side {
            Side::White => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            Side::Black => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
        }
    }

    /// 撤销短易位权利
    pub fn revoke_king_side(&mut self, side: Side) {
        match side {
            Side::White => self.white_king_side = false,
            Side::Black => self.black_king_side = false,
        }
    }

    /// 撤销长易位权利
    pub fn revoke_queen_side(&mut self, side: Side) {
        match side {
            Side::White => self.white_queen_side = false,
            Side::Black => self.black_queen_side = false,
        }
    }

    /// 转换为 FEN 字段（如 "KQkq"，无权利时为 "-"）
    pub fn to_fen(&self) -> String {
        let mut s = String::new();
        if self.white_king_side {
            s.push('K');
        }
        if self.white_queen_side {
            s.push('Q');
        }
        if self.black_king_side {
            s.push('k');
        }
        if self.black_queen_side {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }

    /// 从 FEN 字段解析
    pub fn from_fen(s: &str) -> Option<Self> {
        let mut rights = Self::none();
        if s == "-" {
            return Some(rights);
        }
        for c in s.chars() {
            match c {
                'K' => rights.white_king_side = true,
                'Q' => rights.white_queen_side = true,
                'k' => rights.black_king_side = true,
                'q' => rights.black_queen_side = true,
                _ => return None,
            }
        }
        Some(rights)
    }
}

/// 完整的棋局状态（棋盘 + 走子方 + 易位权利 + 过路兵目标 + 步数计数）
///
/// 状态只在对局创建时生成一次，此后只由规则引擎整体替换，
/// 外部调用者绝不原地修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    /// 棋盘
    pub board: Board,
    /// 当前走子方
    pub side_to_move: Side,
    /// 易位权利
    pub castling: CastlingRights,
    /// 过路兵目标格（仅在对方刚走双步兵之后的一回合内有效）
    pub en_passant: Option<Square>,
    /// 半步计数（自上次吃子或动兵以来的步数，用于五十步规则）
    pub halfmove_clock: u32,
    /// 完整回合数（黑方走完后 +1）
    pub fullmove_number: u32,
    /// 局面历史（重复局面判定用的键，不含步数计数字段）
    pub position_history: Vec<String>,
}

impl BoardState {
    /// 创建初始状态
    pub fn initial() -> Self {
        let mut state = Self {
            board: Board::initial(),
            side_to_move: Side::White,
            castling: CastlingRights::all(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            position_history: Vec::new(),
        };
        let key = state.repetition_key();
        state.position_history.push(key);
        state
    }

    /// 重复局面判定键：FEN 的前四个字段
    /// （棋子布局、走子方、易位权利、过路兵目标）
    ///
    /// 只有步数计数不同的局面视为同一局面。
    pub fn repetition_key(&self) -> String {
        format!(
            "{} {} {} {}",
            crate::fen::Fen::board_to_string(&self.board),
            self.side_to_move.to_fen_char(),
            self.castling.to_fen(),
            self.en_passant
                .map(|sq| sq.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )
    }

    /// 当前局面在历史中出现的次数
    pub fn repetition_count(&self) -> usize {
        let key = self.repetition_key();
        self.position_history.iter().filter(|k| **k == key).count()
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_board() {
        let board = Board::initial();

        // 白王在 e1
        let king = board.get(Square::new_unchecked(4, 0));
        assert_eq!(king, Some(Piece::new(PieceKind::King, Side::White)));

        // 黑王在 e8
        let king = board.get(Square::new_unchecked(4, 7));
        assert_eq!(king, Some(Piece::new(PieceKind::King, Side::Black)));

        // 白后在 d1
        let queen = board.get(Square::new_unchecked(3, 0));
        assert_eq!(queen, Some(Piece::new(PieceKind::Queen, Side::White)));

        // 兵排
        for file in 0..8 {
            assert_eq!(
                board.get(Square::new_unchecked(file, 1)),
                Some(Piece::new(PieceKind::Pawn, Side::White))
            );
            assert_eq!(
                board.get(Square::new_unchecked(file, 6)),
                Some(Piece::new(PieceKind::Pawn, Side::Black))
            );
        }

        // 中间四排为空
        for rank in 2..6 {
            for file in 0..8 {
                assert!(board.get(Square::new_unchecked(file, rank)).is_none());
            }
        }
    }

    #[test]
    fn test_move_piece() {
        let mut board = Board::initial();

        let from = Square::new_unchecked(4, 1);
        let to = Square::new_unchecked(4, 3);

        let captured = board.move_piece(from, to);
        assert!(captured.is_none());

        assert!(board.get(from).is_none());
        assert_eq!(board.get(to), Some(Piece::new(PieceKind::Pawn, Side::White)));
    }

    #[test]
    fn test_find_king() {
        let board = Board::initial();

        assert_eq!(board.find_king(Side::White), Some(Square::new_unchecked(4, 0)));
        assert_eq!(board.find_king(Side::Black), Some(Square::new_unchecked(4, 7)));
    }

    #[test]
    fn test_count_kings() {
        let board = Board::initial();
        assert_eq!(board.count_kings(Side::White), 1);
        assert_eq!(board.count_kings(Side::Black), 1);

        let empty = Board::empty();
        assert_eq!(empty.count_kings(Side::White), 0);
    }

    #[test]
    fn test_castling_rights_fen() {
        assert_eq!(CastlingRights::all().to_fen(), "KQkq");
        assert_eq!(CastlingRights::none().to_fen(), "-");

        let mut rights = CastlingRights::all();
        rights.revoke_all(Side::White);
        assert_eq!(rights.to_fen(), "kq");

        rights.revoke_king_side(Side::Black);
        assert_eq!(rights.to_fen(), "q");

        assert_eq!(CastlingRights::from_fen("KQkq"), Some(CastlingRights::all()));
        assert_eq!(CastlingRights::from_fen("-"), Some(CastlingRights::none()));
        assert_eq!(CastlingRights::from_fen("Kx"), None);
    }

    #[test]
    fn test_repetition_key_ignores_counters() {
        let mut a = BoardState::initial();
        let mut b = BoardState::initial();
        a.halfmove_clock = 10;
        a.fullmove_number = 6;
        b.halfmove_clock = 0;
        b.fullmove_number = 1;

        assert_eq!(a.repetition_key(), b.repetition_key());
    }

    #[test]
    fn test_initial_state_seeds_history() {
        let state = BoardState::initial();
        assert_eq!(state.position_history.len(), 1);
        assert_eq!(state.repetition_count(), 1);
    }
}
