//! 走法生成和验证

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardState};
use crate::piece::{Piece, PieceKind, Side, Square};

/// 走法种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// 普通移动
    Quiet,
    /// 吃子
    Capture,
    /// 吃过路兵
    EnPassant,
    /// 短易位
    CastleKingSide,
    /// 长易位
    CastleQueenSide,
    /// 兵双步
    DoublePawnPush,
}

/// 走法
///
/// 构造后不可变。升变走法每个升变选择对应一个独立的走法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始格
    pub from: Square,
    /// 目标格
    pub to: Square,
    /// 走法种类
    pub kind: MoveKind,
    /// 升变棋子类型（仅兵到达底线时）
    pub promotion: Option<PieceKind>,
}

impl Move {
    /// 创建新走法
    pub fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self {
            from,
            to,
            kind,
            promotion: None,
        }
    }

    /// 创建升变走法
    pub fn with_promotion(from: Square, to: Square, kind: MoveKind, promotion: PieceKind) -> Self {
        Self {
            from,
            to,
            kind,
            promotion: Some(promotion),
        }
    }

    /// 是否为吃子走法
    pub fn is_capture(&self) -> bool {
        matches!(self.kind, MoveKind::Capture | MoveKind::EnPassant)
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(c) = self.promotion.and_then(|k| k.to_promotion_char()) {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// 马的 8 个偏移
const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// 王的 8 个偏移
const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// 直线方向（车）
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// 斜线方向（象）
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// 升变选择，四种全部枚举，绝不默默取默认值
const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成指定阵营的所有伪合法走法（不考虑走后己方被将军）
    pub fn generate_pseudo_legal(state: &BoardState, side: Side) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);

        for (sq, piece) in state.board.pieces(side) {
            match piece.kind {
                PieceKind::Pawn => Self::generate_pawn_moves(state, sq, side, &mut moves),
                PieceKind::Knight => {
                    Self::generate_offset_moves(&state.board, sq, side, &KNIGHT_OFFSETS, &mut moves)
                }
                PieceKind::Bishop => Self::generate_sliding_moves(
                    &state.board,
                    sq,
                    side,
                    &BISHOP_DIRECTIONS,
                    &mut moves,
                ),
                PieceKind::Rook => Self::generate_sliding_moves(
                    &state.board,
                    sq,
                    side,
                    &ROOK_DIRECTIONS,
                    &mut moves,
                ),
                PieceKind::Queen => {
                    Self::generate_sliding_moves(
                        &state.board,
                        sq,
                        side,
                        &ROOK_DIRECTIONS,
                        &mut moves,
                    );
                    Self::generate_sliding_moves(
                        &state.board,
                        sq,
                        side,
                        &BISHOP_DIRECTIONS,
                        &mut moves,
                    );
                }
                PieceKind::King => {
                    Self::generate_offset_moves(&state.board, sq, side, &KING_OFFSETS, &mut moves);
                    Self::generate_castling_moves(state, side, &mut moves);
                }
            }
        }

        moves
    }

    /// 生成当前走子方的所有合法走法
    ///
    /// 伪合法走法经过模拟-丢弃过滤：在棋盘副本上执行走法，
    /// 若己方王随后受攻击则丢弃。结果按（起点、终点、升变）规范排序，
    /// 与生成顺序无关。
    pub fn generate_legal(state: &BoardState) -> Vec<Move> {
        let side = state.side_to_move;
        let mut moves: Vec<Move> = Self::generate_pseudo_legal(state, side)
            .into_iter()
            .filter(|mv| {
                let mut test_board = state.board.clone();
                Self::apply_to_board(&mut test_board, mv);
                !Self::is_in_check(&test_board, side)
            })
            .collect();

        moves.sort_by_key(|m| (m.from.to_index(), m.to.to_index(), m.promotion));
        moves
    }

    /// 在棋盘上执行走法的布局变化（不更新易位权利等附属状态）
    ///
    /// 处理吃过路兵的兵移除、易位的车移动、升变的棋子替换。
    /// 合法性过滤和规则引擎共用。
    pub(crate) fn apply_to_board(board: &mut Board, mv: &Move) {
        let piece = match board.get(mv.from) {
            Some(p) => p,
            None => return,
        };

        board.move_piece(mv.from, mv.to);

        match mv.kind {
            MoveKind::EnPassant => {
                // 被吃的兵在目标格的同一列、起始格的同一排
                let captured_sq = Square::new_unchecked(mv.to.file, mv.from.rank);
                board.set(captured_sq, None);
            }
            MoveKind::CastleKingSide => {
                let rank = piece.side.back_rank();
                board.move_piece(
                    Square::new_unchecked(7, rank),
                    Square::new_unchecked(5, rank),
                );
            }
            MoveKind::CastleQueenSide => {
                let rank = piece.side.back_rank();
                board.move_piece(
                    Square::new_unchecked(0, rank),
                    Square::new_unchecked(3, rank),
                );
            }
            _ => {}
        }

        if let Some(kind) = mv.promotion {
            board.set(mv.to, Some(Piece::new(kind, piece.side)));
        }
    }

    /// 生成兵的走法
    fn generate_pawn_moves(state: &BoardState, sq: Square, side: Side, moves: &mut Vec<Move>) {
        let board = &state.board;
        let dir = side.pawn_direction();
        let promotion_rank = side.promotion_rank();

        // 前进一步
        if let Some(to) = sq.offset(0, dir) {
            if board.get(to).is_none() {
                if to.rank == promotion_rank {
                    Self::push_promotions(sq, to, MoveKind::Quiet, moves);
                } else {
                    moves.push(Move::new(sq, to, MoveKind::Quiet));

                    // 初始横排可以双步
                    if sq.rank == side.pawn_start_rank() {
                        if let Some(to2) = sq.offset(0, 2 * dir) {
                            if board.get(to2).is_none() {
                                moves.push(Move::new(sq, to2, MoveKind::DoublePawnPush));
                            }
                        }
                    }
                }
            }
        }

        // 斜吃
        for df in [-1i8, 1i8] {
            if let Some(to) = sq.offset(df, dir) {
                if let Some(target) = board.get(to) {
                    if target.side != side {
                        if to.rank == promotion_rank {
                            Self::push_promotions(sq, to, MoveKind::Capture, moves);
                        } else {
                            moves.push(Move::new(sq, to, MoveKind::Capture));
                        }
                    }
                } else if state.en_passant == Some(to) {
                    moves.push(Move::new(sq, to, MoveKind::EnPassant));
                }
            }
        }
    }

    /// 枚举全部四种升变
    fn push_promotions(from: Square, to: Square, kind: MoveKind, moves: &mut Vec<Move>) {
        for promotion in PROMOTION_KINDS {
            moves.push(Move::with_promotion(from, to, kind, promotion));
        }
    }

    /// 生成固定偏移走法（马、王）
    fn generate_offset_moves(
        board: &Board,
        sq: Square,
        side: Side,
        offsets: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(df, dr) in offsets {
            if let Some(to) = sq.offset(df, dr) {
                Self::try_add_move(board, sq, to, side, moves);
            }
        }
    }

    /// 生成滑动走法（车、象、后），沿射线直到被阻挡
    fn generate_sliding_moves(
        board: &Board,
        sq: Square,
        side: Side,
        directions: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(df, dr) in directions {
            let mut current = sq;
            while let Some(to) = current.offset(df, dr) {
                if let Some(target) = board.get(to) {
                    if target.side != side {
                        moves.push(Move::new(sq, to, MoveKind::Capture));
                    }
                    break;
                } else {
                    moves.push(Move::new(sq, to, MoveKind::Quiet));
                }
                current = to;
            }
        }
    }

    /// 生成易位走法
    ///
    /// 条件：权利位仍在、车在原位、中间格子为空、
    /// 王当前不被将军、王经过和到达的格子不受攻击。
    fn generate_castling_moves(state: &BoardState, side: Side, moves: &mut Vec<Move>) {
        let board = &state.board;
        let rank = side.back_rank();
        let king_sq = Square::new_unchecked(4, rank);

        // 权利位由规则引擎维护，但局面可能来自外部 FEN，校验王的实际位置
        if board.get(king_sq) != Some(Piece::new(PieceKind::King, side)) {
            return;
        }

        let opponent = side.opponent();
        if Self::is_attacked(board, king_sq, opponent) {
            return;
        }

        // 短易位：f、g 格为空且不受攻击，车在 h 线
        if state.castling.king_side(side) {
            let rook_sq = Square::new_unchecked(7, rank);
            let f_sq = Square::new_unchecked(5, rank);
            let g_sq = Square::new_unchecked(6, rank);

            if board.get(rook_sq) == Some(Piece::new(PieceKind::Rook, side))
                && board.get(f_sq).is_none()
                && board.get(g_sq).is_none()
                && !Self::is_attacked(board, f_sq, opponent)
                && !Self::is_attacked(board, g_sq, opponent)
            {
                moves.push(Move::new(king_sq, g_sq, MoveKind::CastleKingSide));
            }
        }

        // 长易位：b、c、d 格为空，c、d 格不受攻击（b 格允许受攻击），车在 a 线
        if state.castling.queen_side(side) {
            let rook_sq = Square::new_unchecked(0, rank);
            let b_sq = Square::new_unchecked(1, rank);
            let c_sq = Square::new_unchecked(2, rank);
            let d_sq = Square::new_unchecked(3, rank);

            if board.get(rook_sq) == Some(Piece::new(PieceKind::Rook, side))
                && board.get(b_sq).is_none()
                && board.get(c_sq).is_none()
                && board.get(d_sq).is_none()
                && !Self::is_attacked(board, c_sq, opponent)
                && !Self::is_attacked(board, d_sq, opponent)
            {
                moves.push(Move::new(king_sq, c_sq, MoveKind::CastleQueenSide));
            }
        }
    }

    /// 尝试添加走法（目标格为空或有敌子）
    fn try_add_move(board: &Board, from: Square, to: Square, side: Side, moves: &mut Vec<Move>) {
        if let Some(target) = board.get(to) {
            if target.side != side {
                moves.push(Move::new(from, to, MoveKind::Capture));
            }
        } else {
            moves.push(Move::new(from, to, MoveKind::Quiet));
        }
    }

    /// 检查指定格子是否被指定阵营攻击
    pub fn is_attacked(board: &Board, target: Square, by: Side) -> bool {
        // 兵：攻击方的兵从斜后方攻击目标格
        let dir = by.pawn_direction();
        for df in [-1i8, 1i8] {
            if let Some(sq) = target.offset(df, -dir) {
                if board.get(sq) == Some(Piece::new(PieceKind::Pawn, by)) {
                    return true;
                }
            }
        }

        // 马
        for &(df, dr) in &KNIGHT_OFFSETS {
            if let Some(sq) = target.offset(df, dr) {
                if board.get(sq) == Some(Piece::new(PieceKind::Knight, by)) {
                    return true;
                }
            }
        }

        // 王（相邻格）
        for &(df, dr) in &KING_OFFSETS {
            if let Some(sq) = target.offset(df, dr) {
                if board.get(sq) == Some(Piece::new(PieceKind::King, by)) {
                    return true;
                }
            }
        }

        // 直线滑子（车、后）
        for &(df, dr) in &ROOK_DIRECTIONS {
            if let Some(piece) = Self::first_piece_along(board, target, df, dr) {
                if piece.side == by
                    && matches!(piece.kind, PieceKind::Rook | PieceKind::Queen)
                {
                    return true;
                }
            }
        }

        // 斜线滑子（象、后）
        for &(df, dr) in &BISHOP_DIRECTIONS {
            if let Some(piece) = Self::first_piece_along(board, target, df, dr) {
                if piece.side == by
                    && matches!(piece.kind, PieceKind::Bishop | PieceKind::Queen)
                {
                    return true;
                }
            }
        }

        false
    }

    /// 沿射线找到的第一个棋子
    fn first_piece_along(board: &Board, from: Square, df: i8, dr: i8) -> Option<Piece> {
        let mut current = from;
        while let Some(next) = current.offset(df, dr) {
            if let Some(piece) = board.get(next) {
                return Some(piece);
            }
            current = next;
        }
        None
    }

    /// 检查指定阵营是否被将军
    pub fn is_in_check(board: &Board, side: Side) -> bool {
        match board.find_king(side) {
            Some(king_sq) => Self::is_attacked(board, king_sq, side.opponent()),
            None => false,
        }
    }
}
