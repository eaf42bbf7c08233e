//! 棋子与格子定义

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::ChessError;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PieceKind {
    /// 兵
    Pawn,
    /// 马
    Knight,
    /// 象
    Bishop,
    /// 车
    Rook,
    /// 后
    Queen,
    /// 王
    King,
}

impl PieceKind {
    /// 获取 FEN 字符（白方大写，黑方小写）
    pub fn to_fen_char(&self, side: Side) -> char {
        let c = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }

    /// 从 FEN 字符解析
    pub fn from_fen_char(c: char) -> Option<(PieceKind, Side)> {
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some((kind, side))
    }

    /// 升变字符（坐标记法后缀，如 e7e8q）
    pub fn to_promotion_char(&self) -> Option<char> {
        match self {
            PieceKind::Queen => Some('q'),
            PieceKind::Rook => Some('r'),
            PieceKind::Bishop => Some('b'),
            PieceKind::Knight => Some('n'),
            _ => None,
        }
    }

    /// 从升变字符解析
    pub fn from_promotion_char(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'q' => Some(PieceKind::Queen),
            'r' => Some(PieceKind::Rook),
            'b' => Some(PieceKind::Bishop),
            'n' => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 白方（先手）
    White,
    /// 黑方（后手）
    Black,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// 获取 FEN 字符
    pub fn to_fen_char(&self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }

    /// 从 FEN 字符解析
    pub fn from_fen_char(c: char) -> Option<Side> {
        match c {
            'w' | 'W' => Some(Side::White),
            'b' | 'B' => Some(Side::Black),
            _ => None,
        }
    }

    /// 兵的前进方向（白方 rank 增大，黑方减小）
    pub fn pawn_direction(&self) -> i8 {
        match self {
            Side::White => 1,
            Side::Black => -1,
        }
    }

    /// 兵的初始横排
    pub fn pawn_start_rank(&self) -> u8 {
        match self {
            Side::White => 1,
            Side::Black => 6,
        }
    }

    /// 兵的升变横排
    pub fn promotion_rank(&self) -> u8 {
        match self {
            Side::White => 7,
            Side::Black => 0,
        }
    }

    /// 底线横排（王和车的初始横排）
    pub fn back_rank(&self) -> u8 {
        match self {
            Side::White => 0,
            Side::Black => 7,
        }
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub side: Side,
}

impl Piece {
    /// 创建新棋子
    pub fn new(kind: PieceKind, side: Side) -> Self {
        Self { kind, side }
    }

    /// 获取 FEN 字符
    pub fn to_fen_char(&self) -> char {
        self.kind.to_fen_char(self.side)
    }

    /// 从 FEN 字符解析
    pub fn from_fen_char(c: char) -> Option<Piece> {
        PieceKind::from_fen_char(c).map(|(kind, side)| Piece { kind, side })
    }
}

/// 棋盘格子坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Square {
    /// 纵列 (0-7，对应 a-h)
    pub file: u8,
    /// 横排 (0-7，对应 1-8)
    pub rank: u8,
}

impl Square {
    /// 创建新格子
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if (file as usize) < BOARD_SIZE && (rank as usize) < BOARD_SIZE {
            Some(Self { file, rank })
        } else {
            None
        }
    }

    /// 创建新格子（不检查边界，内部使用）
    pub const fn new_unchecked(file: u8, rank: u8) -> Self {
        Self { file, rank }
    }

    /// 检查格子是否在棋盘内
    pub fn is_valid(&self) -> bool {
        (self.file as usize) < BOARD_SIZE && (self.rank as usize) < BOARD_SIZE
    }

    /// 获取偏移后的格子
    pub fn offset(&self, df: i8, dr: i8) -> Option<Square> {
        let new_file = self.file as i8 + df;
        let new_rank = self.rank as i8 + dr;
        if new_file >= 0
            && (new_file as usize) < BOARD_SIZE
            && new_rank >= 0
            && (new_rank as usize) < BOARD_SIZE
        {
            Some(Square {
                file: new_file as u8,
                rank: new_rank as u8,
            })
        } else {
            None
        }
    }

    /// 转换为数组索引
    pub fn to_index(&self) -> usize {
        self.rank as usize * BOARD_SIZE + self.file as usize
    }

    /// 从数组索引转换
    pub fn from_index(index: usize) -> Option<Self> {
        if index < BOARD_SIZE * BOARD_SIZE {
            Some(Square {
                file: (index % BOARD_SIZE) as u8,
                rank: (index / BOARD_SIZE) as u8,
            })
        } else {
            None
        }
    }

    /// 从代数坐标解析（如 "e4"）
    pub fn from_algebraic(s: &str) -> Result<Self, ChessError> {
        let mut chars = s.chars();
        let (file_c, rank_c) = match (chars.next(), chars.next(), chars.next()) {
            (Some(f), Some(r), None) => (f, r),
            _ => {
                return Err(ChessError::MalformedMove {
                    input: s.to_string(),
                })
            }
        };
        let file = match file_c {
            'a'..='h' => file_c as u8 - b'a',
            _ => {
                return Err(ChessError::MalformedMove {
                    input: s.to_string(),
                })
            }
        };
        let rank = match rank_c {
            '1'..='8' => rank_c as u8 - b'1',
            _ => {
                return Err(ChessError::MalformedMove {
                    input: s.to_string(),
                })
            }
        };
        Ok(Square { file, rank })
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 反序列化可能带来越界坐标，格式化必须对任意值安全
        if !self.is_valid() {
            return write!(f, "({},{})", self.file, self.rank);
        }
        write!(
            f,
            "{}{}",
            (b'a' + self.file) as char,
            (b'1' + self.rank) as char
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_fen_char() {
        let white_king = Piece::new(PieceKind::King, Side::White);
        assert_eq!(white_king.to_fen_char(), 'K');

        let black_king = Piece::new(PieceKind::King, Side::Black);
        assert_eq!(black_king.to_fen_char(), 'k');

        assert_eq!(
            Piece::from_fen_char('R'),
            Some(Piece::new(PieceKind::Rook, Side::White))
        );
        assert_eq!(
            Piece::from_fen_char('n'),
            Some(Piece::new(PieceKind::Knight, Side::Black))
        );
        assert_eq!(Piece::from_fen_char('x'), None);
    }

    #[test]
    fn test_square_valid() {
        assert!(Square::new(0, 0).is_some());
        assert!(Square::new(7, 7).is_some());
        assert!(Square::new(8, 0).is_none());
        assert!(Square::new(0, 8).is_none());
    }

    #[test]
    fn test_square_algebraic() {
        let e4 = Square::from_algebraic("e4").unwrap();
        assert_eq!(e4, Square::new_unchecked(4, 3));
        assert_eq!(e4.to_string(), "e4");

        let a1 = Square::from_algebraic("a1").unwrap();
        assert_eq!(a1, Square::new_unchecked(0, 0));

        let h8 = Square::from_algebraic("h8").unwrap();
        assert_eq!(h8, Square::new_unchecked(7, 7));

        assert!(Square::from_algebraic("i4").is_err());
        assert!(Square::from_algebraic("e9").is_err());
        assert!(Square::from_algebraic("e44").is_err());
    }

    #[test]
    fn test_square_display_out_of_range() {
        // 网络数据可能构造出越界坐标，Display 不应溢出
        assert_eq!(Square::new_unchecked(200, 250).to_string(), "(200,250)");
        assert_eq!(Square::new_unchecked(8, 0).to_string(), "(8,0)");
    }

    #[test]
    fn test_square_index_roundtrip() {
        for index in 0..64 {
            let sq = Square::from_index(index).unwrap();
            assert_eq!(sq.to_index(), index);
        }
        assert!(Square::from_index(64).is_none());
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::White.opponent(), Side::Black);
        assert_eq!(Side::Black.opponent(), Side::White);
    }

    #[test]
    fn test_promotion_char() {
        assert_eq!(PieceKind::Queen.to_promotion_char(), Some('q'));
        assert_eq!(PieceKind::King.to_promotion_char(), None);
        assert_eq!(PieceKind::from_promotion_char('n'), Some(PieceKind::Knight));
        assert_eq!(PieceKind::from_promotion_char('k'), None);
    }
}
