//! FEN 局面序列化

use crate::board::{Board, BoardState, CastlingRights};
use crate::error::ChessError;
use crate::piece::{Piece, Side, Square};

/// 标准初始局面
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN 解析器和生成器
pub struct Fen;

impl Fen {
    /// 解析 FEN 字符串为局面
    ///
    /// 六个字段缺一不可。解析得到的局面以自身为重复历史的第一项，
    /// 历史在快照边界重新开始。
    pub fn parse(fen: &str) -> Result<BoardState, ChessError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(ChessError::InvalidFen {
                reason: format!("需要 6 个字段，实际 {} 个", fields.len()),
            });
        }

        let board = Self::parse_board(fields[0])?;

        let side_to_move = fields[1]
            .chars()
            .next()
            .filter(|_| fields[1].len() == 1)
            .and_then(Side::from_fen_char)
            .ok_or_else(|| ChessError::InvalidFen {
                reason: format!("无效的走子方: {}", fields[1]),
            })?;

        let castling =
            CastlingRights::from_fen(fields[2]).ok_or_else(|| ChessError::InvalidFen {
                reason: format!("无效的易位权利: {}", fields[2]),
            })?;

        let en_passant = match fields[3] {
            "-" => None,
            text => Some(Square::from_algebraic(text).map_err(|_| ChessError::InvalidFen {
                reason: format!("无效的过路兵目标格: {}", text),
            })?),
        };

        let halfmove_clock = fields[4].parse().map_err(|_| ChessError::InvalidFen {
            reason: format!("无效的半回合计数: {}", fields[4]),
        })?;

        let fullmove_number: u32 = fields[5].parse().map_err(|_| ChessError::InvalidFen {
            reason: format!("无效的回合数: {}", fields[5]),
        })?;
        if fullmove_number == 0 {
            return Err(ChessError::InvalidFen {
                reason: "回合数从 1 开始".to_string(),
            });
        }

        let mut state = BoardState {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            position_history: Vec::new(),
        };
        let key = state.repetition_key();
        state.position_history.push(key);

        Ok(state)
    }

    /// 解析棋盘布局字段（第 8 横排在前）
    fn parse_board(text: &str) -> Result<Board, ChessError> {
        let ranks: Vec<&str> = text.split('/').collect();
        if ranks.len() != 8 {
            return Err(ChessError::InvalidFen {
                reason: format!("需要 8 个横排，实际 {} 个", ranks.len()),
            });
        }

        let mut board = Board::empty();
        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;

            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(ChessError::InvalidFen {
                            reason: format!("无效的空格数: {}", c),
                        });
                    }
                    file += skip as u8;
                    // 及早检查，连续数字不能把累计值加到溢出
                    if file > 8 {
                        return Err(ChessError::InvalidFen {
                            reason: format!("横排溢出: {}", rank_text),
                        });
                    }
                } else {
                    let piece = Piece::from_fen_char(c).ok_or_else(|| ChessError::InvalidFen {
                        reason: format!("无效的棋子字符: {}", c),
                    })?;
                    if file >= 8 {
                        return Err(ChessError::InvalidFen {
                            reason: format!("横排溢出: {}", rank_text),
                        });
                    }
                    board.set(Square::new_unchecked(file, rank), Some(piece));
                    file += 1;
                }
            }

            if file != 8 {
                return Err(ChessError::InvalidFen {
                    reason: format!("横排长度不是 8: {}", rank_text),
                });
            }
        }

        Ok(board)
    }

    /// 生成完整的 FEN 字符串
    pub fn to_string(state: &BoardState) -> String {
        format!(
            "{} {} {} {} {} {}",
            Self::board_to_string(&state.board),
            state.side_to_move.to_fen_char(),
            state.castling.to_fen(),
            state
                .en_passant
                .map(|sq| sq.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state.halfmove_clock,
            state.fullmove_number,
        )
    }

    /// 生成棋盘布局字段（重复局面判定也以此为键）
    pub fn board_to_string(board: &Board) -> String {
        let mut result = String::with_capacity(72);

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match board.get(Square::new_unchecked(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            result.push(char::from_digit(empty, 10).unwrap_or('0'));
                            empty = 0;
                        }
                        result.push(piece.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                result.push(char::from_digit(empty, 10).unwrap_or('0'));
            }
            if rank > 0 {
                result.push('/');
            }
        }

        result
    }

    /// 标准初始局面
    pub fn initial() -> BoardState {
        BoardState::initial()
    }
}
