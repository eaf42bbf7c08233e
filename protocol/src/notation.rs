//! 坐标记谱法（"e2e4"、"e7e8q"）

use crate::error::ChessError;
use crate::moves::Move;
use crate::piece::{PieceKind, Square};

/// 走法文本转换
pub struct Notation;

impl Notation {
    /// 格式化走法为坐标记谱
    pub fn format(mv: &Move) -> String {
        mv.to_string()
    }

    /// 解析坐标记谱为（起点、终点、升变）三元组
    ///
    /// 不验证合法性，只做语法解析。真正的走法匹配由合法走法集合完成。
    pub fn parse(text: &str) -> Result<(Square, Square, Option<PieceKind>), ChessError> {
        let malformed = || ChessError::MalformedMove {
            input: text.to_string(),
        };

        if !text.is_ascii() || text.len() < 4 || text.len() > 5 {
            return Err(malformed());
        }

        let from = Square::from_algebraic(&text[0..2]).map_err(|_| malformed())?;
        let to = Square::from_algebraic(&text[2..4]).map_err(|_| malformed())?;

        let promotion = match text.len() {
            5 => {
                let c = text.chars().nth(4).ok_or_else(malformed)?;
                Some(PieceKind::from_promotion_char(c).ok_or_else(malformed)?)
            }
            _ => None,
        };

        Ok((from, to, promotion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::MoveKind;

    #[test]
    fn test_format() {
        let mv = Move::new(
            Square::from_algebraic("e2").unwrap(),
            Square::from_algebraic("e4").unwrap(),
            MoveKind::DoublePawnPush,
        );
        assert_eq!(Notation::format(&mv), "e2e4");

        let mv = Move::with_promotion(
            Square::from_algebraic("a7").unwrap(),
            Square::from_algebraic("a8").unwrap(),
            MoveKind::Quiet,
            PieceKind::Queen,
        );
        assert_eq!(Notation::format(&mv), "a7a8q");
    }

    #[test]
    fn test_parse() {
        let (from, to, promotion) = Notation::parse("e2e4").unwrap();
        assert_eq!(from, Square::from_algebraic("e2").unwrap());
        assert_eq!(to, Square::from_algebraic("e4").unwrap());
        assert_eq!(promotion, None);

        let (_, _, promotion) = Notation::parse("e7e8n").unwrap();
        assert_eq!(promotion, Some(PieceKind::Knight));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "e2", "e2e", "e2e9", "i2e4", "e2e4x", "e2e4qq"] {
            assert!(
                matches!(
                    Notation::parse(input),
                    Err(ChessError::MalformedMove { .. })
                ),
                "应拒绝: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_round_trip() {
        for text in ["a1h8", "e2e4", "h7h8r", "b2b1b"] {
            let (from, to, promotion) = Notation::parse(text).unwrap();
            let mv = Move {
                from,
                to,
                kind: MoveKind::Quiet,
                promotion,
            };
            assert_eq!(Notation::format(&mv), text);
        }
    }
}
