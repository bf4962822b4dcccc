/*
  Matebook, a mate-in-N puzzle dataset builder and reward trainer.
  Copyright (C) 2022 Clayton Ramsey.

  Matebook is free software: you can redistribute it and/or modify
  it under the terms of the GNU General Public License as published by
  the Free Software Foundation, either version 3 of the License, or
  (at your option) any later version.

  Matebook is distributed in the hope that it will be useful,
  but WITHOUT ANY WARRANTY; without even the implied warranty of
  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
  GNU General Public License for more details.

  You should have received a copy of the GNU General Public License
  along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

//! The reward paid to a model for its answer to a puzzle.
//!
//! The reward is binary: a move earns `1.0` if it is legal in the puzzle position and leaves the
//! opponent checkmated, and `0.0` otherwise.
//! Model output is untrusted, so every way an answer can be wrong (an unparsable position, a
//! move that is not UCI, a move that is not legal) is folded into the zero reward rather than
//! reported as an error.
//! The chess rules themselves come from [`shakmaty`].

use shakmaty::{
    fen::{Fen, ParseFenError},
    uci::UciMove,
    CastlingMode, Chess, Position, PositionError,
};
use thiserror::Error;

use crate::prompt::extract_move;

/// The reward for a checkmating move.
pub const MATE_REWARD: f32 = 1.0;
/// The reward for anything else.
pub const NO_REWARD: f32 = 0.0;

#[derive(Debug, Error)]
/// The ways that a puzzle position can be unusable.
pub enum InvalidPositionError {
    /// The text is not well-formed FEN.
    #[error("malformed FEN: {0}")]
    Fen(#[from] ParseFenError),
    /// The FEN is well-formed, but describes a position which cannot arise in standard chess
    /// (such as the side not to move being in check).
    #[error("impossible position: {0}")]
    Impossible(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The judgement of a single answer to a puzzle.
pub enum Verdict {
    /// The move was legal and delivered checkmate.
    Checkmate,
    /// The move was legal, but the opponent is not mated afterward.
    NotMate,
    /// The move was well-formed UCI but not legal in the position.
    Illegal,
    /// The answer was not a UCI move at all.
    Malformed,
    /// The puzzle position itself could not be set up.
    InvalidPosition,
}

impl Verdict {
    #[must_use]
    /// Get the reward earned by an answer with this verdict.
    pub const fn reward(self) -> f32 {
        match self {
            Verdict::Checkmate => MATE_REWARD,
            _ => NO_REWARD,
        }
    }

    #[must_use]
    /// Determine whether the answer was a legal move.
    pub const fn is_legal(self) -> bool {
        matches!(self, Verdict::Checkmate | Verdict::NotMate)
    }
}

/// Set up a standard chess position from a FEN.
///
/// Castling rights without a matching king and rook, an en passant square with no capture
/// behind it, surplus material, and impossible checks are all tolerated: the position is set up
/// with the unusable rights dropped.
///
/// # Errors
///
/// This function will return an error if `fen` is not valid FEN or cannot be played from at all,
/// such as when a king is missing or the side not to move is in check.
pub fn parse_position(fen: &str) -> Result<Chess, InvalidPositionError> {
    Fen::from_ascii(fen.trim().as_bytes())?
        .into_position::<Chess>(CastlingMode::Standard)
        .or_else(PositionError::ignore_invalid_castling_rights)
        .or_else(PositionError::ignore_invalid_ep_square)
        .or_else(PositionError::ignore_too_much_material)
        .or_else(PositionError::ignore_impossible_check)
        .map_err(|e| InvalidPositionError::Impossible(e.to_string()))
}

/// Judge the answer `uci` in an already-constructed position.
/// Promotion letters must be lowercase.
#[must_use]
pub fn judge_in(pos: &Chess, uci: &str) -> Verdict {
    if uci.bytes().any(|b| b.is_ascii_uppercase()) {
        return Verdict::Malformed;
    }
    let Ok(uci) = UciMove::from_ascii(uci.as_bytes()) else {
        return Verdict::Malformed;
    };
    let Ok(m) = uci.to_move(pos) else {
        return Verdict::Illegal;
    };
    let mut after = pos.clone();
    after.play_unchecked(m);
    if after.is_checkmate() {
        Verdict::Checkmate
    } else {
        Verdict::NotMate
    }
}

/// Judge the answer `uci` to the puzzle starting at `fen`.
#[must_use]
pub fn judge(fen: &str, uci: &str) -> Verdict {
    match parse_position(fen) {
        Ok(pos) => judge_in(&pos, uci),
        Err(_) => Verdict::InvalidPosition,
    }
}

/// Compute the reward for answering the puzzle at `fen` with the move `uci`.
///
/// This never fails: any problem with either input earns [`NO_REWARD`].
#[must_use]
pub fn reward(fen: &str, uci: &str) -> f32 {
    judge(fen, uci).reward()
}

#[derive(Clone, Debug, Default, PartialEq)]
/// The scores for one group of completions answering the same puzzle.
pub struct GroupScore {
    /// The reward for each completion, in order.
    pub rewards: Vec<f32>,
    /// The number of completions which began with a legal move.
    pub legal: usize,
    /// The number of completions which delivered checkmate.
    pub mates: usize,
}

impl GroupScore {
    #[must_use]
    /// Get the mean reward of the group, or zero for an empty group.
    pub fn mean(&self) -> f32 {
        if self.rewards.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.rewards.len() as f32;
        self.rewards.iter().sum::<f32>() / n
    }
}

/// Score every completion in a group answering the puzzle at `fen`.
/// The move answered by each completion is its first whitespace-separated token; an empty
/// completion is malformed.
#[must_use]
pub fn score_group<S: AsRef<str>>(fen: &str, completions: &[S]) -> GroupScore {
    let pos = parse_position(fen).ok();
    let mut score = GroupScore::default();
    for completion in completions {
        let verdict = match (&pos, extract_move(completion.as_ref())) {
            (None, _) => Verdict::InvalidPosition,
            (Some(_), None) => Verdict::Malformed,
            (Some(pos), Some(uci)) => judge_in(pos, uci),
        };
        if verdict.is_legal() {
            score.legal += 1;
        }
        if verdict == Verdict::Checkmate {
            score.mates += 1;
        }
        score.rewards.push(verdict.reward());
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fens::{
        BACK_RANK_MATE_FEN, BOARD_START_FEN, FOOLS_MATE_FEN, MATE_IN_1_FEN, PINNED_KNIGHT_FEN,
        PROMOTION_MATE_FEN, WHITE_KINGSIDE_CASTLE_READY_FEN, WHITE_MATED_FEN,
    };

    #[test]
    /// Test that a back-rank rook mate earns the full reward.
    fn back_rank_mate() {
        assert_eq!(judge(BACK_RANK_MATE_FEN, "a1a8"), Verdict::Checkmate);
        assert_eq!(reward(BACK_RANK_MATE_FEN, "a1a8"), 1.0);
    }

    #[test]
    /// Test that a legal move which does not mate earns nothing.
    fn legal_non_mate() {
        assert_eq!(judge(BACK_RANK_MATE_FEN, "g2g3"), Verdict::NotMate);
        assert_eq!(reward(BACK_RANK_MATE_FEN, "g2g3"), 0.0);
        // a rook check which the king can walk away from is not mate either
        assert_eq!(judge(MATE_IN_1_FEN, "a7a8"), Verdict::NotMate);
    }

    #[test]
    /// Test that a pawn cannot leap three squares.
    fn illegal_pawn_jump() {
        assert_eq!(judge(BACK_RANK_MATE_FEN, "h2h5"), Verdict::Illegal);
        assert_eq!(reward(BACK_RANK_MATE_FEN, "h2h5"), 0.0);
    }

    #[test]
    /// Test that text which is not a move earns nothing, and does not panic.
    fn malformed_moves() {
        for garbage in ["zz99", "", "a1", "a1a8#", "Ra8#", "e2e4e5", "0000"] {
            assert_eq!(reward(BACK_RANK_MATE_FEN, garbage), 0.0, "{garbage:?}");
        }
        assert_eq!(judge(BACK_RANK_MATE_FEN, "zz99"), Verdict::Malformed);
        // the null move parses, but it is never legal
        assert_eq!(judge(BACK_RANK_MATE_FEN, "0000"), Verdict::Illegal);
    }

    #[test]
    /// Test that an unusable position earns nothing, and does not panic.
    fn invalid_positions() {
        for fen in [
            "",
            "not a fen",
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 x - - 0 1",
            "9/8/8/8/8/8/8/8 w - - 0 1",
            // no kings at all
            "8/8/8/8/8/8/8/8 w - - 0 1",
        ] {
            assert_eq!(judge(fen, "a1a8"), Verdict::InvalidPosition, "{fen:?}");
            assert_eq!(reward(fen, "a1a8"), 0.0);
        }
    }

    #[test]
    /// Test that mates are found for Black as well as White.
    fn black_mates() {
        assert_eq!(judge(FOOLS_MATE_FEN, "d8h4"), Verdict::Checkmate);
        assert_eq!(judge(FOOLS_MATE_FEN, "d8g5"), Verdict::NotMate);
    }

    #[test]
    /// Test that the second rook's mate in the mate-in-one position is recognized.
    fn double_rook_mate() {
        assert_eq!(judge(MATE_IN_1_FEN, "b6b8"), Verdict::Checkmate);
    }

    #[test]
    /// Test that promotions are judged by the piece promoted to.
    fn promotions() {
        assert_eq!(judge(PROMOTION_MATE_FEN, "c7c8q"), Verdict::Checkmate);
        assert_eq!(judge(PROMOTION_MATE_FEN, "c7c8r"), Verdict::Checkmate);
        assert_eq!(judge(PROMOTION_MATE_FEN, "c7c8n"), Verdict::NotMate);
        // a pawn reaching the last rank must promote
        assert_eq!(judge(PROMOTION_MATE_FEN, "c7c8"), Verdict::Illegal);
        // only pawns may promote
        assert_eq!(judge(PROMOTION_MATE_FEN, "b6b7q"), Verdict::Illegal);
    }

    #[test]
    /// Test that moves written with uppercase letters are not UCI.
    fn uppercase_moves() {
        assert_eq!(judge(PROMOTION_MATE_FEN, "c7c8Q"), Verdict::Malformed);
        assert_eq!(reward(PROMOTION_MATE_FEN, "c7c8Q"), 0.0);
        assert_eq!(judge(BACK_RANK_MATE_FEN, "A1A8"), Verdict::Malformed);
    }

    #[test]
    /// Test that positions with unusable castling rights, en passant squares, or surplus material
    /// are still judged normally.
    fn lenient_positions() {
        for fen in [
            // White has kingside castling rights but no rook on h1
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w K - 0 1",
            // no pawn could have just made a double step to e5
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - e6 0 1",
            // ten queens, more than promotion could ever produce
            "6k1/5ppp/8/8/1QQQQQ2/1QQQQQ2/5PPP/R5K1 w - - 0 1",
        ] {
            assert_eq!(judge(fen, "a1a8"), Verdict::Checkmate, "{fen:?}");
            assert_eq!(reward(fen, "a1a8"), 1.0);
        }
        // the unusable castling right is dropped rather than honored
        let stale = "6k1/5ppp/8/8/8/8/5PPP/R3K3 w K - 0 1";
        assert_eq!(judge(stale, "e1g1"), Verdict::Illegal);
    }

    #[test]
    /// Test that castling is legal only with the right to castle.
    fn castling() {
        assert_eq!(
            judge(WHITE_KINGSIDE_CASTLE_READY_FEN, "e1g1"),
            Verdict::NotMate
        );
        let no_rights = WHITE_KINGSIDE_CASTLE_READY_FEN.replace("KQkq", "kq");
        assert_eq!(judge(&no_rights, "e1g1"), Verdict::Illegal);
    }

    #[test]
    /// Test that a pinned piece may not move off its pin line.
    fn pins() {
        assert_eq!(judge(PINNED_KNIGHT_FEN, "d2f3"), Verdict::Illegal);
        assert_eq!(judge(PINNED_KNIGHT_FEN, "e1f2"), Verdict::NotMate);
    }

    #[test]
    /// Test that nothing is legal for a side which is already mated.
    fn already_mated() {
        assert_eq!(judge(WHITE_MATED_FEN, "e1e2"), Verdict::Illegal);
        assert_eq!(judge(WHITE_MATED_FEN, "c3c4"), Verdict::Illegal);
    }

    #[test]
    /// Test that moving the opponent's pieces is illegal.
    fn wrong_side() {
        assert_eq!(judge(BOARD_START_FEN, "e7e5"), Verdict::Illegal);
        assert_eq!(judge(BOARD_START_FEN, "e2e4"), Verdict::NotMate);
    }

    #[test]
    /// Test that the reward is a pure function of its inputs.
    fn deterministic() {
        for _ in 0..3 {
            assert_eq!(reward(BACK_RANK_MATE_FEN, "a1a8"), 1.0);
            assert_eq!(reward(BACK_RANK_MATE_FEN, "g2g3"), 0.0);
        }
    }

    #[test]
    /// Test scoring a whole group of completions for one prompt.
    fn group_scoring() {
        let completions = [
            "a1a8",
            " a1a8 because it is mate",
            "g2g3",
            "h2h5",
            "",
            "zz99 a1a8",
        ];
        let score = score_group(BACK_RANK_MATE_FEN, &completions);
        assert_eq!(score.rewards, [1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(score.legal, 3);
        assert_eq!(score.mates, 2);
        assert!((score.mean() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    /// Test that a group for an unusable position scores nothing.
    fn group_invalid_position() {
        let score = score_group("garbage", &["a1a8", "g2g3"]);
        assert_eq!(score.rewards, [0.0, 0.0]);
        assert_eq!(score.legal, 0);
        assert_eq!(GroupScore::default().mean(), 0.0);
    }
}
