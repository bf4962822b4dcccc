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

/// The FEN of the official starting position for any chess game.
pub const BOARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// White can mate along the back rank with Ra8#, since Black's own pawns box in the king.
pub const BACK_RANK_MATE_FEN: &str = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";

/// A board where White can mate in 1 with Rb8#.
pub const MATE_IN_1_FEN: &str = "3k4/R7/1R6/5K2/8/8/8/8 w - - 0 1";

/// Black to move; Black can mate in 1 with ...Qh4#.
/// This is the position of the Fool's Mate after 1. f3 e5 2. g4.
pub const FOOLS_MATE_FEN: &str = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2";

/// White mates by promoting the c7-pawn to a queen or rook, but an underpromotion to a knight
/// lets the Black king out through b8.
pub const PROMOTION_MATE_FEN: &str = "k7/2P5/1K6/8/8/8/8/8 w - - 0 1";

/// A board where White is ready to castle on the kingside.
pub const WHITE_KINGSIDE_CASTLE_READY_FEN: &str =
    "r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

/// A board where the knight on d2 is pinned to the White king by the bishop on a5.
pub const PINNED_KNIGHT_FEN: &str = "4k3/8/8/b7/8/8/3N4/4K3 w - - 0 1";

/// A board where the black queen on e2 has mated White's king.
pub const WHITE_MATED_FEN: &str = "r1b2b1r/ppp2kpp/8/4p3/3n4/2Q5/PP1PqPPP/RNB1K2R w KQ - 4 11";
