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

//! Rendering puzzles into prompts, and reading moves back out of completions.

use crate::dataset::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A renderer of puzzle positions into instruction prompts for a chat-tuned model.
pub struct PromptBuilder {
    /// The number of moves in which the model is asked to mate.
    depth: u8,
}

impl PromptBuilder {
    #[must_use]
    /// Construct a prompt builder asking for mate in `depth` moves.
    pub const fn new(depth: u8) -> PromptBuilder {
        PromptBuilder { depth }
    }

    #[must_use]
    /// Construct a prompt builder for puzzles of the given theme.
    pub const fn for_theme(theme: Theme) -> PromptBuilder {
        PromptBuilder::new(theme.depth())
    }

    #[must_use]
    /// Get the mating depth this builder asks for.
    pub const fn depth(self) -> u8 {
        self.depth
    }

    #[must_use]
    /// Render the prompt for the position `fen`.
    pub fn render(self, fen: &str) -> String {
        format!(
            "<|user|>FEN: {fen}\nMate in {}. Your best move?<|assistant|>",
            self.depth
        )
    }

    #[must_use]
    /// Render the prompts for a batch of positions, in order.
    pub fn render_all<S: AsRef<str>>(self, fens: &[S]) -> Vec<String> {
        fens.iter().map(|fen| self.render(fen.as_ref())).collect()
    }
}

#[must_use]
/// Extract the move a model answered with: the first whitespace-separated token of its
/// completion.
/// Returns `None` if the completion is empty or entirely whitespace.
pub fn extract_move(completion: &str) -> Option<&str> {
    completion.split_whitespace().next()
}
