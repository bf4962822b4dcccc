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

//! Matebook prepares mate-in-N puzzle datasets and trains language models to solve them.
//!
//! There are two independent halves to this crate.
//!
//! - [`dataset`] downloads the Lichess puzzle dump, decompresses it, and filters it down to the
//!   puzzles carrying a mate-in-N theme, sorted by rating.
//! - [`train`] runs a reward-driven fine-tuning loop: positions are drawn from a [`corpus`],
//!   rendered into a [`prompt`], answered by an external model, and scored by the [`reward`]
//!   function, which pays out only for a legal move that delivers checkmate.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod corpus;
pub mod dataset;
pub mod logging;
pub mod prompt;
pub mod reward;
pub mod train;

#[cfg(test)]
/// A module containing Forsyth-Edwards Notation (FEN) strings which are used for tests.
mod fens;

#[cfg(test)]
mod test_server;

/// The version string reported by the binaries at startup.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");
