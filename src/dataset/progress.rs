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

//! Byte-counting progress bars for the long-running pipeline stages.

use indicatif::{ProgressBar, ProgressStyle};

/// The template used when the total number of bytes is known up front.
const BOUNDED_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})";

/// The template used when the total is unknown, e.g. for a server that sends no
/// `Content-Length` or for decompressed output.
const UNBOUNDED_TEMPLATE: &str = "{spinner} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})";

/// Construct a progress bar counting bytes for a stage described by `label`.
/// If `total` is `None`, the bar is a spinner which only reports a running byte count.
pub fn bytes_bar(total: Option<u64>, label: &'static str) -> ProgressBar {
    let bar = match total {
        Some(len) => ProgressBar::new(len).with_style(
            ProgressStyle::with_template(BOUNDED_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        ),
        None => ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template(UNBOUNDED_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        ),
    };
    bar.with_message(label)
}
