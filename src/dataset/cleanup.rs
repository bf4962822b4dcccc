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

//! Idempotent removal of intermediate files.

use std::{fs, io::ErrorKind, path::Path};

use tracing::info;

use super::DatasetError;

/// Delete the file at `path` if it exists.
/// Returns `true` if a file was deleted, and `false` if there was nothing to delete.
///
/// # Errors
///
/// This function will return an error if the file exists but could not be removed.
pub fn remove_if_present(path: &Path) -> Result<bool, DatasetError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("deleted {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DatasetError::io(path)(e)),
    }
}
