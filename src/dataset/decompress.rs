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

//! Streaming zstd decompression of the puzzle dump.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use tracing::info;

use super::{progress::bytes_bar, DatasetError, CHUNK_SIZE};

/// Decompress the zstd file at `src` into a new file at `dst`.
/// Only one chunk of decompressed data is held in memory at a time.
/// Returns the number of decompressed bytes written.
///
/// # Errors
///
/// This function will return a [`DatasetError::Decompression`] if `src` is corrupt or ends
/// partway through a frame, and a [`DatasetError::Io`] if either file cannot be opened or
/// written.
pub fn decompress(src: &Path, dst: &Path) -> Result<u64, DatasetError> {
    let decompression_err = |source| DatasetError::Decompression {
        path: src.to_path_buf(),
        source,
    };

    info!("decompressing {}", src.display());
    let input = File::open(src).map_err(DatasetError::io(src))?;
    let mut decoder = zstd::Decoder::new(input).map_err(decompression_err)?;
    let mut output = BufWriter::new(File::create(dst).map_err(DatasetError::io(dst))?);

    let bar = bytes_bar(None, "Decompressing");
    let mut chunk = vec![0; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = decoder.read(&mut chunk).map_err(decompression_err)?;
        if n == 0 {
            break;
        }
        output
            .write_all(&chunk[..n])
            .map_err(DatasetError::io(dst))?;
        written += n as u64;
        bar.inc(n as u64);
    }
    output.flush().map_err(DatasetError::io(dst))?;
    bar.finish();

    info!("decompressed {written} bytes to {}", dst.display());
    Ok(written)
}
