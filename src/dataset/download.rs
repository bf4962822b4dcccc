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

//! Streaming download of the compressed puzzle dump.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    time::Duration,
};

use reqwest::blocking::Client;
use tracing::info;

use super::{progress::bytes_bar, DatasetError, CHUNK_SIZE};

/// Construct the HTTP client used for downloads.
///
/// The dump is several hundred megabytes, so the client never times out on its own.
///
/// # Errors
///
/// This function will return an error if the client's TLS backend could not be initialized.
pub fn client() -> Result<Client, DatasetError> {
    Client::builder()
        .user_agent(concat!("matebook/", env!("CARGO_PKG_VERSION")))
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| DatasetError::Transfer {
            url: String::new(),
            reason: format!("could not construct HTTP client: {e}"),
        })
}

/// Download the resource at `url` into a new file at `dst`, one chunk at a time.
/// Returns the number of bytes written.
///
/// # Errors
///
/// This function will return an error if the connection fails, if the server responds with a
/// non-success status, or if `dst` cannot be written.
/// A partially-written `dst` is not removed.
pub fn download(url: &str, dst: &Path) -> Result<u64, DatasetError> {
    download_with(&client()?, url, dst)
}

/// Download the resource at `url` into `dst` using an existing `client`.
///
/// # Errors
///
/// This function will return an error under the same conditions as [`download`].
pub fn download_with(client: &Client, url: &str, dst: &Path) -> Result<u64, DatasetError> {
    let transfer_err = |reason: String| DatasetError::Transfer {
        url: url.to_string(),
        reason,
    };

    info!("downloading {url}");
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| transfer_err(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(transfer_err(format!("server responded with status {status}")));
    }

    let bar = bytes_bar(response.content_length(), "Downloading");
    let mut file = BufWriter::new(File::create(dst).map_err(DatasetError::io(dst))?);
    let mut chunk = vec![0; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = response
            .read(&mut chunk)
            .map_err(|e| transfer_err(e.to_string()))?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n]).map_err(DatasetError::io(dst))?;
        written += n as u64;
        bar.inc(n as u64);
    }
    file.flush().map_err(DatasetError::io(dst))?;
    bar.finish();

    info!("downloaded {written} bytes to {}", dst.display());
    Ok(written)
}
