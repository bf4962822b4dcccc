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

//! Single-shot HTTP servers for exercising the network clients without network access.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    sync::mpsc::{self, Receiver},
    thread,
};

use reqwest::blocking::Client;

/// A request received by a test server.
pub struct Request {
    /// The request line, such as `POST /generate HTTP/1.1`.
    pub line: String,
    /// The request body.
    pub body: Vec<u8>,
}

/// Serve exactly one request on a fresh local port, replying with `status` (e.g. `"200 OK"`) and
/// `body`.
/// Returns the server's base URL and a channel on which the received request is delivered.
pub fn serve_recording(status: &'static str, body: Vec<u8>) -> (String, Receiver<Request>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        let _ = reader.read_line(&mut request_line);
        let mut content_length = 0;
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 && line != "\r\n" {
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            line.clear();
        }
        let mut request_body = vec![0; content_length];
        let _ = reader.read_exact(&mut request_body);

        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
        let _ = tx.send(Request {
            line: request_line.trim_end().to_string(),
            body: request_body,
        });
    });
    (format!("http://{addr}"), rx)
}

/// Serve the puzzle dump exactly once.
/// Returns a URL pointing at the dump.
pub fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    let (base, _) = serve_recording(status, body);
    format!("{base}/lichess_db_puzzle.csv.zst")
}

/// Construct a client which ignores any proxy configured in the environment, since the test
/// servers are only reachable directly.
pub fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}
