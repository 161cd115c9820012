//! Binary entrypoint for `flintc-lsp`: a stdio JSON-RPC loop reading
//! `Content-Length`-framed requests from stdin and writing responses to
//! stdout, per the LSP base protocol.

use std::io::{self, BufReader, Write};
use std::process;

use flintc_lsp::protocol::{read_message, write_message};
use flintc_lsp::Server;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let mut server = Server::new();

    loop {
        let request = match read_message(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::info!("stdin closed, exiting");
                process::exit(0);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read message");
                process::exit(1);
            }
        };

        let is_exit = request.method == "exit";
        if let Some(response) = server.handle(request) {
            if let Err(e) = write_message(&mut writer, &response) {
                tracing::error!(error = %e, "failed to write response");
                process::exit(1);
            }
        }

        if is_exit {
            writer.flush().ok();
            process::exit(server.exit_code());
        }
    }
}
