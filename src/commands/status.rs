use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::session::SessionStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let store = SessionStore::new(&args.connection.cache_root);

    info!(
        cache_root = %args.connection.cache_root.display(),
        api = %args.connection.api_base_url,
        timeout_ms = args.connection.timeout_ms,
        "status requested"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "api_base_url: {}", args.connection.api_base_url)?;
    writeln!(output, "session_file: {}", store.path().display())?;

    match store.load() {
        Ok(Some(session)) => {
            info!(
                username = %session.username,
                token_type = %session.token_type,
                issued_at = %session.issued_at,
                "loaded session"
            );
            writeln!(output, "signed_in_as: {}", session.username)?;
            writeln!(output, "signed_in_at: {}", session.issued_at)?;
        }
        Ok(None) => {
            warn!(path = %store.path().display(), "no stored session");
            writeln!(output, "signed_in_as: —")?;
        }
        Err(err) => {
            warn!(error = %err, "session file unreadable");
            writeln!(output, "signed_in_as: — (session file unreadable)")?;
        }
    }

    output.flush()?;
    Ok(())
}
