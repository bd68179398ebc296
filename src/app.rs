//! Invocation driver
//!
//! Owns the state that spans every request of one run: the TLS context,
//! the cookie jar and the header dump file. Requests run one after the
//! other, each wrapped in the retry controller. The jar is written back
//! only when every request succeeded.

use crate::config::OperationConfig;
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::output::HeaderSink;
use crate::retry::{self, Sleep, ThreadSleep};
use crate::transfer::perform_request;
use std::io;
use tracing::{debug, warn};

/// Run every request of the invocation
///
/// The first failed request ends the run and its error is returned.
pub fn run(oc: &OperationConfig) -> Result<()> {
    run_with(oc, &mut ThreadSleep)
}

pub fn run_with(oc: &OperationConfig, sleeper: &mut dyn Sleep) -> Result<()> {
    let tls = oc.tls.build()?;
    let mut jar = load_jar(oc)?;
    let mut header_sink = oc
        .dump_header
        .as_deref()
        .map(HeaderSink::create)
        .transpose()?;

    for info in &oc.requests {
        let status = retry::retry(&oc.retry, sleeper, || {
            perform_request(oc, &tls, jar.as_mut(), header_sink.as_mut(), info)
        })
        .map_err(|e| {
            if oc.requests.len() > 1 {
                warn!("{}: {}", info.url, e);
            }
            e
        })?;
        debug!("{} finished with {}", info.url, status.code());
    }

    if let (Some(jar), Some(path)) = (&jar, &oc.cookie_jar) {
        jar.save_file(path).map_err(|source| Error::Output {
            path: path.clone(),
            source,
        })?;
        debug!("Saved {} cookies to {}", jar.len(), path.display());
    }
    Ok(())
}

/// Build the jar from the configured cookie files
///
/// Missing files are skipped so the same path can be read and written.
fn load_jar(oc: &OperationConfig) -> Result<Option<CookieJar>> {
    if !oc.cookie_engine() {
        return Ok(None);
    }

    let mut jar = CookieJar::new();
    for path in &oc.cookie_files {
        match CookieJar::load_file(path) {
            Ok(loaded) => {
                debug!("Loaded {} cookies from {}", loaded.len(), path.display());
                jar.merge(loaded);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Cookie file {} does not exist", path.display());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "cannot read cookie file {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    if oc.junk_session_cookies {
        jar.clear_session_cookies();
    }
    Ok(Some(jar))
}
