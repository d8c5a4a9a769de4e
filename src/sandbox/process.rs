// Child process helpers - group kill and pipe draining

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::warn;

/// How long pipes may stay open once the process group is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// SIGKILL every process in the group led by `pgid`
#[cfg(unix)]
pub(crate) fn kill_group(pgid: u32) {
    let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already empty
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid = pgid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pgid: u32) {}

/// Read a child pipe to EOF on a background task
pub(crate) fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                warn!(error = %e, "child pipe read failed");
            }
        }
        buf
    })
}

/// Bytes read so far; a pipe still held open after the grace period is abandoned
pub(crate) async fn collect(mut handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            warn!(error = %e, "pipe reader task failed");
            Vec::new()
        }
        Err(_) => {
            warn!("child pipe still open after the process group was killed");
            handle.abort();
            Vec::new()
        }
    }
}
