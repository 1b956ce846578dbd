use std::io;

use tokio::{
    select,
    signal::unix::{signal, SignalKind},
};

use super::ShutdownHandle;
use crate::misc::Flag;

/// Traps the signals the service manager and logrotate send.
///
/// - SIGTERM / SIGINT: trigger shutdown
/// - SIGHUP: raise `rotate` so log files are reopened. configuration is *not* reloaded
///
/// must be called from inside the runtime
pub fn trap_signals(mut handle: ShutdownHandle, rotate: Flag) -> io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;
    debug!("Trapping SIGTERM, SIGINT and SIGHUP");
    tokio::spawn(async move {
        loop {
            select! {
                _ = term.recv() => {
                    info!("SIGTERM received, shutting down");
                    handle.trigger_shutdown();
                    break;
                }
                _ = int.recv() => {
                    info!("SIGINT received, shutting down");
                    handle.trigger_shutdown();
                    break;
                }
                _ = hup.recv() => {
                    rotate.signal();
                    info!("SIGHUP received, reopening log files");
                }
                _ = handle.wait_for_shutdown() => break,
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use nix::{
        sys::signal::{kill, Signal},
        unistd::Pid,
    };
    use tokio::time::{sleep, timeout};

    use super::trap_signals;
    use crate::{daemon::shutdown::Shutdown, misc::Flag};

    const PATIENCE: Duration = Duration::from_secs(5);

    // both signals in one test, a stray SIGTERM would hit whichever test trapped it
    #[tokio::test]
    async fn hangup_reopens_and_terminate_shuts_down() {
        let mut shutdown = Shutdown::new();
        let rotate = Flag::new();
        let mut reopen = rotate.watch();
        trap_signals(shutdown.handle(), rotate).unwrap();
        let mut handle = shutdown.handle();

        kill(Pid::this(), Signal::SIGHUP).unwrap();
        timeout(PATIENCE, async {
            while !reopen.take() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("SIGHUP did not raise the reopen flag");
        assert!(!handle.is_triggered(), "SIGHUP must not shut down");

        kill(Pid::this(), Signal::SIGTERM).unwrap();
        timeout(PATIENCE, handle.wait_for_shutdown())
            .await
            .expect("SIGTERM did not trigger shutdown");
        assert!(handle.is_triggered());

        drop(handle);
        timeout(PATIENCE, shutdown.wait_for_completion())
            .await
            .expect("signal task did not exit");
    }
}
