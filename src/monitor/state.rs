use std::fmt;

/// Lifecycle of the monitor.
///
/// `Starting -> Running -> (Degraded <-> Running) -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Running,
    /// recent reads failed, but fewer than the retry limit in a row
    Degraded,
    Stopping,
    Stopped,
}

impl ServiceState {
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (Starting, Running | Stopping)
                | (Running, Running | Degraded | Stopping)
                | (Degraded, Degraded | Running | Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Degraded => "DEGRADED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::ServiceState::{self, *};

    const ALL: [ServiceState; 5] = [Starting, Running, Degraded, Stopping, Stopped];

    #[test]
    fn happy_path() {
        for (a, b) in [
            (Starting, Running),
            (Running, Degraded),
            (Degraded, Running),
            (Running, Stopping),
            (Stopping, Stopped),
        ] {
            assert!(a.can_transition_to(b), "{a} -> {b}");
        }
    }

    #[test]
    fn startup_failure_stops() {
        assert!(Starting.can_transition_to(Stopping));
        assert!(Degraded.can_transition_to(Stopping));
    }

    #[test]
    fn illegal() {
        assert!(!Starting.can_transition_to(Degraded));
        assert!(!Stopping.can_transition_to(Running));
        assert!(!Starting.can_transition_to(Stopped));
        for next in ALL {
            assert!(!Stopped.can_transition_to(next), "STOPPED -> {next}");
        }
    }
}
