use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::config::Settings;
use crate::irc::Connector;
use crate::session::SessionController;
use crate::youtube::MetadataLookup;

const INITIAL_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Why the restart loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A session spent its message budget and left the server
    Finished,
    /// The operator asked the process to stop
    Interrupted,
}

/// Exponential restart delay, capped at `max`. A zero cap disables waiting.
#[derive(Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(max: Duration) -> Self {
        Self {
            next: INITIAL_RESTART_DELAY.min(max),
            max,
        }
    }

    /// Delay to wait now; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = INITIAL_RESTART_DELAY.min(self.max);
    }
}

/// Run sessions back to back until one finishes or `shutdown` resolves.
///
/// Failed sessions are logged and replaced with a fresh one.
pub async fn run<C, F>(settings: &Settings, connector: &C, lookup: Arc<dyn MetadataLookup>, shutdown: F) -> Exit
where
    C: Connector,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut backoff = Backoff::new(settings.max_restart_delay);

    loop {
        let mut controller = SessionController::new(settings.clone(), lookup.clone());

        let result = tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                return Exit::Interrupted;
            }
            result = controller.run(connector) => result,
        };

        match result {
            Ok(()) => return Exit::Finished,
            Err(e) => error!("Session failed: {e}"),
        }

        if controller.reached_monitoring() {
            backoff.reset();
        }
        let delay = backoff.next_delay();
        if delay.is_zero() {
            continue;
        }

        info!("Restarting in {delay:?}");
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                return Exit::Interrupted;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::Event;
    use crate::testing::{AfterScript, FakeLookup, ScriptedConnector, channel_message};

    fn settings(budget: u32) -> Settings {
        let mut settings = Settings::new("irc.example.net", "#chan", "bot", "key");
        settings.message_budget = budget;
        settings
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(5));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_cap_disables_backoff() {
        let mut backoff = Backoff::new(Duration::ZERO);
        assert!(backoff.next_delay().is_zero());
        assert!(backoff.next_delay().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_failure_until_finished() {
        let connector = ScriptedConnector::new(AfterScript::Close)
            .session(vec![Event::Welcome])
            .session(vec![Event::Welcome, channel_message("#chan", "hi")]);
        let lookup = Arc::new(FakeLookup::new());

        let exit = run(&settings(1), &connector, lookup, std::future::pending()).await;

        assert_eq!(exit, Exit::Finished);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_session_gets_a_fresh_budget() {
        let connector = ScriptedConnector::new(AfterScript::Close)
            .session(vec![Event::Welcome, channel_message("#chan", "one")])
            .session(vec![
                Event::Welcome,
                channel_message("#chan", "two"),
                channel_message("#chan", "three"),
            ]);
        let lookup = Arc::new(FakeLookup::new());

        let exit = run(&settings(2), &connector, lookup, std::future::pending()).await;

        assert_eq!(exit, Exit::Finished);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_restart_loop() {
        // every connect is refused
        let connector = ScriptedConnector::new(AfterScript::Close);
        let lookup = Arc::new(FakeLookup::new());
        let shutdown = tokio::time::sleep(Duration::from_secs(30));

        let exit = run(&settings(10), &connector, lookup, shutdown).await;

        assert_eq!(exit, Exit::Interrupted);
        // 1 + 2 + 4 + 8 = 15s of waiting fits in 30s, 1 + 2 + 4 + 8 + 16 does not
        assert_eq!(connector.connects(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_live_session() {
        let connector = ScriptedConnector::new(AfterScript::Hang).session(vec![Event::Welcome]);
        let lookup = Arc::new(FakeLookup::new());
        let shutdown = tokio::time::sleep(Duration::from_secs(5));

        let exit = run(&settings(10), &connector, lookup, shutdown).await;

        assert_eq!(exit, Exit::Interrupted);
        assert_eq!(connector.connects(), 1);
    }
}
