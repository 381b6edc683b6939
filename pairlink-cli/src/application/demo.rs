use crate::infrastructure::{CliError, Result, SessionRuntime};
use futures::future::join_all;
use pairlink_core::{PairId, ParticipantId, Role, SessionStatus};
use pairlink_p2p::{
    MemoryRelayHub, SessionConfig, SessionController, SessionEvent, SimulatedEngineFactory,
    SyntheticMediaSource,
};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Settings for an in-process pairing demo
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub participants: usize,
    /// Base seed; participant `n` uses `seed + n`
    pub seed: Option<u64>,
    pub timeout: Duration,
    /// Pause between participants joining the lobby
    pub join_interval: Duration,
    pub poll_interval_ms: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            participants: 2,
            seed: None,
            timeout: Duration::from_secs(10),
            join_interval: Duration::from_millis(250),
            poll_interval_ms: 10,
        }
    }
}

/// What one demo participant ended up with
#[derive(Debug, Clone)]
pub struct ParticipantReport {
    pub id: ParticipantId,
    pub pair_id: Option<PairId>,
    pub role: Option<Role>,
    pub peer: Option<ParticipantId>,
    pub media_attached: bool,
    pub diagnostics: usize,
    /// Status before the demo stopped everything
    pub status: SessionStatus,
}

impl ParticipantReport {
    fn new(id: ParticipantId) -> Self {
        Self {
            id,
            pair_id: None,
            role: None,
            peer: None,
            media_attached: false,
            diagnostics: 0,
            status: SessionStatus::Idle,
        }
    }

    fn record(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Paired {
                pair_id,
                role,
                peer,
            } => {
                self.pair_id = Some(pair_id);
                self.role = Some(role);
                self.peer = Some(peer);
            }
            SessionEvent::RoleChanged(role) => self.role = Some(role),
            SessionEvent::RemoteMediaAttached => self.media_attached = true,
            SessionEvent::Diagnostic(_) => self.diagnostics += 1,
            SessionEvent::StatusChanged(_) => {}
        }
    }
}

impl fmt::Display for ParticipantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pair_id, self.role, &self.peer) {
            (Some(pair_id), Some(role), Some(peer)) => write!(
                f,
                "{} [{}] pair {} as {} with {}, media {}",
                self.id,
                self.status,
                pair_id,
                role,
                peer,
                if self.media_attached { "attached" } else { "pending" }
            ),
            _ => write!(f, "{} [{}] unpaired", self.id, self.status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub participants: Vec<ParticipantReport>,
    pub timed_out: bool,
}

impl DemoReport {
    /// Pairs where both sides attached remote media
    pub fn connected_pairs(&self) -> usize {
        self.participants.iter().filter(|p| p.media_attached).count() / 2
    }

    pub fn participant(&self, id: &str) -> Option<&ParticipantReport> {
        self.participants.iter().find(|p| p.id.as_str() == id)
    }
}

/// Run `participants` sessions on one in-memory relay until the pairable
/// ones have remote media, or the timeout passes
pub async fn run_demo(options: DemoOptions) -> Result<DemoReport> {
    if options.participants == 0 {
        return Err(CliError::InvalidConfig(
            "the demo needs at least one participant".to_string(),
        ));
    }

    tracing::info!("🎬 Starting demo with {} participant(s)", options.participants);

    let hub = MemoryRelayHub::new();
    let mut runtimes = Vec::with_capacity(options.participants);
    let mut reports = Vec::with_capacity(options.participants);

    for n in 0..options.participants {
        let id = ParticipantId::new(format!("p{:02}", n + 1));

        let mut config = SessionConfig::default().with_poll_interval(options.poll_interval_ms);
        if let Some(seed) = options.seed {
            config = config.with_rng_seed(seed.wrapping_add(n as u64));
        }

        let controller = SessionController::new(
            config,
            hub.relay_with_id(id.clone()),
            SyntheticMediaSource::new(),
            SimulatedEngineFactory::default(),
        );
        runtimes.push(SessionRuntime::spawn(controller));
        reports.push(ParticipantReport::new(id));

        tokio::time::sleep(options.join_interval).await;
        collect(&mut runtimes, &mut reports);
    }

    // A lone participant has nobody to wait for
    let expected = options.participants / 2 * 2;
    let deadline = Instant::now() + options.timeout;
    let mut timed_out = false;

    loop {
        collect(&mut runtimes, &mut reports);

        let attached = reports.iter().filter(|r| r.media_attached).count();
        if attached >= expected {
            break;
        }
        if Instant::now() >= deadline {
            tracing::warn!(
                "⏰ Demo timed out with {}/{} participant(s) connected",
                attached,
                expected
            );
            timed_out = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(options.poll_interval_ms.max(1))).await;
    }

    join_all(runtimes.into_iter().map(SessionRuntime::stop))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    Ok(DemoReport {
        participants: reports,
        timed_out,
    })
}

fn collect(runtimes: &mut [SessionRuntime], reports: &mut [ParticipantReport]) {
    for (runtime, report) in runtimes.iter_mut().zip(reports.iter_mut()) {
        for event in runtime.try_events() {
            report.record(event);
        }
        report.status = runtime.status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(participants: usize) -> DemoOptions {
        DemoOptions {
            participants,
            seed: Some(11),
            timeout: Duration::from_secs(5),
            join_interval: Duration::from_millis(100),
            poll_interval_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_two_participants_connect() {
        let report = run_demo(quick(2)).await.expect("demo runs");

        assert!(!report.timed_out);
        assert_eq!(report.connected_pairs(), 1);

        let first = report.participant("p01").expect("p01 reported");
        let second = report.participant("p02").expect("p02 reported");
        assert_eq!(first.role, Some(Role::Answerer));
        assert_eq!(second.role, Some(Role::Offerer));
        assert_eq!(first.pair_id.as_ref().map(|p| p.as_str()), Some("p01-p02"));
        assert_eq!(first.status, SessionStatus::Matched);
    }

    #[tokio::test]
    async fn test_four_participants_form_two_pairs() {
        let report = run_demo(quick(4)).await.expect("demo runs");
        assert_eq!(report.connected_pairs(), 2);
    }

    #[tokio::test]
    async fn test_single_participant_stays_waiting() {
        let report = run_demo(quick(1)).await.expect("demo runs");

        assert!(!report.timed_out);
        assert_eq!(report.connected_pairs(), 0);
        assert_eq!(report.participants[0].status, SessionStatus::WaitingForPeer);
    }

    #[tokio::test]
    async fn test_zero_participants_rejected() {
        let err = run_demo(quick(0)).await.expect_err("should be rejected");
        assert!(matches!(err, CliError::InvalidConfig(_)));
    }
}
