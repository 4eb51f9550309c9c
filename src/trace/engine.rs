use parking_lot::Mutex;
use scopeguard::defer;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{ListenError, TraceAbort, TraceError};
use crate::lookup::DnsLookup;
use crate::probe::{Listener, Reply, ReplyKind, Transport, UdpTransport, resolve_target};
use crate::state::{Hop, Termination, TraceEvent, TraceResult};
use crate::trace::task::{BoundedTask, TaskOutcome};

/// Extra time a listener gets past its read deadline before it is abandoned
const JOIN_GRACE: Duration = Duration::from_millis(500);

/// What the engine does after a hop has been assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Stop(Termination),
}

/// Listener outcome for one TTL and the time it took
struct HopRound {
    outcome: Result<Reply, ListenError>,
    latency: Duration,
}

/// Runs traces toward one configured target and streams their hops
///
/// Clones share the live channel, the cancellation handle and the running
/// flag. Only one trace runs per tracer (and its clones) at a time; a second
/// concurrent call fails with [`TraceError::Busy`].
///
/// The live channel never blocks the trace. It holds at least one full
/// trace of events; a subscriber that falls further behind skips the oldest
/// events (`RecvError::Lagged`). Every trace that passes validation ends
/// with exactly one terminal event, [`TraceEvent::Finished`] or
/// [`TraceEvent::Aborted`].
pub struct Tracer<T: Transport = UdpTransport> {
    config: Arc<Config>,
    transport: Arc<T>,
    events: broadcast::Sender<TraceEvent>,
    cancel: Arc<Mutex<CancellationToken>>,
    running: Arc<AtomicBool>,
    dns: Arc<OnceLock<DnsLookup>>,
}

impl<T: Transport> Clone for Tracer<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: self.transport.clone(),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            running: self.running.clone(),
            dns: self.dns.clone(),
        }
    }
}

impl Tracer<UdpTransport> {
    /// Tracer using unprivileged UDP probes and an ICMP listener
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, UdpTransport)
    }
}

impl<T: Transport> Tracer<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity());
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            events,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            running: Arc::new(AtomicBool::new(false)),
            dns: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to hops and end markers of traces started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.events.subscribe()
    }

    /// Stop the running trace at the next hop boundary (or the next trace, if none is running)
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run a full trace on the current task
    ///
    /// Returns the ordered hops when the trace ends on its own (see
    /// [`Termination`]). Configuration errors and setup I/O failures abort
    /// with a [`TraceAbort`] carrying the hops collected so far.
    pub async fn trace(&self) -> Result<TraceResult, TraceAbort> {
        let mut result = TraceResult::new(self.config.target.clone());

        if let Err(e) = self.config.validate() {
            let error = TraceError::from(e);
            self.publish(TraceEvent::Aborted {
                reason: error.to_string(),
            });
            return Err(TraceAbort::new(error, result));
        }

        if self.running.swap(true, Ordering::AcqRel) {
            return Err(TraceAbort::new(TraceError::Busy, result));
        }

        let outcome = {
            defer! { self.finish_run(); }
            let cancel = self.cancel.lock().clone();
            self.run(&mut result, &cancel).await
        };

        match outcome {
            Ok(termination) => {
                debug!(
                    target_addr = %self.config.target,
                    hops = result.hops.len(),
                    %termination,
                    "trace finished"
                );
                result.termination = Some(termination);
                self.publish(TraceEvent::Finished { termination });
                Ok(result)
            }
            Err(error) => {
                warn!(target_addr = %self.config.target, error = %error, "trace aborted");
                self.publish(TraceEvent::Aborted {
                    reason: error.to_string(),
                });
                Err(TraceAbort::new(error, result))
            }
        }
    }

    /// Run a trace on its own tokio task; observe it through [`Tracer::subscribe`]
    pub fn spawn(&self) -> JoinHandle<Result<TraceResult, TraceAbort>> {
        let tracer = self.clone();
        tokio::spawn(async move { tracer.trace().await })
    }

    async fn run(
        &self,
        result: &mut TraceResult,
        cancel: &CancellationToken,
    ) -> Result<Termination, TraceError> {
        let destination = resolve_target(&self.config.target, self.config.port).await?;
        result.destination = Some(destination);
        debug!(
            target_addr = %self.config.target,
            %destination,
            start_ttl = self.config.start_ttl,
            max_ttl = self.config.max_ttl,
            hops = self.config.hop_budget(),
            "starting trace"
        );

        for ttl in self.config.start_ttl..=self.config.max_ttl {
            if cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            let Some(round) = self.probe_hop(destination, ttl, cancel).await? else {
                return Ok(Termination::Cancelled);
            };

            let (hop, step) = assess(ttl, &round);
            if let Some(hop) = hop {
                let hop = self.resolve_host(hop).await;
                self.record(result, hop);
            }
            if let Step::Stop(termination) = step {
                return Ok(termination);
            }
        }

        Ok(Termination::MaxTtlReached)
    }

    /// Listen, send one probe, wait for the listener. `None` when cancelled.
    async fn probe_hop(
        &self,
        destination: SocketAddrV4,
        ttl: u8,
        cancel: &CancellationToken,
    ) -> Result<Option<HopRound>, TraceError> {
        let timeout = self.config.timeout;

        // The listener must be open before the probe leaves
        let listener = self.transport.listen(timeout)?;
        let listening = BoundedTask::spawn(move || listener.receive());

        let sent_at = Instant::now();
        // Held until the listener is done so the probe socket stays open
        let probe = self.transport.send_probe(destination, ttl)?;
        trace!(ttl = probe.ttl(), "waiting for reply");

        let outcome = match listening.join(timeout + JOIN_GRACE, cancel).await {
            TaskOutcome::Completed(outcome) => outcome,
            TaskOutcome::Panicked(reason) => Err(ListenError::Worker(reason)),
            TaskOutcome::TimedOut => Err(ListenError::Timeout(timeout)),
            TaskOutcome::Cancelled => return Ok(None),
        };

        Ok(Some(HopRound {
            outcome,
            latency: sent_at.elapsed(),
        }))
    }

    async fn resolve_host(&self, hop: Hop) -> Hop {
        if !self.config.dns_enabled {
            return hop;
        }
        let Some(ip) = hop.ip() else {
            return hop;
        };
        let dns = self.dns.get_or_init(DnsLookup::new);
        let host = dns.host_for(ip).await;
        hop.with_host(host)
    }

    fn record(&self, result: &mut TraceResult, hop: Hop) {
        debug!(
            ttl = hop.ttl,
            address = %hop.address,
            host = %hop.host,
            latency_ms = hop.latency_ms,
            reachable = hop.reachable,
            "hop recorded"
        );
        result.hops.push(hop.clone());
        self.publish(TraceEvent::Hop(hop));
    }

    fn publish(&self, event: TraceEvent) {
        // No subscribers is fine; the returned result is authoritative
        if self.events.send(event).is_err() {
            trace!("no live subscribers");
        }
    }

    fn finish_run(&self) {
        {
            let mut cancel = self.cancel.lock();
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
        }
        self.running.store(false, Ordering::Release);
    }
}

/// Turn a listener outcome into the hop to record and the next step
fn assess(ttl: u8, round: &HopRound) -> (Option<Hop>, Step) {
    match &round.outcome {
        Ok(reply) => match reply.kind {
            ReplyKind::TimeExceeded => (
                Some(Hop::replied(ttl, reply.responder, round.latency, true)),
                Step::Continue,
            ),
            ReplyKind::DestinationUnreachable => (
                Some(Hop::replied(ttl, reply.responder, round.latency, false)),
                Step::Stop(Termination::DestinationUnreachable),
            ),
            ReplyKind::Unexpected(icmp_type) => {
                debug!(ttl, icmp_type, responder = %reply.responder, "unexpected ICMP type");
                (None, Step::Stop(Termination::UnexpectedReply))
            }
        },
        Err(e) if e.is_timeout() => {
            debug!(ttl, "no reply, stopping trace");
            (
                Some(Hop::silent(ttl, round.latency)),
                Step::Stop(Termination::NoReply),
            )
        }
        Err(e) => {
            warn!(ttl, error = %e, "listener failed, stopping trace");
            (
                Some(Hop::silent(ttl, round.latency)),
                Step::Stop(Termination::ListenerFailed),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NO_REPLY_ADDRESS;
    use std::net::Ipv4Addr;

    const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn round(outcome: Result<Reply, ListenError>) -> HopRound {
        HopRound {
            outcome,
            latency: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_time_exceeded_continues() {
        let (hop, step) = assess(3, &round(Ok(Reply::new(ROUTER, ReplyKind::TimeExceeded))));
        let hop = hop.unwrap();
        assert_eq!(hop.ttl, 3);
        assert_eq!(hop.address, "10.0.0.1");
        assert!(hop.reachable);
        assert_eq!(step, Step::Continue);
    }

    #[test]
    fn test_unreachable_stops() {
        let reply = Reply::new(ROUTER, ReplyKind::DestinationUnreachable);
        let (hop, step) = assess(4, &round(Ok(reply)));
        assert!(!hop.unwrap().reachable);
        assert_eq!(step, Step::Stop(Termination::DestinationUnreachable));
    }

    #[test]
    fn test_unexpected_type_not_recorded() {
        let (hop, step) = assess(2, &round(Ok(Reply::new(ROUTER, ReplyKind::Unexpected(0)))));
        assert!(hop.is_none());
        assert_eq!(step, Step::Stop(Termination::UnexpectedReply));
    }

    #[test]
    fn test_timeout_records_silent_hop_and_stops() {
        let (hop, step) = assess(5, &round(Err(ListenError::Timeout(Duration::from_secs(3)))));
        let hop = hop.unwrap();
        assert_eq!(hop.address, NO_REPLY_ADDRESS);
        assert!(!hop.reachable);
        assert!((hop.latency_ms - 12.0).abs() < 1e-9);
        assert_eq!(step, Step::Stop(Termination::NoReply));
    }

    #[test]
    fn test_listener_failure_stops() {
        let (hop, step) = assess(6, &round(Err(ListenError::Parse("short".into()))));
        assert_eq!(hop.unwrap().address, NO_REPLY_ADDRESS);
        assert_eq!(step, Step::Stop(Termination::ListenerFailed));

        let (_, step) = assess(6, &round(Err(ListenError::Worker("panicked".into()))));
        assert_eq!(step, Step::Stop(Termination::ListenerFailed));
    }
}
