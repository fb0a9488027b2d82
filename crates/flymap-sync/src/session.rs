//! The map session actor.
//!
//! One task per rendered map instance owns the mirror state, the renderer
//! and the active-marker table, and processes host commands and inbound
//! frames strictly sequentially off one queue. Event ordering is the sole
//! consistency mechanism; there is no concurrent writer.

use crate::backoff::{attempts_remaining, reconnect_delay};
use crate::mirror::{ApplyOutcome, MirrorState};
use crate::state::{ConnectionState, SessionStatus};
use crate::transport::{Connector, Transport, LEAVE_REASON};
use chrono::{DateTime, Utc};
use flymap_core::{ConnectionError, MapConfig, Result};
use flymap_geo::{canonicalize, project, RegionDirectory};
use flymap_render::MarkerRenderer;
use flymap_wire::{InboundEvent, MarkerStatePayload, OutboundEvent, StateSyncPayload};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Host-view configuration for one session. Read-only to the session.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Channel topic identifying this map's event stream
    pub channel_topic: String,
    /// Id of the map target element in the host document
    pub map_element_id: String,
    /// Server-rendered initial state, painted before any connection attempt
    pub initial_state: Option<MarkerStatePayload>,
    /// When false the host opted out of live enhancement entirely
    pub progressive_enhancement: bool,
}

/// Notification sent to the host when the session permanently degrades to
/// server-driven rendering. Sent exactly once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackNotice {
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Commands the host can post into the session's queue.
#[derive(Debug)]
pub enum SessionCommand {
    Teardown,
}

/// Handle returned to the host for a spawned session.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    fallback_rx: mpsc::Receiver<FallbackNotice>,
    svg_rx: watch::Receiver<String>,
    status: SessionStatus,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Latest rendered document.
    pub fn svg(&self) -> String {
        self.svg_rx.borrow().clone()
    }

    /// Watch receiver for render updates.
    pub fn svg_receiver(&self) -> watch::Receiver<String> {
        self.svg_rx.clone()
    }

    /// Receives the fallback notification, if the session ever degrades.
    pub async fn recv_fallback(&mut self) -> Option<FallbackNotice> {
        self.fallback_rx.recv().await
    }

    pub fn try_recv_fallback(&mut self) -> Option<FallbackNotice> {
        self.fallback_rx.try_recv().ok()
    }

    /// Tears the session down and waits for the actor to exit.
    pub async fn teardown(self) {
        let _ = self.commands.send(SessionCommand::Teardown).await;
        let _ = self.task.await;
    }

    /// Waits for the actor to exit on its own (fallback or remote leave).
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Spawns the actor for one map instance.
///
/// Feature detection happens before any connection attempt: a missing
/// transport, map target or channel topic sends the session directly to
/// fallback, as does a host that opted out of progressive enhancement.
pub fn spawn(
    host: HostConfig,
    map_config: MapConfig,
    connector: Option<Box<dyn Connector>>,
) -> Result<SessionHandle> {
    let directory = RegionDirectory::with_custom(&map_config.custom_regions)?;
    let (command_tx, command_rx) = mpsc::channel(16);
    let (fallback_tx, fallback_rx) = mpsc::channel(1);
    let (svg_tx, svg_rx) = watch::channel(String::new());
    let status = SessionStatus::new();

    let mut renderer = MarkerRenderer::new(map_config.viewport, map_config.theme.clone());
    let mut mirror = MirrorState::new();
    mirror.config.viewport = map_config.viewport;
    mirror.config.update_throttle_ms = map_config.update_throttle_ms;
    mirror.theme = map_config.theme.clone();
    renderer.set_theme(mirror.theme.clone());

    let session = MapSession {
        host,
        policy: map_config.reconnect,
        directory,
        mirror,
        renderer,
        status: status.clone(),
        commands: command_rx,
        fallback_tx,
        svg_tx,
        last_publish: None,
        dirty: false,
    };

    let task = tokio::spawn(session.run(connector));

    Ok(SessionHandle {
        commands: command_tx,
        fallback_rx,
        svg_rx,
        status,
        task,
    })
}

struct MapSession {
    host: HostConfig,
    policy: flymap_core::ReconnectPolicy,
    directory: RegionDirectory,
    mirror: MirrorState,
    renderer: MarkerRenderer,
    status: SessionStatus,
    commands: mpsc::Receiver<SessionCommand>,
    fallback_tx: mpsc::Sender<FallbackNotice>,
    svg_tx: watch::Sender<String>,
    last_publish: Option<Instant>,
    dirty: bool,
}

impl MapSession {
    async fn run(mut self, connector: Option<Box<dyn Connector>>) {
        // Initial paint from server-rendered state, before any connection.
        if let Some(initial) = self.host.initial_state.clone() {
            match self
                .mirror
                .apply(&InboundEvent::MarkerState(initial), &self.directory)
            {
                Ok(outcome) => self.render_outcome(&outcome),
                Err(e) => warn!(error = %e, "Initial state failed validation; starting empty"),
            }
        }
        self.publish(true);

        if let Some(reason) = self.feature_gate(connector.is_some()) {
            self.enter_fallback(reason).await;
            return;
        }
        let connector = match connector {
            Some(c) => c,
            // Unreachable past the gate, but never panic in the actor.
            None => {
                self.enter_fallback("transport unavailable".to_string()).await;
                return;
            }
        };

        let mut rejoined = false;
        loop {
            self.status.set_state(ConnectionState::Connecting);
            match connector.connect(&self.host.channel_topic).await {
                Ok(mut transport) => {
                    self.status.set_state(ConnectionState::Joined);
                    self.status.reset_reconnect_attempts();
                    info!(topic = %self.host.channel_topic, rejoined, "Channel joined");

                    if rejoined {
                        self.request_resync(transport.as_mut()).await;
                    }
                    rejoined = true;

                    let exit = self.event_loop(transport.as_mut()).await;
                    if self.dirty {
                        self.publish(true);
                    }
                    match exit {
                        LoopExit::Teardown => {
                            let _ = transport.close().await;
                            self.status.set_state(ConnectionState::Closed);
                            return;
                        }
                        LoopExit::IntentionalLeave => {
                            self.status.set_state(ConnectionState::Closed);
                            return;
                        }
                        LoopExit::ConnectionLost(e) => {
                            self.status.set_error(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Channel join failed");
                    self.status.set_state(ConnectionState::Error);
                    self.status.set_error(e.to_string());
                }
            }

            let attempts = self.status.record_reconnect_attempt();
            if !attempts_remaining(attempts, &self.policy) {
                self.enter_fallback(format!(
                    "connection lost after {attempts} attempts"
                ))
                .await;
                return;
            }

            let delay = reconnect_delay(attempts, &self.policy);
            debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");

            // The timer is cancellable: a teardown arriving while we wait
            // wins, so no duplicate channel setup can follow it.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                cmd = self.commands.recv() => {
                    if matches!(cmd, Some(SessionCommand::Teardown) | None) {
                        self.status.set_state(ConnectionState::Closed);
                        return;
                    }
                }
            }
        }
    }

    /// Processes commands and frames until the connection drops or the host
    /// tears the session down. Frames are handled to completion before the
    /// next message is taken off the queue. While a throttled render is
    /// pending, a timer races the queue so the last event of a burst is
    /// published once the window closes even if no further traffic arrives.
    async fn event_loop(&mut self, transport: &mut dyn Transport) -> LoopExit {
        loop {
            let flush_at = self.flush_deadline();
            tokio::select! {
                _ = tokio::time::sleep_until(flush_at), if self.dirty => {
                    self.publish(true);
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(SessionCommand::Teardown) | None => return LoopExit::Teardown,
                    }
                }
                frame = transport.next_frame() => {
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text),
                        Some(Err(e)) => {
                            if is_intentional_leave(&e) {
                                info!("Channel left intentionally; not reconnecting");
                                return LoopExit::IntentionalLeave;
                            }
                            warn!(error = %e, "Transport error");
                            self.status.set_state(ConnectionState::Error);
                            return LoopExit::ConnectionLost(e);
                        }
                        None => {
                            self.status.set_state(ConnectionState::Closed);
                            return LoopExit::ConnectionLost(ConnectionError::closed(
                                "stream ended",
                            ));
                        }
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let event = match InboundEvent::from_json(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.status.record_event_dropped();
                return;
            }
        };

        match self.mirror.apply(&event, &self.directory) {
            Ok(outcome) => {
                self.status.record_event_applied();
                self.render_outcome(&outcome);
                self.publish(false);
            }
            Err(e) => {
                warn!(event = event.name(), error = %e, "Dropping invalid event");
                self.status.record_event_dropped();
            }
        }
    }

    /// Reconciles the renderer with the mirror for one applied event,
    /// touching the smallest sufficient part of the document.
    fn render_outcome(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::FullReplace => {
                self.renderer.clear();
                self.renderer.set_theme(self.mirror.theme.clone());
                let viewport = self.mirror.config.viewport;
                self.renderer.create_markers_from_groups(
                    &self.mirror.marker_groups,
                    &viewport,
                    &self.directory,
                );
            }
            ApplyOutcome::GroupReplaced { group_id } => {
                self.renderer.remove_group_markers(group_id);
                self.render_group(group_id);
            }
            ApplyOutcome::MarkerAdded {
                group_id,
                marker_id,
            } => {
                self.render_single_marker(group_id, marker_id);
            }
            ApplyOutcome::MarkerRemoved {
                group_id,
                marker_id,
                reindexed,
            } => {
                if *reindexed {
                    // Position-derived ids shifted; rebuild the group so
                    // renderer ids match the mirror again.
                    self.renderer.remove_group_markers(group_id);
                    self.render_group(group_id);
                } else {
                    self.renderer.remove_marker(marker_id);
                }
            }
            ApplyOutcome::ThemeChanged => {
                self.renderer.set_theme(self.mirror.theme.clone());
            }
            ApplyOutcome::VisibilityChanged { group_id, visible } => {
                if !self.renderer.toggle_group_visibility(group_id, *visible) {
                    warn!(%group_id, "Visibility toggle for unrendered group");
                }
            }
            ApplyOutcome::Ignored { .. } => {}
        }
    }

    fn render_group(&mut self, group_id: &str) {
        let Some(group) = self.mirror.group(group_id).cloned() else {
            return;
        };
        let viewport = self.mirror.config.viewport;
        self.renderer
            .create_markers_from_groups(std::slice::from_ref(&group), &viewport, &self.directory);
    }

    fn render_single_marker(&mut self, group_id: &str, marker_id: &str) {
        let Some(group) = self.mirror.group(group_id) else {
            return;
        };
        let index = group.markers.len() - 1;
        debug_assert_eq!(marker_id, format!("{group_id}-{index}"));
        let spec = group.markers[index].clone();
        let style = group.style.clone();

        match canonicalize(group_id, index, &spec, &self.directory) {
            Ok(marker) => {
                let pixel = project(marker.point, &self.mirror.config.viewport);
                let extra = marker
                    .label
                    .as_ref()
                    .map(|l| vec![("data-label".to_string(), l.clone())])
                    .unwrap_or_default();
                self.renderer
                    .create_marker(&marker.id, group_id, &style, pixel.x, pixel.y, &extra);
            }
            // Validation ran before apply; a failure here means the mirror
            // and directory disagree, which is worth a log but not a crash.
            Err(e) => warn!(%group_id, error = %e, "Added marker failed canonicalization"),
        }
    }

    /// Instant at which a dirty render becomes publishable again. Only
    /// meaningful while `dirty` is set, which implies a prior publish.
    fn flush_deadline(&self) -> Instant {
        let throttle = Duration::from_millis(self.mirror.config.update_throttle_ms);
        self.last_publish
            .and_then(|last| last.checked_add(throttle))
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600))
    }

    /// Publishes the current document, honouring the configured throttle.
    /// Throttled renders are marked dirty; the event loop's flush timer
    /// publishes them when the window closes.
    fn publish(&mut self, force: bool) {
        let throttle = Duration::from_millis(self.mirror.config.update_throttle_ms);
        let due = match self.last_publish {
            Some(last) => last.elapsed() >= throttle,
            None => true,
        };
        if force || due {
            let _ = self.svg_tx.send(self.renderer.to_svg());
            self.last_publish = Some(Instant::now());
            self.dirty = false;
        } else {
            self.dirty = true;
        }
    }

    /// Environment checks run on mount. Any failure means no connection is
    /// attempted at all.
    fn feature_gate(&self, transport_available: bool) -> Option<String> {
        if !self.host.progressive_enhancement {
            return Some("progressive enhancement disabled".to_string());
        }
        if !transport_available {
            return Some("transport unavailable".to_string());
        }
        if self.host.channel_topic.is_empty() {
            return Some("no channel topic".to_string());
        }
        if self.host.map_element_id.is_empty() {
            return Some("no map target element".to_string());
        }
        None
    }

    async fn request_resync(&mut self, transport: &mut dyn Transport) {
        let event = OutboundEvent::StateSync(StateSyncPayload {
            client_state: self.mirror.summary(),
        });
        match event.to_json() {
            Ok(frame) => {
                if let Err(e) = transport.send(frame).await {
                    warn!(error = %e, "Failed to send state_sync");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode state_sync"),
        }
    }

    /// Terminal degradation: clear client-rendered markers, flush, notify
    /// the host exactly once so it can resume server-driven rendering.
    async fn enter_fallback(&mut self, reason: String) {
        info!(%reason, "Session degrading to server-rendered fallback");
        self.renderer.clear();
        self.publish(true);
        self.status.set_state(ConnectionState::Fallback);

        if self.status.mark_fallback_notified() {
            let notice = FallbackNotice {
                reason,
                timestamp: Utc::now(),
            };
            if self.fallback_tx.send(notice).await.is_err() {
                debug!("Fallback receiver dropped before notification");
            }
        }
    }
}

enum LoopExit {
    Teardown,
    IntentionalLeave,
    ConnectionLost(ConnectionError),
}

fn is_intentional_leave(error: &ConnectionError) -> bool {
    matches!(error, ConnectionError::Closed { reason } if reason == LEAVE_REASON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flymap_core::MapConfig;

    fn host(topic: &str, element: &str) -> HostConfig {
        HostConfig {
            channel_topic: topic.to_string(),
            map_element_id: element.to_string(),
            initial_state: None,
            progressive_enhancement: true,
        }
    }

    #[tokio::test]
    async fn test_missing_transport_goes_straight_to_fallback() {
        let mut handle = spawn(host("map:lobby", "map"), MapConfig::default(), None).unwrap();
        let notice = handle.recv_fallback().await.unwrap();
        assert!(notice.reason.contains("transport"));
        assert!(handle.status().is_fallback());
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_missing_topic_goes_straight_to_fallback() {
        struct NeverConnector;
        #[async_trait::async_trait]
        impl Connector for NeverConnector {
            async fn connect(
                &self,
                _topic: &str,
            ) -> std::result::Result<Box<dyn Transport>, ConnectionError> {
                panic!("feature gate must prevent connection attempts");
            }
        }

        let mut handle = spawn(
            host("", "map"),
            MapConfig::default(),
            Some(Box::new(NeverConnector)),
        )
        .unwrap();
        let notice = handle.recv_fallback().await.unwrap();
        assert!(notice.reason.contains("topic"));
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_progressive_enhancement_opt_out() {
        let mut config = host("map:lobby", "map");
        config.progressive_enhancement = false;
        let mut handle = spawn(config, MapConfig::default(), None).unwrap();
        let notice = handle.recv_fallback().await.unwrap();
        assert!(notice.reason.contains("progressive enhancement"));
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_fallback_leaves_a_cleared_document() {
        use flymap_core::{MarkerGroup, MarkerSpec};
        use flymap_wire::SessionConfig;

        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![MarkerSpec::RegionCode("sjc".to_string())];
        let mut config = host("map:lobby", "map");
        config.initial_state = Some(MarkerStatePayload {
            marker_groups: vec![group],
            theme: Default::default(),
            config: SessionConfig::default(),
        });

        let mut handle = spawn(config, MapConfig::default(), None).unwrap();
        handle.recv_fallback().await.unwrap();
        // Fallback clears client-rendered markers: the published document is
        // a valid empty map.
        let svg = handle.svg();
        assert!(svg.contains("class=\"flymap\""));
        assert!(!svg.contains("class=\"marker\""));
        handle.wait().await;
    }
}
