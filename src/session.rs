//! Client-side room session state machine.
//!
//! [`Session`] is a plain value with no I/O. The
//! [`RoomClient`](crate::client::RoomClient) owns one inside a
//! `tokio::sync::watch` channel and feeds it three kinds of input:
//!
//! - channel lifecycle callbacks (`begin_connect`, `channel_opened`,
//!   `channel_closed`, `channel_failed`), each tagged with the generation of
//!   the channel that produced it;
//! - inbound [`ServerMessage`]s via [`Session::apply`];
//! - local commands (`create_room`, `upload_photo`, ...) which update state
//!   optimistically and return the [`ClientMessage`] to put on the wire.
//!
//! Every `connect` bumps the generation, so callbacks from a superseded
//! channel compare unequal and are ignored.

use serde_json::Value;
use tracing::debug;

use crate::codec::strip_data_uri_prefix;
use crate::protocol::{
    AnalyzingPayload, ClientMessage, PlayerId, PlayerInfo, PlayerJoinedPayload, RoomCode,
    RoomCreatedPayload, RoomType, ServerMessage,
};

/// Message stored in `last_error` when the channel itself fails.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error";

/// Identifies one channel opened by `connect`.
pub type Generation = u64;

// ── Value types ─────────────────────────────────────────────────────

/// State of the transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub ready: bool,
}

impl From<PlayerInfo> for Player {
    fn from(info: PlayerInfo) -> Self {
        Self {
            id: info.id,
            display_name: info.name,
            ready: info.ready,
        }
    }
}

/// Latest analysis progress pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisProgress {
    pub step: String,
    /// Percent complete as sent by the server; not interpolated.
    pub percent: f64,
}

impl From<AnalyzingPayload> for AnalysisProgress {
    fn from(payload: AnalyzingPayload) -> Self {
        Self {
            step: payload.step,
            percent: payload.progress,
        }
    }
}

/// Which reveal event produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealKind {
    /// `reveal`: one pairwise comparison.
    Duo,
    /// `group_reveal`: a comparison matrix.
    Group,
}

/// Final result for the room, passed through from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealResult {
    pub kind: RevealKind,
    pub payload: Value,
}

/// Stage of the multiplayer flow. Payload lives only in the active variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Lobby,
    ConsentPending,
    Upload,
    Waiting,
    Analyzing(AnalysisProgress),
    Countdown {
        seconds: u32,
    },
    Revealed(RevealResult),
}

impl Phase {
    /// Position in the flow. Transitions never move to a lower rank within
    /// one room.
    fn rank(&self) -> u8 {
        match self {
            Self::Lobby => 0,
            Self::ConsentPending => 1,
            Self::Upload => 2,
            Self::Waiting => 3,
            Self::Analyzing(_) => 4,
            Self::Countdown { .. } => 5,
            Self::Revealed(_) => 6,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::ConsentPending => "consent-pending",
            Self::Upload => "upload",
            Self::Waiting => "waiting",
            Self::Analyzing(_) => "analyzing",
            Self::Countdown { .. } => "countdown",
            Self::Revealed(_) => "revealed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of this client inside a room. Room code and player id only
/// exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub is_host: bool,
    pub room_type: Option<RoomType>,
}

/// What the last create/join command asked for, kept until the server
/// assigns an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    name: String,
    room_code: Option<RoomCode>,
    room_type: Option<RoomType>,
}

// ── Session ─────────────────────────────────────────────────────────

/// The client's view of its room.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    status: ConnectionStatus,
    membership: Option<Membership>,
    pending: Option<PendingEntry>,
    roster: Vec<Player>,
    phase: Phase,
    consent_granted: bool,
    consent_on_file: bool,
    photos_ready: bool,
    last_error: Option<String>,
    generation: Generation,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Session {
    /// An idle session. `consent_on_file` seeds the local consent flag after
    /// every reset.
    pub fn new(consent_on_file: bool) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            membership: None,
            pending: None,
            roster: Vec::new(),
            phase: Phase::Lobby,
            consent_granted: consent_on_file,
            consent_on_file,
            photos_ready: false,
            last_error: None,
            generation: 0,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }

    pub fn room_code(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.room_code.as_str())
    }

    pub fn local_player_id(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.player_id.as_str())
    }

    pub fn is_host(&self) -> bool {
        self.membership.as_ref().is_some_and(|m| m.is_host)
    }

    /// Room type as confirmed by the server, or as requested when creating.
    pub fn room_type(&self) -> Option<RoomType> {
        self.membership.as_ref().and_then(|m| m.room_type)
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn analysis_progress(&self) -> Option<&AnalysisProgress> {
        match &self.phase {
            Phase::Analyzing(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        match self.phase {
            Phase::Countdown { seconds } => Some(seconds),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&RevealResult> {
        match &self.phase {
            Phase::Revealed(result) => Some(result),
            _ => None,
        }
    }

    /// `true` while the server is waiting for this client's consent.
    pub fn consent_required(&self) -> bool {
        self.phase == Phase::ConsentPending
    }

    pub fn consent_granted(&self) -> bool {
        self.consent_granted
    }

    /// Set once `all_photos_in` arrives.
    pub fn photos_ready(&self) -> bool {
        self.photos_ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the roster has reached the minimum for the room type.
    /// Unknown room types are treated as duo.
    pub fn can_start(&self) -> bool {
        let room_type = self.room_type().unwrap_or_default();
        self.roster.len() >= room_type.min_players()
    }

    /// No channel, no room and nothing left to show.
    pub fn is_idle(&self) -> bool {
        self.status == ConnectionStatus::Disconnected
            && self.membership.is_none()
            && self.pending.is_none()
            && self.roster.is_empty()
            && self.phase == Phase::Lobby
            && !self.photos_ready
            && self.last_error.is_none()
    }

    /// Generation of the channel this session currently accepts input from.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    // ── Channel lifecycle ───────────────────────────────────────────

    /// Start a fresh session for a new channel and return its generation.
    ///
    /// Any callback still carrying an older generation is ignored from here on.
    pub fn begin_connect(&mut self) -> Generation {
        self.reset_room();
        self.generation += 1;
        self.status = ConnectionStatus::Connecting;
        self.last_error = None;
        debug!(generation = self.generation, "session: connecting");
        self.generation
    }

    /// The channel for `generation` signalled open. Returns `false` if that
    /// channel has been superseded and must be discarded.
    pub fn channel_opened(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation, "open") || self.status != ConnectionStatus::Connecting {
            return false;
        }
        self.status = ConnectionStatus::Connected;
        debug!(generation, "session: connected");
        true
    }

    /// The channel for `generation` closed without an error. Room state is
    /// kept so a revealed result stays visible.
    pub fn channel_closed(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation, "close") || self.status == ConnectionStatus::Disconnected
        {
            return false;
        }
        self.status = ConnectionStatus::Disconnected;
        debug!(generation, "session: disconnected");
        true
    }

    /// The channel for `generation` failed. Room state is discarded; the user
    /// must reconnect.
    pub fn channel_failed(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation, "error") {
            return false;
        }
        self.reset_room();
        self.status = ConnectionStatus::Error;
        self.last_error = Some(CONNECTION_ERROR_MESSAGE.to_string());
        debug!(generation, "session: channel error");
        true
    }

    /// Return to idle: no room, no channel. Bumps the generation so anything
    /// still in flight is ignored.
    pub fn reset(&mut self) {
        self.reset_room();
        self.generation += 1;
        self.status = ConnectionStatus::Disconnected;
        self.last_error = None;
        debug!(generation = self.generation, "session: reset");
    }

    fn is_current(&self, generation: Generation, what: &str) -> bool {
        if generation == self.generation {
            return true;
        }
        debug!(
            generation,
            current = self.generation,
            "ignoring {what} from superseded channel"
        );
        false
    }

    fn reset_room(&mut self) {
        self.membership = None;
        self.pending = None;
        self.roster.clear();
        self.phase = Phase::Lobby;
        self.consent_granted = self.consent_on_file;
        self.photos_ready = false;
    }

    // ── Local commands ──────────────────────────────────────────────

    /// Request a new room. The name is remembered to seed the roster when
    /// `room_created` arrives.
    pub fn create_room(&mut self, name: impl Into<String>, room_type: RoomType) -> ClientMessage {
        let name = name.into();
        self.pending = Some(PendingEntry {
            name: name.clone(),
            room_code: None,
            room_type: Some(room_type),
        });
        ClientMessage::CreateRoom { name, room_type }
    }

    /// Request to join `room_code`. The code becomes this session's room code
    /// once `player_joined` assigns the local id.
    pub fn join_room(
        &mut self,
        name: impl Into<String>,
        room_code: impl Into<RoomCode>,
    ) -> ClientMessage {
        let name = name.into();
        let room_code = room_code.into();
        self.pending = Some(PendingEntry {
            name: name.clone(),
            room_code: Some(room_code.clone()),
            room_type: None,
        });
        ClientMessage::JoinRoom { name, room_code }
    }

    /// Grant consent without waiting for acknowledgment and move on to upload.
    pub fn grant_consent(&mut self) -> ClientMessage {
        self.consent_granted = true;
        self.advance(Phase::Upload);
        ClientMessage::GrantConsent {}
    }

    /// The user is ready to leave the lobby. With consent on hand this
    /// grants it and moves to upload; otherwise it asks for consent first and
    /// sends nothing.
    pub fn room_ready(&mut self) -> Option<ClientMessage> {
        if self.consent_granted {
            Some(self.grant_consent())
        } else {
            self.advance(Phase::ConsentPending);
            None
        }
    }

    /// Submit a photo; accepts a `data:` URI or raw base64.
    pub fn upload_photo(&mut self, image: &str) -> ClientMessage {
        let photo = strip_data_uri_prefix(image).to_owned();
        self.advance(Phase::Waiting);
        ClientMessage::UploadPhoto { photo }
    }

    pub fn mark_ready(&self) -> ClientMessage {
        ClientMessage::Ready {}
    }

    /// Build the `leave` command. The caller sends it and then calls
    /// [`reset`](Self::reset).
    pub fn leave(&self) -> ClientMessage {
        ClientMessage::Leave {}
    }

    // ── Inbound events ──────────────────────────────────────────────

    /// Apply one server event from the channel tagged `generation`.
    ///
    /// Returns `true` if the session changed.
    pub fn apply(&mut self, generation: Generation, msg: ServerMessage) -> bool {
        if !self.is_current(generation, msg.kind()) {
            return false;
        }

        let changed = match msg {
            ServerMessage::RoomCreated(payload) => {
                self.on_room_created(payload);
                true
            }
            ServerMessage::PlayerJoined(payload) => {
                self.on_player_joined(payload);
                true
            }
            ServerMessage::PlayerLeft(payload) => {
                let before = self.roster.len();
                self.roster.retain(|p| p.id != payload.player_id);
                self.roster.len() != before
            }
            ServerMessage::ConsentRequired => {
                !self.consent_granted && self.advance(Phase::ConsentPending)
            }
            ServerMessage::ConsentGranted(notice) | ServerMessage::PhotoReceived(notice) => {
                debug!(player_id = ?notice.player_id, "informational event");
                false
            }
            ServerMessage::AllPhotosIn => !std::mem::replace(&mut self.photos_ready, true),
            ServerMessage::Analyzing(payload) => self.advance(Phase::Analyzing(payload.into())),
            ServerMessage::Countdown(payload) => self.advance(Phase::Countdown {
                seconds: payload.seconds,
            }),
            ServerMessage::Reveal(payload) => self.advance(Phase::Revealed(RevealResult {
                kind: RevealKind::Duo,
                payload,
            })),
            ServerMessage::GroupReveal(payload) => self.advance(Phase::Revealed(RevealResult {
                kind: RevealKind::Group,
                payload,
            })),
            ServerMessage::Error(payload) => {
                self.last_error = Some(payload.message);
                return true;
            }
        };

        if changed {
            self.last_error = None;
        }
        changed
    }

    fn on_room_created(&mut self, payload: RoomCreatedPayload) {
        let pending = self.pending.take();
        let room_type = payload
            .room_type
            .or_else(|| pending.as_ref().and_then(|p| p.room_type));
        self.roster = vec![Player {
            id: payload.player_id.clone(),
            display_name: pending.map(|p| p.name).unwrap_or_default(),
            ready: false,
        }];
        self.membership = Some(Membership {
            room_code: payload.room_code,
            player_id: payload.player_id,
            is_host: true,
            room_type,
        });
        // A new room starts a new phase lifetime.
        self.phase = Phase::Lobby;
        self.consent_granted = self.consent_on_file;
        self.photos_ready = false;
        if self.status == ConnectionStatus::Connecting {
            self.status = ConnectionStatus::Connected;
        }
    }

    fn on_player_joined(&mut self, payload: PlayerJoinedPayload) {
        let mut roster: Vec<Player> = Vec::with_capacity(payload.players.len());
        for info in payload.players {
            if roster.iter().any(|p| p.id == info.id) {
                debug!(player_id = %info.id, "dropping duplicate roster entry");
                continue;
            }
            roster.push(info.into());
        }
        self.roster = roster;

        if self.membership.is_none() {
            if let Some(player_id) = payload.player_id {
                self.adopt_joined_identity(player_id);
            }
        }
        if self.status == ConnectionStatus::Connecting {
            self.status = ConnectionStatus::Connected;
        }
    }

    fn adopt_joined_identity(&mut self, player_id: PlayerId) {
        let Some(room_code) = self.pending.as_ref().and_then(|p| p.room_code.clone()) else {
            debug!(%player_id, "player_joined before any join request, identity not adopted");
            return;
        };
        let room_type = self.pending.take().and_then(|p| p.room_type);
        self.membership = Some(Membership {
            room_code,
            player_id,
            is_host: false,
            room_type,
        });
    }

    /// Move to `next` unless that would go backwards. Equal rank overwrites
    /// (repeated `analyzing`/`countdown` updates).
    fn advance(&mut self, next: Phase) -> bool {
        if next.rank() < self.phase.rank() {
            debug!(from = %self.phase, to = %next, "ignoring backwards phase transition");
            return false;
        }
        if next == self.phase {
            return false;
        }
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        true
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{CountdownPayload, ErrorPayload, PlayerLeftPayload, PlayerNotice};
    use serde_json::json;

    fn connected() -> (Session, Generation) {
        let mut session = Session::default();
        let generation = session.begin_connect();
        assert!(session.channel_opened(generation));
        (session, generation)
    }

    fn info(id: &str, name: &str) -> PlayerInfo {
        PlayerInfo {
            id: id.into(),
            name: name.into(),
            ready: false,
        }
    }

    fn room_created(code: &str, id: &str) -> ServerMessage {
        ServerMessage::RoomCreated(RoomCreatedPayload {
            room_code: code.into(),
            player_id: id.into(),
            room_type: None,
        })
    }

    fn player_joined(id: Option<&str>, players: &[(&str, &str)]) -> ServerMessage {
        ServerMessage::PlayerJoined(PlayerJoinedPayload {
            player_id: id.map(Into::into),
            players: players.iter().map(|(id, name)| info(id, name)).collect(),
        })
    }

    fn analyzing(step: &str, progress: f64) -> ServerMessage {
        ServerMessage::Analyzing(AnalyzingPayload {
            step: step.into(),
            progress,
        })
    }

    fn countdown(seconds: u32) -> ServerMessage {
        ServerMessage::Countdown(CountdownPayload { seconds })
    }

    #[test]
    fn new_session_is_idle() {
        let session = Session::default();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(session.room_code().is_none());
        assert!(session.local_player_id().is_none());
        assert!(!session.is_host());
        assert!(session.roster().is_empty());
        assert_eq!(session.phase(), &Phase::Lobby);
        assert!(session.is_idle());
    }

    #[test]
    fn host_flow_assigns_identity_and_seeds_roster() {
        let (mut session, g) = connected();
        let cmd = session.create_room("Alice", RoomType::Duo);
        assert_eq!(
            cmd,
            ClientMessage::CreateRoom {
                name: "Alice".into(),
                room_type: RoomType::Duo
            }
        );

        assert!(session.apply(g, room_created("5678", "p_1")));
        assert_eq!(session.room_code(), Some("5678"));
        assert_eq!(session.local_player_id(), Some("p_1"));
        assert!(session.is_host());
        assert_eq!(session.phase(), &Phase::Lobby);
        assert_eq!(session.room_type(), Some(RoomType::Duo));
        assert_eq!(session.roster().len(), 1);
        assert_eq!(session.roster()[0].display_name, "Alice");
    }

    #[test]
    fn joiner_adopts_id_from_player_joined_with_requested_code() {
        let (mut session, g) = connected();
        session.join_room("Bob", "1234");
        assert!(session.apply(
            g,
            player_joined(Some("p_2"), &[("p_1", "Alice"), ("p_2", "Bob")])
        ));

        assert_eq!(session.room_code(), Some("1234"));
        assert_eq!(session.local_player_id(), Some("p_2"));
        assert!(!session.is_host());
        assert_eq!(session.roster().len(), 2);
    }

    #[test]
    fn player_joined_does_not_overwrite_existing_identity() {
        let (mut session, g) = connected();
        session.create_room("Alice", RoomType::Duo);
        session.apply(g, room_created("5678", "p_1"));
        session.apply(
            g,
            player_joined(Some("p_2"), &[("p_1", "Alice"), ("p_2", "Bob")]),
        );

        assert_eq!(session.local_player_id(), Some("p_1"));
        assert!(session.is_host());
    }

    #[test]
    fn player_joined_without_join_request_keeps_room_and_id_absent_together() {
        let (mut session, g) = connected();
        session.apply(g, player_joined(Some("p_9"), &[("p_9", "Zed")]));
        assert!(session.room_code().is_none());
        assert!(session.local_player_id().is_none());
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn roster_is_replaced_not_accumulated() {
        let (mut session, g) = connected();
        session.apply(g, player_joined(None, &[("a", "A"), ("b", "B"), ("c", "C")]));
        session.apply(g, player_joined(None, &[("c", "C"), ("d", "D")]));

        let ids: Vec<_> = session.roster().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["c", "d"]);
    }

    #[test]
    fn roster_drops_duplicate_ids() {
        let (mut session, g) = connected();
        session.apply(g, player_joined(None, &[("a", "A"), ("a", "A again"), ("b", "B")]));
        let ids: Vec<_> = session.roster().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(session.roster()[0].display_name, "A");
    }

    #[test]
    fn player_left_removes_by_id() {
        let (mut session, g) = connected();
        session.apply(g, player_joined(None, &[("a", "A"), ("b", "B")]));
        assert!(session.apply(
            g,
            ServerMessage::PlayerLeft(PlayerLeftPayload {
                player_id: "a".into()
            })
        ));
        assert_eq!(session.roster().len(), 1);
        assert_eq!(session.roster()[0].id, "b");

        // Unknown id is a no-op.
        assert!(!session.apply(
            g,
            ServerMessage::PlayerLeft(PlayerLeftPayload {
                player_id: "zzz".into()
            })
        ));
    }

    #[test]
    fn consent_required_enters_consent_pending_then_grant_moves_to_upload() {
        let (mut session, g) = connected();
        assert!(session.apply(g, ServerMessage::ConsentRequired));
        assert!(session.consent_required());

        assert_eq!(session.grant_consent(), ClientMessage::GrantConsent {});
        assert!(!session.consent_required());
        assert!(session.consent_granted());
        assert_eq!(session.phase(), &Phase::Upload);
    }

    #[test]
    fn consent_required_is_ignored_once_granted() {
        let (mut session, g) = connected();
        session.grant_consent();
        assert!(!session.apply(g, ServerMessage::ConsentRequired));
        assert_eq!(session.phase(), &Phase::Upload);
    }

    #[test]
    fn consent_on_file_skips_consent_prompt() {
        let mut session = Session::new(true);
        let g = session.begin_connect();
        session.channel_opened(g);
        assert!(!session.apply(g, ServerMessage::ConsentRequired));
        assert_eq!(session.phase(), &Phase::Lobby);
    }

    #[test]
    fn room_ready_without_consent_asks_for_it() {
        let (mut session, _) = connected();
        assert!(session.room_ready().is_none());
        assert_eq!(session.phase(), &Phase::ConsentPending);
    }

    #[test]
    fn room_ready_with_consent_grants_and_moves_to_upload() {
        let mut session = Session::new(true);
        let g = session.begin_connect();
        session.channel_opened(g);
        assert_eq!(session.room_ready(), Some(ClientMessage::GrantConsent {}));
        assert_eq!(session.phase(), &Phase::Upload);
    }

    #[test]
    fn upload_photo_strips_prefix_and_waits() {
        let (mut session, _) = connected();
        session.grant_consent();
        let cmd = session.upload_photo("data:image/jpeg;base64,AAAA");
        assert_eq!(
            cmd,
            ClientMessage::UploadPhoto {
                photo: "AAAA".into()
            }
        );
        assert_eq!(session.phase(), &Phase::Waiting);
    }

    #[test]
    fn all_photos_in_sets_flag_without_leaving_waiting() {
        let (mut session, g) = connected();
        session.upload_photo("AAAA");
        assert!(session.apply(g, ServerMessage::AllPhotosIn));
        assert!(session.photos_ready());
        assert_eq!(session.phase(), &Phase::Waiting);
        assert!(!session.apply(g, ServerMessage::AllPhotosIn));
    }

    #[test]
    fn informational_events_change_nothing() {
        let (mut session, g) = connected();
        let before = session.clone();
        assert!(!session.apply(
            g,
            ServerMessage::ConsentGranted(PlayerNotice {
                player_id: Some("p_2".into())
            })
        ));
        assert!(!session.apply(g, ServerMessage::PhotoReceived(PlayerNotice::default())));
        assert_eq!(session, before);
    }

    #[test]
    fn analyzing_updates_overwrite_and_reveal_clears_everything() {
        let (mut session, g) = connected();
        session.upload_photo("data:image/jpeg;base64,AAAA");
        session.apply(g, analyzing("Analyzing faces...", 20.0));
        assert_eq!(session.analysis_progress().unwrap().percent, 20.0);
        session.apply(g, analyzing("Done!", 100.0));
        let progress = session.analysis_progress().unwrap();
        assert_eq!(progress.step, "Done!");
        assert_eq!(progress.percent, 100.0);

        session.apply(g, ServerMessage::Reveal(json!({ "percentage": 78 })));
        assert!(matches!(session.phase(), Phase::Revealed(_)));
        let result = session.result().unwrap();
        assert_eq!(result.kind, RevealKind::Duo);
        assert_eq!(result.payload["percentage"], 78);
        assert!(session.analysis_progress().is_none());
        assert!(session.countdown_remaining().is_none());
    }

    fn decoded(text: &str) -> ServerMessage {
        crate::codec::decode(text).unwrap().unwrap()
    }

    #[test]
    fn null_roster_still_adopts_joined_identity() {
        let (mut session, g) = connected();
        session.join_room("Bob", "5678");
        assert!(session.apply(
            g,
            decoded(r#"{"type":"player_joined","data":{"player_id":"p_2","players":null}}"#)
        ));
        assert_eq!(session.room_code(), Some("5678"));
        assert_eq!(session.local_player_id(), Some("p_2"));
        assert!(session.roster().is_empty());
    }

    #[test]
    fn null_progress_still_enters_analyzing() {
        let (mut session, g) = connected();
        session.upload_photo("data:image/jpeg;base64,AAAA");
        assert!(session.apply(
            g,
            decoded(r#"{"type":"analyzing","data":{"step":null,"progress":null}}"#)
        ));
        assert!(matches!(session.phase(), Phase::Analyzing(_)));
        assert_eq!(session.analysis_progress().unwrap().percent, 0.0);
    }

    #[test]
    fn countdown_is_stored_verbatim_and_last_write_wins() {
        let (mut session, g) = connected();
        session.apply(g, analyzing("Scoring", 90.0));
        session.apply(g, countdown(3));
        assert_eq!(session.countdown_remaining(), Some(3));
        assert!(session.analysis_progress().is_none());
        session.apply(g, countdown(2));
        assert_eq!(session.countdown_remaining(), Some(2));
    }

    #[test]
    fn group_reveal_clears_countdown() {
        let (mut session, g) = connected();
        session.apply(g, countdown(1));
        session.apply(g, ServerMessage::GroupReveal(json!({ "matrix": [[100]] })));
        assert!(session.countdown_remaining().is_none());
        assert_eq!(session.result().unwrap().kind, RevealKind::Group);
    }

    #[test]
    fn phase_never_moves_backwards_within_a_room() {
        let (mut session, g) = connected();
        session.apply(g, ServerMessage::Reveal(json!({ "percentage": 50 })));
        assert!(!session.apply(g, analyzing("late", 10.0)));
        assert!(!session.apply(g, countdown(3)));
        assert!(!session.apply(g, ServerMessage::ConsentRequired));
        assert!(session.result().is_some());
    }

    #[test]
    fn server_error_is_surfaced_without_changing_phase() {
        let (mut session, g) = connected();
        session.create_room("Alice", RoomType::Duo);
        session.apply(g, room_created("5678", "p_1"));
        session.apply(
            g,
            ServerMessage::Error(ErrorPayload {
                message: "Room not found".into(),
            }),
        );
        assert_eq!(session.last_error(), Some("Room not found"));
        assert_eq!(session.phase(), &Phase::Lobby);
        assert_eq!(session.room_code(), Some("5678"));
    }

    #[test]
    fn next_state_change_clears_last_error() {
        let (mut session, g) = connected();
        session.apply(
            g,
            ServerMessage::Error(ErrorPayload {
                message: "Upload failed for Bob".into(),
            }),
        );
        session.apply(g, analyzing("Analyzing faces...", 20.0));
        assert!(session.last_error().is_none());
    }

    #[test]
    fn reset_returns_to_idle_from_any_phase() {
        let (mut session, g) = connected();
        session.create_room("Alice", RoomType::Group);
        session.apply(g, room_created("5678", "p_1"));
        session.apply(g, player_joined(None, &[("p_1", "Alice"), ("p_2", "Bob")]));
        session.apply(g, countdown(2));

        session.reset();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(session.room_code().is_none());
        assert!(session.local_player_id().is_none());
        assert!(!session.is_host());
        assert!(session.roster().is_empty());
        assert_eq!(session.phase(), &Phase::Lobby);
        assert!(!session.photos_ready());
        assert!(session.is_idle());
    }

    #[test]
    fn stale_generation_is_ignored_after_reconnect() {
        let mut session = Session::default();
        let first = session.begin_connect();
        let second = session.begin_connect();
        assert!(!session.channel_opened(first));
        assert!(session.channel_opened(second));

        assert!(!session.channel_closed(first));
        assert!(!session.channel_failed(first));
        assert!(!session.apply(first, room_created("0000", "ghost")));
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert!(session.room_code().is_none());
    }

    #[test]
    fn events_after_reset_are_ignored() {
        let (mut session, g) = connected();
        session.reset();
        assert!(!session.apply(g, room_created("5678", "p_1")));
        assert!(!session.channel_closed(g));
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn channel_failure_resets_room_and_sets_error() {
        let (mut session, g) = connected();
        session.create_room("Alice", RoomType::Duo);
        session.apply(g, room_created("5678", "p_1"));
        assert!(session.channel_failed(g));
        assert_eq!(session.status(), ConnectionStatus::Error);
        assert_eq!(session.last_error(), Some(CONNECTION_ERROR_MESSAGE));
        assert!(session.room_code().is_none());
    }

    #[test]
    fn clean_close_keeps_revealed_result() {
        let (mut session, g) = connected();
        session.apply(g, ServerMessage::Reveal(json!({ "percentage": 61 })));
        assert!(session.channel_closed(g));
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(session.result().is_some());
    }

    #[test]
    fn begin_connect_starts_fresh_and_clears_error() {
        let (mut session, g) = connected();
        session.channel_failed(g);
        session.begin_connect();
        assert_eq!(session.status(), ConnectionStatus::Connecting);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn can_start_follows_room_type_minimum() {
        let (mut session, g) = connected();
        session.create_room("Alice", RoomType::Group);
        session.apply(g, room_created("5678", "p_1"));
        session.apply(g, player_joined(None, &[("p_1", "Alice"), ("p_2", "Bob")]));
        assert!(!session.can_start());
        session.apply(
            g,
            player_joined(None, &[("p_1", "Alice"), ("p_2", "Bob"), ("p_3", "Cy")]),
        );
        assert!(session.can_start());
    }
}
