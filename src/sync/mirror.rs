use crate::state::{
    events::{EventEnvelope, GameEvent},
    game::Game,
    reducer::{self, ApplyError},
};

/// What [`GameMirror::receive`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// The envelope was the next version and is now part of the mirror.
    Applied,
    /// Already reflected by the mirror; ignored.
    Duplicate,
    /// Versions are missing before this one. The mirror stopped applying
    /// events and needs a snapshot.
    Gap { expected: u64, got: u64 },
    /// The envelope belongs to another game.
    Foreign,
}

/// Client-side copy of a game, kept in step with the server by applying its
/// event envelopes in version order.
///
/// Besides the confirmed state, the mirror can hold an optimistic view with
/// local predictions applied on top. Any confirmed change drops the
/// predictions: the server's outcome always wins.
#[derive(Debug, Clone)]
pub struct GameMirror {
    confirmed: Game,
    optimistic: Option<Game>,
    stale: bool,
}

impl GameMirror {
    /// Mirror starting from a server snapshot.
    pub fn new(snapshot: Game) -> Self {
        Self {
            confirmed: snapshot,
            optimistic: None,
            stale: false,
        }
    }

    /// Last state confirmed by the server.
    pub fn game(&self) -> &Game {
        &self.confirmed
    }

    /// Confirmed state with pending predictions applied.
    pub fn view(&self) -> &Game {
        self.optimistic.as_ref().unwrap_or(&self.confirmed)
    }

    /// Whether the mirror missed events and waits for a snapshot.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Apply `envelope` when it is the next version of this game.
    ///
    /// An envelope the reducer refuses leaves the confirmed state untouched
    /// and marks the mirror stale.
    pub fn receive(&mut self, envelope: &EventEnvelope) -> Result<Receipt, ApplyError> {
        if envelope.game_id != self.confirmed.id {
            return Ok(Receipt::Foreign);
        }
        let expected = self.confirmed.version + 1;
        if envelope.version < expected {
            return Ok(Receipt::Duplicate);
        }
        if self.stale || envelope.version > expected {
            self.stale = true;
            return Ok(Receipt::Gap {
                expected,
                got: envelope.version,
            });
        }

        let mut next = self.confirmed.clone();
        if let Err(err) = reducer::apply(&mut next, &envelope.event) {
            self.stale = true;
            return Err(err);
        }
        self.confirmed = next;
        self.optimistic = None;
        Ok(Receipt::Applied)
    }

    /// Replace everything with an authoritative snapshot, dropping local
    /// predictions.
    pub fn resync(&mut self, snapshot: Game) {
        self.confirmed = snapshot;
        self.optimistic = None;
        self.stale = false;
    }

    /// Apply a locally predicted event to the optimistic view only.
    pub fn predict(&mut self, event: &GameEvent) -> Result<(), ApplyError> {
        let mut view = self.view().clone();
        reducer::apply(&mut view, event)?;
        self.optimistic = Some(view);
        Ok(())
    }
}
