//! Advance triggers.
//!
//! The sequencer arms exactly one trigger for the current entry: a timer for
//! still images, or a renderer signal for videos. Every arm hands out a fresh
//! [`PlaybackTicket`], and a firing is only honoured when it matches the
//! trigger that is armed right now.

use tokio::time::Instant;

use crate::events::PlaybackTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fires once `deadline` has passed.
    Timer { deadline: Instant },
    /// Fires when the renderer reports the end (or failure) of `ticket`.
    Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTrigger {
    pub ticket: PlaybackTicket,
    /// Playlist index the trigger was armed for.
    pub index: usize,
    pub trigger: Trigger,
}

#[derive(Debug, Default)]
pub struct TriggerSlot {
    armed: Option<ArmedTrigger>,
    issued: u64,
}

impl TriggerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_timer(&mut self, index: usize, deadline: Instant) -> PlaybackTicket {
        self.arm(index, Trigger::Timer { deadline })
    }

    pub fn arm_signal(&mut self, index: usize) -> PlaybackTicket {
        self.arm(index, Trigger::Signal)
    }

    /// Drop whatever is armed. Its ticket is never honoured again.
    pub fn disarm(&mut self) -> Option<ArmedTrigger> {
        self.armed.take()
    }

    pub fn armed(&self) -> Option<&ArmedTrigger> {
        self.armed.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.armed {
            Some(ArmedTrigger {
                trigger: Trigger::Timer { deadline },
                ..
            }) => Some(deadline),
            _ => None,
        }
    }

    /// Consume the armed timer if it is due at `now`.
    pub fn take_elapsed(&mut self, now: Instant) -> Option<ArmedTrigger> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.armed.take(),
            _ => None,
        }
    }

    /// Consume the armed signal trigger if `ticket` is the one it waits for.
    pub fn take_signal(&mut self, ticket: PlaybackTicket) -> Option<ArmedTrigger> {
        match self.armed {
            Some(armed) if armed.trigger == Trigger::Signal && armed.ticket == ticket => {
                self.armed.take()
            }
            _ => None,
        }
    }

    fn arm(&mut self, index: usize, trigger: Trigger) -> PlaybackTicket {
        self.disarm();
        self.issued += 1;
        let ticket = PlaybackTicket::new(self.issued);
        self.armed = Some(ArmedTrigger {
            ticket,
            index,
            trigger,
        });
        ticket
    }
}
