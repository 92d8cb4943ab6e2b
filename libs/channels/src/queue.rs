//! Receive-side readiness queue
//!
//! The receiver's listener thread pushes one token per item that has
//! arrived; `recv` pops one and `peek` looks at the front. Ring-backed
//! channels push bare markers (the data stays in the ring slot), stream
//! backed channels carry the decoded frame in the token itself.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// The next ring slot is filled
    Slot,
    /// A whole item read off a stream
    Frame(Bytes),
}

/// Why a wait on the queue ended without a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The owning endpoint was joined
    Joined,
    /// No producer is left and the queue is drained
    Closed,
    TimedOut,
}

#[derive(Debug, Default)]
struct State {
    tokens: VecDeque<Token>,
    closed: bool,
    joined: bool,
}

#[derive(Debug, Default)]
pub struct ReadinessQueue {
    state: Mutex<State>,
    not_empty: Condvar,
}

impl ReadinessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token, returning true if the queue was empty before
    pub fn push(&self, token: Token) -> bool {
        let mut state = self.state.lock();
        let was_empty = state.tokens.is_empty();
        state.tokens.push_back(token);
        drop(state);
        self.not_empty.notify_all();
        was_empty
    }

    pub fn len(&self) -> usize {
        self.state.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tokens.is_empty()
    }

    /// A token is waiting or the queue is closed and drained; either way a
    /// pop returns without blocking
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock();
        !state.tokens.is_empty() || state.closed
    }

    /// Producer side finished; waiters drain what is left, then fail
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Consumer side finished; waiters fail immediately
    pub fn mark_joined(&self) {
        self.state.lock().joined = true;
        self.not_empty.notify_all();
    }

    pub fn pop(&self, deadline: Option<Instant>) -> Result<Token, WaitError> {
        self.wait_front(deadline, |tokens| tokens.pop_front())
    }

    pub fn peek(&self, deadline: Option<Instant>) -> Result<Token, WaitError> {
        self.wait_front(deadline, |tokens| tokens.front().cloned())
    }

    fn wait_front<F>(&self, deadline: Option<Instant>, mut take: F) -> Result<Token, WaitError>
    where
        F: FnMut(&mut VecDeque<Token>) -> Option<Token>,
    {
        let mut state = self.state.lock();
        loop {
            if state.joined {
                return Err(WaitError::Joined);
            }
            if let Some(token) = take(&mut state.tokens) {
                return Ok(token);
            }
            if state.closed {
                return Err(WaitError::Closed);
            }
            match deadline {
                None => self.not_empty.wait(&mut state),
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                        return take(&mut state.tokens).ok_or(WaitError::TimedOut);
                    }
                }
            }
        }
    }
}
