//! Per-connection state machine.

/// `PENDING -> (FAILED | OPENED) -> ACTIVE <-> IDLE -> CLOSED`.
///
/// PENDING is not represented as a `ConnectionState` of a physical
/// connection (there may be several pending dials for one key, tracked as a
/// count in the pool); this enum models the state of one *realized*
/// connection once a dial has produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Opened,
    Active,
    Idle,
    Closed,
}

/// A single connection's lifecycle, enforcing that transitions are a
/// suffix of `Opened, (Active|Idle)*, Closed`.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal connection state transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl ConnectionLifecycle {
    pub fn opened() -> Self {
        Self {
            state: ConnectionState::Opened,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn mark_active(&mut self) -> Result<bool, IllegalTransition> {
        let was_idle = self.state == ConnectionState::Idle;
        match self.state {
            ConnectionState::Opened | ConnectionState::Idle => {
                self.state = ConnectionState::Active;
                Ok(was_idle)
            }
            // HTTP/2 connections may receive another request while already
            // Active (multiplexing); this is a no-op transition.
            ConnectionState::Active => Ok(false),
            ConnectionState::Closed => Err(IllegalTransition {
                from: self.state,
                to: ConnectionState::Active,
            }),
        }
    }

    pub fn mark_idle(&mut self) -> Result<(), IllegalTransition> {
        match self.state {
            ConnectionState::Active => {
                self.state = ConnectionState::Idle;
                Ok(())
            }
            ConnectionState::Closed => Err(IllegalTransition {
                from: self.state,
                to: ConnectionState::Idle,
            }),
            _ => Ok(()),
        }
    }

    pub fn mark_closed(&mut self) -> bool {
        let was_idle = self.state == ConnectionState::Idle;
        self.state = ConnectionState::Closed;
        was_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_transition_out_of_closed() {
        let mut lifecycle = ConnectionLifecycle::opened();
        lifecycle.mark_closed();
        assert!(lifecycle.mark_active().is_err());
    }

    #[test]
    fn active_then_idle_then_active_reports_was_idle() {
        let mut lifecycle = ConnectionLifecycle::opened();
        assert_eq!(lifecycle.mark_active().unwrap(), false);
        lifecycle.mark_idle().unwrap();
        assert_eq!(lifecycle.mark_active().unwrap(), true);
    }
}
