use crate::error::{AbsesError, Result};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/**
Lifecycle of the model and of its composite modules.

A model is `New` while it is being constructed, `Init` once its subsystems
are in place, `Ready` after setup and `Complete` after the end of a run.
States only ever move forward.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    New = 0,
    Init = 1,
    Ready = 2,
    Complete = 3,
}

const ALL: [State; 4] = [State::New, State::Init, State::Ready, State::Complete];

impl State {
    pub fn from_code(code: u8) -> Result<State> {
        ALL.get(code as usize).copied().ok_or_else(|| {
            AbsesError::State(format!(
                "Invalid state {}, valid: {{0: 'new', 1: 'init', 2: 'ready', 3: 'complete'}}!",
                code
            ))
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            State::New => "new",
            State::Init => "init",
            State::Ready => "ready",
            State::Complete => "complete",
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::New
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct States {
    state: State,
}

impl States {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn set_state(&mut self, code: u8) -> Result<()> {
        let new = State::from_code(code)?;
        if new == self.state {
            return Err(AbsesError::State(format!(
                "Setting state repeat: {}!",
                self.state
            )));
        }
        if new < self.state {
            return Err(AbsesError::State(format!(
                "State cannot retreat from {} to {}!",
                self.state, new
            )));
        }
        self.state = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_only_move_forward() {
        let mut s = States::default();
        assert_eq!(s.state(), State::New);
        s.set_state(1).unwrap();
        assert_eq!(s.state().to_string(), "init");
        let repeat = s.set_state(1).unwrap_err();
        assert_eq!(repeat.to_string(), "Setting state repeat: init!");
        s.set_state(3).unwrap();
        let retreat = s.set_state(2).unwrap_err();
        assert_eq!(
            retreat.to_string(),
            "State cannot retreat from complete to ready!"
        );
        assert!(s.set_state(4).unwrap_err().to_string().starts_with("Invalid state 4"));
    }
}
