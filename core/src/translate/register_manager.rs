//! Allocation discipline over the temporary and saved register classes.

use std::collections::HashMap;

use thiserror::Error;

use crate::isa::registers::{Register, SAVED, TEMPORARIES};

/// A register was taken while already occupied, or freed while unoccupied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// No free register remains in the requested class.
    #[error("no free register available")]
    Exhausted,
    /// Attempted to take a register that is already bound to a label.
    #[error("register {0} is already occupied")]
    AlreadyOccupied(Register),
    /// Attempted to free a register with no bound label.
    #[error("register {0} is not occupied")]
    NotOccupied(Register),
}

/// Tracks which temporary and saved registers are in use, bidirectionally:
/// `register -> label` and `label -> register`, both O(1).
#[derive(Debug, Default)]
pub struct RegisterManager {
    occupied: HashMap<Register, String>,
    by_label: HashMap<String, Register>,
}

impl RegisterManager {
    /// Create a manager with every temporary and saved register free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the first free temporary register to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::Exhausted`] if all six temporaries are taken.
    pub fn take_temporary(&mut self, label: &str) -> Result<Register, RegisterError> {
        self.take_from(&TEMPORARIES, label)
    }

    /// Bind the first free saved register to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::Exhausted`] if all twelve saved registers are
    /// taken.
    pub fn take_saved(&mut self, label: &str) -> Result<Register, RegisterError> {
        self.take_from(&SAVED, label)
    }

    fn take_from(&mut self, class: &[Register], label: &str) -> Result<Register, RegisterError> {
        let reg = class
            .iter()
            .copied()
            .find(|r| !self.occupied.contains_key(r))
            .ok_or(RegisterError::Exhausted)?;
        self.occupied.insert(reg, label.to_string());
        self.by_label.insert(label.to_string(), reg);
        Ok(reg)
    }

    /// Explicitly bind a specific register to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::AlreadyOccupied`] if `reg` is already bound.
    pub fn take_specific(&mut self, reg: Register, label: &str) -> Result<(), RegisterError> {
        if self.occupied.contains_key(&reg) {
            return Err(RegisterError::AlreadyOccupied(reg));
        }
        self.occupied.insert(reg, label.to_string());
        self.by_label.insert(label.to_string(), reg);
        Ok(())
    }

    /// Release the register bound to `reg`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NotOccupied`] if `reg` has no bound label.
    pub fn free(&mut self, reg: Register) -> Result<(), RegisterError> {
        let label = self.occupied.remove(&reg).ok_or(RegisterError::NotOccupied(reg))?;
        self.by_label.remove(&label);
        Ok(())
    }

    /// Release whichever register is bound to `label`, if any.
    pub fn free_label(&mut self, label: &str) {
        if let Some(reg) = self.by_label.remove(label) {
            self.occupied.remove(&reg);
        }
    }

    /// The register currently bound to `label`, if any.
    #[must_use]
    pub fn register_of(&self, label: &str) -> Option<Register> {
        self.by_label.get(label).copied()
    }

    /// `true` if `reg` is currently occupied.
    #[must_use]
    pub fn is_occupied(&self, reg: Register) -> bool {
        self.occupied.contains_key(&reg)
    }

    /// `true` if every temporary register is free. Checked after translating
    /// each top-level statement to enforce register discipline.
    #[must_use]
    pub fn temporaries_are_free(&self) -> bool {
        TEMPORARIES.iter().all(|r| !self.occupied.contains_key(r))
    }

    /// The first free temporary register, without taking it.
    #[must_use]
    pub fn peek_free_temporary(&self) -> Option<Register> {
        TEMPORARIES.iter().copied().find(|r| !self.occupied.contains_key(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_temporaries_in_order() {
        let mut rm = RegisterManager::new();
        assert_eq!(rm.take_temporary("a").unwrap(), Register::T1);
        assert_eq!(rm.take_temporary("b").unwrap(), Register::T2);
    }

    #[test]
    fn freeing_an_unoccupied_register_errors() {
        let mut rm = RegisterManager::new();
        assert_eq!(rm.free(Register::T1), Err(RegisterError::NotOccupied(Register::T1)));
    }

    #[test]
    fn exhausting_temporaries_errors() {
        let mut rm = RegisterManager::new();
        for i in 0..6 {
            rm.take_temporary(&format!("x{i}")).unwrap();
        }
        assert_eq!(rm.take_temporary("overflow"), Err(RegisterError::Exhausted));
    }

    #[test]
    fn free_then_retake_round_trips() {
        let mut rm = RegisterManager::new();
        let r = rm.take_temporary("a").unwrap();
        rm.free(r).unwrap();
        assert!(rm.temporaries_are_free());
    }
}
