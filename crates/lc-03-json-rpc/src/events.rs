//! Channel name → event signature.

use crate::abi::{AbiError, EventSignature};
use std::collections::HashMap;

/// Events of the bundled contracts.
const BUILTIN_EVENTS: &[&str] = &[
    "RaffleEnter(address indexed player)",
    "RequestedRaffleWinner(uint256 indexed requestId)",
    "WinnerPicked(address indexed winner, uint256 indexed requestId)",
    "ValueStored(address indexed sender, uint256 value)",
];

/// Known events, keyed by channel (event name).
#[derive(Debug, Clone, Default)]
pub struct EventBook {
    events: HashMap<String, EventSignature>,
}

impl EventBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Book with the Raffle and SimpleStorage events.
    pub fn with_builtin() -> Self {
        let mut book = Self::new();
        for declaration in BUILTIN_EVENTS {
            if let Ok(signature) = EventSignature::parse(declaration) {
                book.insert(signature);
            }
        }
        book
    }

    /// Register an event declaration. The channel is the event name.
    pub fn register(&mut self, declaration: &str) -> Result<&EventSignature, AbiError> {
        let signature = EventSignature::parse(declaration)?;
        let name = signature.name.clone();
        self.insert(signature);
        self.events
            .get(&name)
            .ok_or(AbiError::InvalidSignature(name))
    }

    fn insert(&mut self, signature: EventSignature) {
        self.events.insert(signature.name.clone(), signature);
    }

    pub fn get(&self, channel: &str) -> Option<&EventSignature> {
        self.events.get(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.keys().cloned().collect();
        names.sort();
        names
    }
}
