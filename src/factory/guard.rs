//! Base-chain cycle detection.

/// Names currently being resolved along one base chain, outermost first.
///
/// Field resolution starts a fresh path ([`CircularGuard::suspend`]): a field
/// may point back at a type whose base is still resolving, a base may not.
#[derive(Debug, Default)]
pub(super) struct CircularGuard {
    path: Vec<String>,
}

impl CircularGuard {
    pub fn contains(&self, name: &str) -> bool {
        self.path.iter().any(|entry| entry == name)
    }

    pub fn enter(&mut self, name: &str) {
        self.path.push(name.to_string());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// The current path closed by the name that was about to be re-entered.
    pub fn chain_through(&self, name: &str) -> Vec<String> {
        let mut chain = self.path.clone();
        chain.push(name.to_string());
        chain
    }

    pub fn suspend(&mut self) -> CircularGuard {
        std::mem::take(self)
    }

    pub fn restore(&mut self, saved: CircularGuard) {
        *self = saved;
    }
}
