use std::fmt;

use shakmaty::uci::UciMove;

/// Complete, order-preserved list of moves applied so far in a game, in the
/// wire notation the server uses (`e2e4`, `e7e8q`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MoveLedger(Vec<UciMove>);

impl MoveLedger {
    pub fn push(&mut self, uci: UciMove) {
        self.0.push(uci);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MoveLedger {
    /// Space-separated wire form, as accepted after `position startpos moves`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, uci) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{uci}")?;
        }
        Ok(())
    }
}
