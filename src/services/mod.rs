//! Business rules: dues lifecycle, payment state machine, period activation
//! and document tree maintenance, plus the collaborators they call out to.

mod documents;
mod dues;
mod ledger;
mod payments;
mod periods;
mod uploader;

pub use documents::*;
pub use dues::*;
pub use ledger::*;
pub use payments::*;
pub use periods::*;
pub use uploader::*;

#[cfg(test)]
pub(crate) mod testing;
