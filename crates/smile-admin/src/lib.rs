//! smile-admin: the admin boundary of the City Smile site.
//!
//! A passphrase gate in front of the portfolio manager, and the editor
//! mutation API that turns add/edit/delete/upload actions into
//! full-sequence saves against the sync reconciler.

pub mod editor;
pub mod gate;

pub use editor::*;
pub use gate::*;
