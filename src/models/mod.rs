pub mod change;
pub mod interval;
pub mod member;
pub mod presence;

pub use change::{ChangeEvent, ChangeKind};
pub use interval::{Interval, IntervalId};
pub use member::{Member, MemberId};
pub use presence::PresenceState;
