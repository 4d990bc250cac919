pub mod clock;
pub mod ports;
pub mod punch;
pub mod reconciler;
pub mod report;
pub mod session;
pub mod store;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock, elapsed, format_hm, format_hms};
pub use ports::{ChangeNotifier, IntervalFilter, Persistence, Subscription};
pub use punch::PunchEngine;
pub use reconciler::{Applied, LinkState, Reconciler};
pub use report::{ReportBuilder, ReportRow, ReportWindow};
pub use session::{Session, SessionUpdate};
pub use store::{IntervalStore, UpsertOutcome};
pub use ticker::Ticker;
