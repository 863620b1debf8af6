pub mod trainable;
pub mod history;
pub mod member;
pub mod selection;
pub mod hall_of_fame;
pub mod cluster;
pub mod progress;

pub use trainable::Trainable;
pub use history::{HyperparamsUpdate, UpdateHistory};
pub use member::{Member, MemberState, Population};
pub use selection::{ExploitRecord, RankedMember, Selector, exploit_pair};
pub use hall_of_fame::{HallOfFame, EliteSnapshot};
pub use cluster::{Cluster, ProgressCallback, until_step};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressMessage, SilentProgressCallback};
