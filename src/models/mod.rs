pub mod user;
pub mod group;
pub mod pokerboard;
pub mod verification;
pub mod invitation;

pub use user::{User, UserSummary};
pub use group::{Group, GroupMember};
pub use pokerboard::{Pokerboard, Role, UserPokerboard};
pub use verification::{EmailVerification, InviteTarget, Purpose};
pub use invitation::{Decision, GroupInvitation, InvitationStatus, PokerboardInvitation};
