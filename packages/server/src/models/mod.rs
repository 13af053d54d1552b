pub mod director;
pub mod document;
pub mod leaderboard;
pub mod session;
pub mod shared;
