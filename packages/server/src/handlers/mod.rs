pub mod director;
pub mod documents;
pub mod files;
pub mod leaderboard;
pub mod session;
