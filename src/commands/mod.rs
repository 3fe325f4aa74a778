// Slash and prefix commands
pub mod afk;
pub mod config;
pub mod export;
pub mod help;
pub mod immersion;
pub mod leaderboard;
pub mod log;
pub mod novel;
pub mod prompt;
pub mod react;
pub mod stat;
pub mod subs;

use crate::{Data, Error};

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        immersion::immersion(),
        log::log(),
        stat::stat(),
        leaderboard::leaderboard(),
        export::export(),
        afk::afk(),
        react::react(),
        subs::subs(),
        novel::novel(),
        prompt::prompt(),
        config::config(),
        help::help(),
    ]
}
