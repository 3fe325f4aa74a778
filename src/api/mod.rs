pub mod anilist;
pub mod firestore;
pub mod gemini;
pub mod jimaku;
pub mod mal_news;
pub mod vndb;
pub mod youtube;
