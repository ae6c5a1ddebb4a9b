pub mod settings;
pub mod song_ini;
