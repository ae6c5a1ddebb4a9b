pub mod song_loader;
