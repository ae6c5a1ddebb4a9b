// song.ini next to the chart: metadata plus the two values gameplay reads,
// the per-song offset (ms) and the hammer-on spacing threshold (ticks)
use std::path::Path;

use anyhow::Context;

use crate::chart::DEFAULT_HOPO_FREQUENCY;

pub const SONG_INI: &str = "song.ini";

#[derive(Clone, Debug, PartialEq)]
pub struct SongIni {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub year: Option<String>,
    pub loading_phrase: Option<String>,
    pub offset_ms: f64,
    pub hopo_frequency: u64,
}

impl Default for SongIni {
    fn default() -> Self {
        Self {
            name: None,
            artist: None,
            year: None,
            loading_phrase: None,
            offset_ms: 0.0,
            hopo_frequency: DEFAULT_HOPO_FREQUENCY,
        }
    }
}

impl SongIni {
    pub fn parse(text: &str) -> Self {
        let mut ini = SongIni::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(['[', ';', '#']) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => ini.name = Some(value.to_string()),
                "artist" => ini.artist = Some(value.to_string()),
                "year" => ini.year = Some(value.to_string()),
                "loading_phrase" => ini.loading_phrase = Some(value.to_string()),
                "offset" => ini.offset_ms = value.parse().unwrap_or(0.0),
                "hopo_frequency" => {
                    ini.hopo_frequency = value
                        .parse::<i64>()
                        .ok()
                        .filter(|&v| v > 0)
                        .map_or(DEFAULT_HOPO_FREQUENCY, |v| v as u64);
                }
                _ => {}
            }
        }
        ini
    }

    pub fn title(&self) -> String {
        match (&self.artist, &self.name) {
            (Some(artist), Some(name)) => format!("{artist} - {name}"),
            (None, Some(name)) => name.clone(),
            _ => String::new(),
        }
    }
}

pub fn load_song_ini(song_dir: &Path) -> SongIni {
    match std::fs::read_to_string(song_dir.join(SONG_INI)) {
        Ok(text) => SongIni::parse(&text),
        Err(e) => {
            log::debug!("no song.ini in {} ({e}), using defaults", song_dir.display());
            SongIni::default()
        }
    }
}

/// Rewrites the `offset=` line, keeping every other line as it was.
pub fn save_offset(song_dir: &Path, offset_ms: f64) -> anyhow::Result<()> {
    let path = song_dir.join(SONG_INI);
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };

    let new_line = format!("offset={offset_ms:.1}");
    let mut replaced = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let is_offset = line
                .split_once('=')
                .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case("offset"));
            if is_offset && !replaced {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(new_line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    std::fs::write(&path, out).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let ini = SongIni::parse("[song]\nname = Song\nartist=Band\nOffset = -25.5\nhopo_frequency = 85\n; comment\n");
        assert_eq!(ini.title(), "Band - Song");
        assert_eq!(ini.offset_ms, -25.5);
        assert_eq!(ini.hopo_frequency, 85);
    }

    #[test]
    fn test_hopo_frequency_defaults() {
        assert_eq!(SongIni::parse("").hopo_frequency, 170);
        assert_eq!(SongIni::parse("hopo_frequency = 0").hopo_frequency, 170);
        assert_eq!(SongIni::parse("hopo_frequency = abc").hopo_frequency, 170);
    }

    #[test]
    fn test_save_offset_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SONG_INI), "[song]\nname = Song\noffset = 5\ndelay = 0\n").unwrap();
        save_offset(dir.path(), -30.0).unwrap();
        let text = std::fs::read_to_string(dir.path().join(SONG_INI)).unwrap();
        assert_eq!(text, "[song]\nname = Song\noffset=-30.0\ndelay = 0\n");
        assert_eq!(load_song_ini(dir.path()).offset_ms, -30.0);
    }

    #[test]
    fn test_save_offset_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        save_offset(dir.path(), 12.0).unwrap();
        assert_eq!(load_song_ini(dir.path()).offset_ms, 12.0);
    }
}
