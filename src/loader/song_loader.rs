// finds what to play in a song folder: one chart plus its audio stems
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::audio;

pub const MAX_STEMS: usize = 16;
// tried in order before falling back to any .mid in the folder
const CHART_NAMES: [&str; 2] = ["notes.chart", "notes.mid"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongFiles {
    pub dir: PathBuf,
    pub chart: PathBuf,
    pub stems: Vec<PathBuf>,
}

/// A song folder, or a chart file whose stems are given separately.
pub fn resolve(path: &Path, extra_stems: &[PathBuf]) -> anyhow::Result<SongFiles> {
    if path.is_dir() {
        let mut song = index_song_dir(path)?;
        song.stems.extend(extra_stems.iter().cloned());
        song.stems.truncate(MAX_STEMS);
        return Ok(song);
    }
    if !path.is_file() {
        anyhow::bail!("{} is neither a song folder nor a chart file", path.display());
    }
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(SongFiles {
        dir,
        chart: path.to_path_buf(),
        stems: extra_stems.iter().take(MAX_STEMS).cloned().collect(),
    })
}

pub fn index_song_dir(dir: &Path) -> anyhow::Result<SongFiles> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read song folder {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort(); // stable stem order between runs

    let chart = CHART_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
        .or_else(|| files.iter().find(|p| has_ext(p, &["mid", "midi"])).cloned())
        .with_context(|| format!("no notes.chart or .mid chart in {}", dir.display()))?;

    let mut stems = Vec::new();
    for path in &files {
        if audio::is_supported(path) {
            stems.push(path.clone());
        } else if has_ext(path, &["mp3", "flac"]) {
            log::warn!("skipping {} (codec not supported)", path.display());
        }
    }
    if stems.len() > MAX_STEMS {
        log::warn!("{} stems found, only the first {MAX_STEMS} are used", stems.len());
        stems.truncate(MAX_STEMS);
    }

    Ok(SongFiles { dir: dir.to_path_buf(), chart, stems })
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_chart_preferred_over_mid() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.mid");
        touch(dir.path(), "notes.chart");
        touch(dir.path(), "song.ogg");
        touch(dir.path(), "guitar.wav");
        touch(dir.path(), "drums.opus");
        touch(dir.path(), "intro.mp3");
        touch(dir.path(), "album.png");

        let song = index_song_dir(dir.path()).unwrap();
        assert_eq!(song.chart, dir.path().join("notes.chart"));
        assert_eq!(
            song.stems,
            vec![dir.path().join("drums.opus"), dir.path().join("guitar.wav"), dir.path().join("song.ogg")]
        );
    }

    #[test]
    fn test_any_mid_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Song Name.MID");
        let song = resolve(dir.path(), &[]).unwrap();
        assert_eq!(song.chart, dir.path().join("Song Name.MID"));
        assert!(song.stems.is_empty());
    }

    #[test]
    fn test_folder_without_chart() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "song.ogg");
        assert!(index_song_dir(dir.path()).is_err());
    }

    #[test]
    fn test_file_mode_uses_extra_stems() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.mid");
        let stems = vec![PathBuf::from("a.ogg"), PathBuf::from("b.ogg")];
        let song = resolve(&dir.path().join("notes.mid"), &stems).unwrap();
        assert_eq!(song.dir, dir.path());
        assert_eq!(song.stems, stems);
    }

    #[test]
    fn test_missing_path() {
        assert!(resolve(Path::new("/definitely/not/here"), &[]).is_err());
    }
}
