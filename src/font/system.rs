//! Locating an installed font when none is configured.

use std::path::{Path, PathBuf};

/// Font files tried in order when no font is configured.
pub const DEFAULT_FONT_NAMES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "Roboto-Regular.ttf",
    "Ubuntu-R.ttf",
    "Arial.ttf",
    "arial.ttf",
    "Helvetica.ttc",
    "SFNS.ttf",
    "segoeui.ttf",
];

/// Deepest directory level searched below each font root.
const MAX_DEPTH: usize = 4;

/// Font directories for this platform: the user font directory first,
/// then system locations.
pub fn font_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = dirs::font_dir().into_iter().collect();
    if let Some(data) = dirs::data_dir() {
        roots.push(data.join("fonts"));
    }
    roots.extend(
        [
            "/usr/share/fonts",
            "/usr/local/share/fonts",
            "/System/Library/Fonts",
            "/Library/Fonts",
            "C:\\Windows\\Fonts",
        ]
        .iter()
        .map(PathBuf::from),
    );
    roots
}

/// First file named in `names` found under any of `roots`.
///
/// Names are tried in priority order, so an earlier name in a later root
/// beats a later name in the first root.
pub fn find_font(roots: &[PathBuf], names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .find_map(|name| roots.iter().find_map(|root| search_dir(root, name, MAX_DEPTH)))
}

/// Look for an installed default font.
pub fn find_system_font() -> Option<PathBuf> {
    find_font(&font_dirs(), DEFAULT_FONT_NAMES)
}

fn search_dir(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| search_dir(sub, name, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_nested_font() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("truetype").join("dejavu");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("DejaVuSans.ttf"), b"ttf").unwrap();

        let found = find_font(&[dir.path().to_path_buf()], DEFAULT_FONT_NAMES);
        assert_eq!(found, Some(nested.join("DejaVuSans.ttf")));
    }

    #[test]
    fn test_name_priority_beats_root_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("b.ttf"), b"").unwrap();
        std::fs::write(second.path().join("a.ttf"), b"").unwrap();

        let roots = [first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_font(&roots, &["a.ttf", "b.ttf"]),
            Some(second.path().join("a.ttf"))
        );
    }

    #[test]
    fn test_missing_roots_and_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("1/2/3/4/5/6");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("deep.ttf"), b"").unwrap();

        let roots = [dir.path().join("absent"), dir.path().to_path_buf()];
        assert_eq!(find_font(&roots, &["deep.ttf"]), None);
    }
}
