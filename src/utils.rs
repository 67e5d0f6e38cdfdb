use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns at most `max_chars` characters of `text` on a single line, for log output
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    if flat.chars().count() <= max_chars {
        return flat.trim_end().to_string();
    }

    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Finds all `.json` files under a directory recursively, sorted by path
pub fn find_json_files(dir_path: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_json_files(dir_path.as_ref(), &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        } else if path.is_dir() {
            collect_json_files(&path, files)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_preview_short_text() {
        assert_eq!(preview("Issue: Low oil\n", 50), "Issue: Low oil");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "Issue: Pump überhitzt\nCauses: blocked filter";
        let cut = preview(text, 20);
        assert_eq!(cut, "Issue: Pump überhitz...");
    }

    #[test]
    fn test_find_json_files() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        File::create(dir.path().join("b.json"))?;
        File::create(dir.path().join("sub").join("a.json"))?;
        File::create(dir.path().join("readme.md"))?;

        let files = find_json_files(dir.path())?;
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some_and(|e| e == "json")));
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }
}
