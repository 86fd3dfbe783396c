//! Headline files: `<dir>/<category>.txt`, one headline per line.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::error::DeskError;
use crate::domain::sentiment::NEUTRAL_HEADLINES;
use crate::ports::news_port::NewsPort;

pub struct FileNewsAdapter {
    base_path: PathBuf,
}

impl FileNewsAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}

fn neutral() -> Vec<String> {
    NEUTRAL_HEADLINES.iter().map(|h| h.to_string()).collect()
}

impl NewsPort for FileNewsAdapter {
    /// Blank lines and `#` comments are ignored. A missing or empty file
    /// yields the neutral headlines.
    fn fetch_headlines(&self, category: &str) -> Result<Vec<String>, DeskError> {
        let path = self.base_path.join(format!("{category}.txt"));
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(neutral()),
            Err(e) => return Err(DeskError::Io(e)),
        };

        let headlines: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        if headlines.is_empty() {
            Ok(neutral())
        } else {
            Ok(headlines)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_headlines_skipping_blanks_and_comments() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("business.txt"),
            "# scraped 2024-05-01\nRecord growth at Equinor\n\n  Oil prices drop  \n",
        )
        .unwrap();
        let adapter = FileNewsAdapter::new(dir.path().to_path_buf());
        assert_eq!(
            adapter.fetch_headlines("business").unwrap(),
            vec!["Record growth at Equinor", "Oil prices drop"]
        );
    }

    #[test]
    fn missing_or_empty_category_falls_back_to_neutral() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("market.txt"), "\n# nothing today\n").unwrap();
        let adapter = FileNewsAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.fetch_headlines("market").unwrap(), neutral());
        assert_eq!(adapter.fetch_headlines("sports").unwrap().len(), 2);
    }

    #[test]
    fn invalid_utf8_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("business.txt"), [0xff, 0xfe, b'\n']).unwrap();
        let adapter = FileNewsAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_headlines("business"),
            Err(DeskError::Io(_))
        ));
    }
}
