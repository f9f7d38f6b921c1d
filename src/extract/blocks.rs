//! Delimiter and keyword heuristics for pulling commands and code out of text

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A fenced block: opening fence, optional language tag up to the first
    /// newline, then the body up to the next fence.
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(.*?)\n(.*?)```").expect("fenced block pattern is valid");

    /// An inline span between single backticks on one line.
    static ref INLINE_SPAN: Regex =
        Regex::new(r"`(.*?)`").expect("inline span pattern is valid");
}

/// Substrings that mark a candidate as an installation command
const INSTALL_MARKERS: [&str; 2] = ["pip", "apt-get"];

/// Tokens that mark a candidate as source code
const CODE_MARKERS: [&str; 4] = ["import", "def", "class", "print"];

/// Which heuristic to apply to the candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Shell commands that install dependencies
    Install,
    /// A single program body
    Code,
}

/// Every candidate block in `text`: fenced bodies first, then inline spans.
///
/// Inline spans are matched over the whole text, fences included, so a fenced
/// response also yields a few empty or partial inline candidates. The mode
/// filters discard those.
pub fn candidate_blocks(text: &str) -> Vec<&str> {
    let fenced = FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str());

    let inline = INLINE_SPAN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str());

    fenced.chain(inline).collect()
}

/// Extract candidate artifacts from a raw completion response.
///
/// An empty result means "no usable artifact", never an error.
pub fn extract(text: &str, mode: ExtractionMode) -> Vec<String> {
    let candidates = candidate_blocks(text);

    match mode {
        ExtractionMode::Install => candidates
            .into_iter()
            .filter(|block| INSTALL_MARKERS.iter().any(|marker| block.contains(marker)))
            .map(str::to_string)
            .collect(),
        ExtractionMode::Code => {
            // First longest wins on ties
            let mut longest: Option<&str> = None;
            for block in candidates
                .into_iter()
                .filter(|block| CODE_MARKERS.iter().any(|marker| block.contains(marker)))
            {
                if longest.map_or(true, |best| block.chars().count() > best.chars().count()) {
                    longest = Some(block);
                }
            }
            longest.map(|block| vec![block.to_string()]).unwrap_or_default()
        }
    }
}

/// Deduplicated installation commands for one batch.
///
/// Commands are trimmed and blank entries dropped before deduplication.
/// Iteration is sorted so install reports read the same run to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSet {
    commands: BTreeSet<String>,
}

impl InstallSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command, returning false if it was blank or already present
    pub fn insert(&mut self, command: &str) -> bool {
        let command = command.trim();
        if command.is_empty() {
            return false;
        }
        self.commands.insert(command.to_string())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.commands.contains(command.trim())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for InstallSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = InstallSet::new();
        for command in iter {
            set.insert(command.as_ref());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fenced(lang: &str, body: &str) -> String {
        format!("```{}\n{}```", lang, body)
    }

    #[test]
    fn test_fenced_bodies_come_before_inline_spans() {
        let text = format!(
            "Run `pip install rich` first.\n{}\nThen you're done.",
            fenced("python", "import rich\n")
        );
        let blocks = candidate_blocks(&text);
        assert_eq!(blocks[0], "import rich\n");
        assert!(blocks.contains(&"pip install rich"));
    }

    #[test]
    fn test_install_mode_keeps_every_match() {
        let text = "Use `pip install requests` and `pip install requests` then `apt-get install nmap`.";
        let installs = extract(text, ExtractionMode::Install);
        assert_eq!(
            installs,
            vec!["pip install requests", "pip install requests", "apt-get install nmap"]
        );
    }

    #[test]
    fn test_install_mode_without_markers_is_empty() {
        let text = format!("Nothing to install. {}", fenced("bash", "ls -la\n"));
        assert!(extract(&text, ExtractionMode::Install).is_empty());
    }

    #[test]
    fn test_code_mode_picks_longest_block() {
        let short = format!("def f():\n{}\n", "#".repeat(30));
        let long = format!("def g():\n{}\n", "#".repeat(110));
        assert_eq!(short.len(), 40);
        assert_eq!(long.len(), 120);

        let text = format!("{}\n\n{}", fenced("python", &short), fenced("python", &long));
        assert_eq!(extract(&text, ExtractionMode::Code), vec![long]);
    }

    #[test]
    fn test_code_mode_counts_characters_not_bytes() {
        let wide = format!("print('{}')", "é".repeat(20));
        let narrow = format!("print('{}')", "a".repeat(30));
        assert!(wide.len() > narrow.len());
        assert!(wide.chars().count() < narrow.chars().count());

        let text = format!("{}\n{}", fenced("", &wide), fenced("", &narrow));
        assert_eq!(extract(&text, ExtractionMode::Code), vec![narrow]);
    }

    #[test]
    fn test_code_mode_tie_keeps_first() {
        let text = format!("{}\n{}", fenced("", "print(1)\n"), fenced("", "print(2)\n"));
        assert_eq!(extract(&text, ExtractionMode::Code), vec!["print(1)\n"]);
    }

    #[test]
    fn test_code_mode_requires_keyword() {
        let text = fenced("text", "just some words\n");
        assert!(extract(&text, ExtractionMode::Code).is_empty());
    }

    #[test]
    fn test_prose_yields_nothing() {
        let text = "You should import the os module and print the listing.";
        assert!(candidate_blocks(text).is_empty());
        assert!(extract(text, ExtractionMode::Code).is_empty());
        assert!(extract(text, ExtractionMode::Install).is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = format!(
            "`pip install a`\n{}",
            fenced("python", "import a\nprint(a)\n")
        );
        for mode in [ExtractionMode::Install, ExtractionMode::Code] {
            assert_eq!(extract(&text, mode), extract(&text, mode));
        }
    }

    #[test]
    fn test_install_set_deduplicates() {
        let set: InstallSet = ["pip install a", "pip install a", "apt-get install b"]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("pip install a"));
        assert!(set.contains("apt-get install b"));
    }

    #[test]
    fn test_install_set_trims_and_skips_blank() {
        let mut set = InstallSet::new();
        assert!(set.insert("pip install a\n"));
        assert!(!set.insert("  pip install a  "));
        assert!(!set.insert("   "));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["pip install a"]);
    }
}
