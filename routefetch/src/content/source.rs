//! Installable content descriptors.

use std::fmt;

/// How a source's content is brought onto local storage.
///
/// Chosen from the URL suffix: `.git` clones a repository straight into the
/// destination, `.zip` downloads an archive that is extracted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Clone a version-control repository into the destination.
    Repository,
    /// Download an archive into the destination, then extract it.
    Archive,
}

impl FetchStrategy {
    /// Derive the strategy from a source URL.
    ///
    /// The suffix match ignores ASCII case and any trailing `/`. Returns `None`
    /// for URLs with neither suffix.
    ///
    /// # Examples
    ///
    /// ```
    /// use routefetch::content::FetchStrategy;
    ///
    /// assert_eq!(
    ///     FetchStrategy::from_url("https://github.com/openrails/demo.git"),
    ///     Some(FetchStrategy::Repository)
    /// );
    /// assert_eq!(
    ///     FetchStrategy::from_url("https://example.com/demo.ZIP"),
    ///     Some(FetchStrategy::Archive)
    /// );
    /// assert_eq!(FetchStrategy::from_url("https://example.com/demo.7z"), None);
    /// ```
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim().trim_end_matches('/').to_ascii_lowercase();
        if url.ends_with(".git") {
            Some(Self::Repository)
        } else if url.ends_with(".zip") {
            Some(Self::Archive)
        } else {
            None
        }
    }

    /// File extension used for the transient archive, if any.
    pub fn archive_extension(&self) -> Option<&'static str> {
        match self {
            Self::Repository => None,
            Self::Archive => Some("zip"),
        }
    }

    /// Whether an extraction stage follows the fetch.
    pub fn needs_extraction(&self) -> bool {
        matches!(self, Self::Archive)
    }

    /// Short description shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Repository => "GitHub format",
            Self::Archive => "zip format",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository => write!(f, "repository"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// A remotely fetchable content package.
///
/// Built once when the catalog is loaded and never mutated afterwards; share
/// it behind an `Arc` rather than cloning it into every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSource {
    name: String,
    url: String,
    strategy: Option<FetchStrategy>,
    install_size: Option<u64>,
    download_size: Option<u64>,
    description: String,
    author_name: Option<String>,
    author_url: Option<String>,
    image_url: Option<String>,
    screenshot_url: Option<String>,
}

impl ContentSource {
    /// Create a source with unknown sizes and no metadata.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: name.into(),
            strategy: FetchStrategy::from_url(&url),
            url,
            install_size: None,
            download_size: None,
            description: String::new(),
            author_name: None,
            author_url: None,
            image_url: None,
            screenshot_url: None,
        }
    }

    /// Set the expected sizes in bytes. Zero is treated as unknown.
    pub fn with_sizes(mut self, install_size: Option<u64>, download_size: Option<u64>) -> Self {
        self.install_size = install_size.filter(|s| *s > 0);
        self.download_size = download_size.filter(|s| *s > 0);
        self
    }

    /// Set the free-text description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the author name and optional homepage.
    pub fn with_author(mut self, name: Option<String>, url: Option<String>) -> Self {
        self.author_name = non_blank(name);
        self.author_url = non_blank(url);
        self
    }

    /// Set the preview image and screenshot URLs.
    pub fn with_images(mut self, image_url: Option<String>, screenshot_url: Option<String>) -> Self {
        self.image_url = non_blank(image_url);
        self.screenshot_url = non_blank(screenshot_url);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch strategy derived from the URL suffix.
    pub fn strategy(&self) -> Option<FetchStrategy> {
        self.strategy
    }

    pub fn install_size(&self) -> Option<u64> {
        self.install_size
    }

    pub fn download_size(&self) -> Option<u64> {
        self.download_size
    }

    /// Bytes needed on disk for download plus installation.
    ///
    /// `None` when neither size is known, in which case the free-space check
    /// is skipped.
    pub fn required_space(&self) -> Option<u64> {
        match (self.install_size, self.download_size) {
            (None, None) => None,
            (install, download) => {
                Some(install.unwrap_or(0).saturating_add(download.unwrap_or(0)))
            }
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author_name.as_deref()
    }

    pub fn author_url(&self) -> Option<&str> {
        self.author_url.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn screenshot_url(&self) -> Option<&str> {
        self.screenshot_url.as_deref()
    }

    /// File name of the transient archive for the archive strategy, e.g.
    /// `"Demo Route.zip"`.
    ///
    /// Path separators and characters not allowed in file names are replaced
    /// with `_`, so the archive always lands directly in the destination.
    pub fn archive_file_name(&self) -> Option<String> {
        self.strategy?
            .archive_extension()
            .map(|ext| format!("{}.{}", file_name_safe(&self.name), ext))
    }
}

fn file_name_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_file_name_stays_in_destination() {
        let escaping = ContentSource::new("../../etc/Demo", "https://example.com/demo.zip");
        let windows = ContentSource::new(r"C:\Routes\Demo", "https://example.com/demo.zip");

        assert_eq!(
            escaping.archive_file_name().as_deref(),
            Some(".._.._etc_Demo.zip")
        );
        assert_eq!(windows.archive_file_name().as_deref(), Some("C__Routes_Demo.zip"));

        let name = escaping.archive_file_name().unwrap();
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn test_strategy_from_suffix() {
        assert_eq!(
            FetchStrategy::from_url("https://github.com/x/route.git"),
            Some(FetchStrategy::Repository)
        );
        assert_eq!(
            FetchStrategy::from_url("https://github.com/x/route.git/"),
            Some(FetchStrategy::Repository)
        );
        assert_eq!(
            FetchStrategy::from_url("http://host/route.zip"),
            Some(FetchStrategy::Archive)
        );
        assert_eq!(FetchStrategy::from_url("http://host/route.tar.gz"), None);
        assert_eq!(FetchStrategy::from_url(""), None);
    }

    #[test]
    fn test_strategy_extraction() {
        assert!(FetchStrategy::Archive.needs_extraction());
        assert!(!FetchStrategy::Repository.needs_extraction());
        assert_eq!(FetchStrategy::Archive.archive_extension(), Some("zip"));
        assert_eq!(FetchStrategy::Repository.archive_extension(), None);
    }

    #[test]
    fn test_required_space() {
        let unknown = ContentSource::new("a", "http://h/a.zip");
        assert_eq!(unknown.required_space(), None);

        let zeros = ContentSource::new("a", "http://h/a.zip").with_sizes(Some(0), Some(0));
        assert_eq!(zeros.required_space(), None);

        let partial = ContentSource::new("a", "http://h/a.zip").with_sizes(Some(100), None);
        assert_eq!(partial.required_space(), Some(100));

        let both = ContentSource::new("a", "http://h/a.zip").with_sizes(Some(100), Some(50));
        assert_eq!(both.required_space(), Some(150));
    }

    #[test]
    fn test_archive_file_name() {
        let zip = ContentSource::new("Demo Route", "http://h/demo.zip");
        assert_eq!(zip.archive_file_name().as_deref(), Some("Demo Route.zip"));

        let git = ContentSource::new("Demo Route", "http://h/demo.git");
        assert_eq!(git.archive_file_name(), None);
    }

    #[test]
    fn test_blank_metadata_is_dropped() {
        let source = ContentSource::new("a", "http://h/a.git")
            .with_author(Some("  ".to_string()), Some("http://author".to_string()))
            .with_images(None, Some(String::new()));

        assert_eq!(source.author_name(), None);
        assert_eq!(source.author_url(), Some("http://author"));
        assert_eq!(source.screenshot_url(), None);
    }
}
