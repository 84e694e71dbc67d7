//! JUnit XML report parsing.
//!
//! Reads a single-suite JUnit report into a [`TestSuite`]. The layout is the
//! one most test runners emit:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <testsuite name="e2e" tests="3" failures="1">
//!   <testcase classname="api smoke" name="lists users" time="0.100"/>
//!   <testcase classname="api smoke" name="creates user" time="0.150">
//!     <failure type="Failure">expected 201, got 500</failure>
//!   </testcase>
//!   <testcase classname="api smoke" name="deletes user" time="0.000">
//!     <skipped/>
//!   </testcase>
//! </testsuite>
//! ```
//!
//! Elements the model doesn't use (`<properties>`, `<system-out>`, `<error>`)
//! are ignored.

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

/// Result type for report parsing.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while loading a JUnit report.
///
/// Reading and parsing failures are separate variants so callers can
/// report them differently.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report file doesn't exist or couldn't be read.
    #[error("Failed to read JUnit report {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report is not well-formed XML or doesn't have the expected shape.
    #[error("Malformed JUnit report {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

impl ReportError {
    /// Returns true if this is a read (I/O) failure rather than a parse failure.
    pub fn is_read(&self) -> bool {
        matches!(self, ReportError::Read { .. })
    }
}

/// A parsed test suite: the root of a JUnit report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    pub name: String,
    /// Test cases in document order.
    pub test_cases: Vec<TestCase>,
}

/// A single `<testcase>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub class_name: String,
    /// Present when the case has a `<failure>` element.
    pub failure: Option<FailureMessage>,
    /// Present when the case has a `<skipped>` element.
    pub skipped: Option<Skipped>,
}

/// Contents of a `<failure>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureMessage {
    /// The `type` attribute, if any.
    pub kind: Option<String>,
    /// The element text, or the `message` attribute when the text is empty.
    pub message: String,
}

/// Marker for a `<skipped>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skipped {
    pub message: Option<String>,
}

impl TestCase {
    /// Whether this case should raise an alert.
    ///
    /// Skipped cases never alert, even when they also carry a failure.
    pub fn is_alertable(&self) -> bool {
        if self.skipped.is_some() {
            return false;
        }
        self.failure.is_some()
    }
}

impl TestSuite {
    /// Alertable cases paired with their index in the unfiltered case list.
    pub fn failed_cases(&self) -> impl Iterator<Item = (usize, &TestCase)> {
        self.test_cases
            .iter()
            .enumerate()
            .filter(|(_, case)| case.is_alertable())
    }
}

// Serde shapes mirroring the XML. quick-xml maps `@name` to attributes and
// `$text` to character data.

#[derive(Debug, Deserialize)]
struct SuiteElement {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "testcase", default)]
    test_cases: Vec<CaseElement>,
}

#[derive(Debug, Deserialize)]
struct CaseElement {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@classname", default)]
    class_name: String,
    // Repeated elements are tolerated; the last one wins.
    #[serde(default)]
    failure: Vec<FailureElement>,
    #[serde(default)]
    skipped: Vec<SkippedElement>,
}

#[derive(Debug, Deserialize)]
struct FailureElement {
    #[serde(rename = "@message", default)]
    message: Option<String>,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct SkippedElement {
    #[serde(rename = "@message", default)]
    message: Option<String>,
}

impl From<SuiteElement> for TestSuite {
    fn from(suite: SuiteElement) -> Self {
        Self {
            name: suite.name,
            test_cases: suite.test_cases.into_iter().map(TestCase::from).collect(),
        }
    }
}

impl From<CaseElement> for TestCase {
    fn from(mut case: CaseElement) -> Self {
        Self {
            name: case.name,
            class_name: case.class_name,
            failure: case.failure.pop().map(|f| FailureMessage {
                message: if f.text.is_empty() {
                    f.message.unwrap_or_default()
                } else {
                    f.text
                },
                kind: f.kind,
            }),
            skipped: case.skipped.pop().map(|s| Skipped { message: s.message }),
        }
    }
}

/// Reads and parses a JUnit report file.
///
/// # Errors
///
/// - [`ReportError::Read`] if the file can't be read
/// - [`ReportError::Parse`] if the content isn't a valid `<testsuite>` document
pub fn parse_junit_file(path: &Path) -> ReportResult<TestSuite> {
    let bytes = std::fs::read(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let content = String::from_utf8(bytes).map_err(|e| ReportError::Parse {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {}", e),
    })?;

    parse_document(&content).map_err(|message| ReportError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses JUnit XML held in memory.
///
/// # Example
///
/// ```
/// use junit2alertmanager::report::parse_junit_str;
///
/// let suite = parse_junit_str(r#"
///     <testsuite name="unit">
///         <testcase classname="math" name="adds"/>
///         <testcase classname="math" name="divides"><failure>division by zero</failure></testcase>
///     </testsuite>
/// "#)?;
///
/// assert_eq!(suite.test_cases.len(), 2);
/// assert_eq!(suite.failed_cases().count(), 1);
/// # Ok::<(), junit2alertmanager::report::ReportError>(())
/// ```
pub fn parse_junit_str(content: &str) -> ReportResult<TestSuite> {
    parse_document(content).map_err(|message| ReportError::Parse {
        path: PathBuf::from("<input>"),
        message,
    })
}

fn parse_document(content: &str) -> Result<TestSuite, String> {
    let content = content.trim_start_matches('\u{feff}');

    match root_element(content)? {
        Some(root) if root == "testsuite" => {}
        Some(root) => {
            return Err(format!(
                "expected <testsuite> root element, found <{}>",
                root
            ));
        }
        None => return Err("document has no root element".to_string()),
    }

    let suite: SuiteElement = quick_xml::de::from_str(content).map_err(|e| e.to_string())?;
    Ok(suite.into())
}

/// Name of the first element in the document, checking well-formedness up to it.
fn root_element(content: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(Some(
                    String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                ));
            }
        }
    }
}
