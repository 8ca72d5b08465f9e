//! TestNG suite files
//!
//! Reads the subset of the TestNG suite XML that affects which test
//! methods run:
//!
//! ```xml
//! <suite name="regression">
//!   <test name="checkout">
//!     <classes>
//!       <class name="com.acme.CartTest">
//!         <methods>
//!           <include name="addsItem"/>
//!           <exclude name="flaky"/>
//!         </methods>
//!       </class>
//!     </classes>
//!   </test>
//!   <suite-files>
//!     <suite-file path="smoke.xml"/>
//!   </suite-files>
//! </suite>
//! ```
//!
//! Everything else (parameters, listeners, groups, packages) is read for
//! well-formedness and otherwise ignored.

use crate::core::error::{BucketError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    /// Markup we skip, or an element tag with its attribute block
    static ref TOKEN: Regex = Regex::new(
        r#"(?s)<!--.*?-->|<\?.*?\?>|<!\[CDATA\[.*?\]\]>|<!DOCTYPE[^>]*>|<(/?)([A-Za-z_][\w.:-]*)((?:\s+[\w.:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#
    )
    .unwrap();

    static ref ATTRIBUTE: Regex =
        Regex::new(r#"([\w.:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// A `<class>` entry inside a `<test>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteClass {
    /// Fully-qualified class name
    pub name: String,
    /// `<include>` method names; `None` when the class has no include list
    pub include_methods: Option<Vec<String>>,
    /// `<exclude>` method names
    pub exclude_methods: Vec<String>,
}

/// A `<test>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteTest {
    /// Test name attribute
    pub name: String,
    /// Classes listed under `<classes>`
    pub classes: Vec<SuiteClass>,
}

/// A parsed suite file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteDefinition {
    /// Suite name attribute
    pub name: String,
    /// Tests in document order
    pub tests: Vec<SuiteTest>,
    /// Paths from `<suite-file path="...">`, as written
    pub suite_files: Vec<String>,
}

impl SuiteDefinition {
    /// Parse suite XML
    pub fn parse(xml: &str) -> Result<Self> {
        SuiteParser::default().parse(xml)
    }

    /// Read and parse a suite file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BucketError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let xml = fs::read_to_string(path)?;
        Self::parse(&xml)
    }

    /// `(test, class)` entries in document order
    pub fn class_entries(&self) -> impl Iterator<Item = (&SuiteTest, &SuiteClass)> + '_ {
        self.tests
            .iter()
            .flat_map(|test| test.classes.iter().map(move |class| (test, class)))
    }
}

/// Suites loaded from a set of files, following `<suite-files>`
#[derive(Debug, Default)]
pub struct LoadedSuites {
    /// Successfully parsed suites, parents before their children
    pub suites: Vec<SuiteDefinition>,
    /// Files that could not be read or parsed
    pub errors: Vec<(PathBuf, String)>,
}

impl LoadedSuites {
    /// Load suite files. Failures are recorded and logged, never fatal.
    /// Each file is loaded once even if several suites reference it.
    pub fn load(paths: &[PathBuf]) -> Self {
        let mut loaded = LoadedSuites::default();
        let mut visited = HashSet::new();
        for path in paths {
            loaded.load_one(path, &mut visited);
        }
        loaded
    }

    fn load_one(&mut self, path: &Path, visited: &mut HashSet<PathBuf>) {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(key) {
            log::debug!("suite {} already loaded", path.display());
            return;
        }

        match SuiteDefinition::load(path) {
            Ok(suite) => {
                log::debug!(
                    "suite '{}' from {}: {} test(s)",
                    suite.name,
                    path.display(),
                    suite.tests.len()
                );
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let children: Vec<PathBuf> =
                    suite.suite_files.iter().map(|child| base.join(child)).collect();
                self.suites.push(suite);
                for child in children {
                    self.load_one(&child, visited);
                }
            }
            Err(err) => {
                log::warn!("skipping suite {}: {}", path.display(), err);
                self.errors.push((path.to_path_buf(), err.to_string()));
            }
        }
    }
}

#[derive(Debug)]
struct Tag<'a> {
    closing: bool,
    name: &'a str,
    attributes: &'a str,
    self_closing: bool,
    line: usize,
}

#[derive(Default)]
struct SuiteParser {
    stack: Vec<String>,
    suite: Option<SuiteDefinition>,
}

impl SuiteParser {
    fn parse(mut self, xml: &str) -> Result<SuiteDefinition> {
        let mut cursor = 0;
        let mut lines = LineCounter::default();

        for caps in TOKEN.captures_iter(xml) {
            let Some(whole) = caps.get(0) else { continue };
            let line = lines.advance(xml, whole.start());

            if xml[cursor..whole.start()].contains('<') {
                return Err(BucketError::suite_parse(
                    line_at(xml, cursor),
                    "malformed markup",
                ));
            }
            cursor = whole.end();

            let Some(name) = caps.get(2) else {
                continue; // comment, declaration, doctype or CDATA
            };

            let tag = Tag {
                closing: !caps.get(1).map_or("", |m| m.as_str()).is_empty(),
                name: name.as_str(),
                attributes: caps.get(3).map_or("", |m| m.as_str()),
                self_closing: !caps.get(4).map_or("", |m| m.as_str()).is_empty(),
                line,
            };

            if tag.closing {
                self.close(&tag)?;
            } else {
                self.open(&tag)?;
            }
        }

        if xml[cursor..].contains('<') {
            return Err(BucketError::suite_parse(line_at(xml, cursor), "malformed markup"));
        }
        if let Some(open) = self.stack.last() {
            return Err(BucketError::suite_parse(
                line_at(xml, xml.len()),
                format!("unclosed <{}>", open),
            ));
        }
        self.suite
            .ok_or_else(|| BucketError::suite_parse(1, "no <suite> element"))
    }

    fn open(&mut self, tag: &Tag) -> Result<()> {
        let parent = self.stack.last().cloned();

        match (tag.name, parent.as_deref()) {
            ("suite", None) => {
                if self.suite.is_some() {
                    return Err(BucketError::suite_parse(tag.line, "more than one <suite>"));
                }
                self.suite = Some(SuiteDefinition {
                    name: attribute(tag.attributes, "name").unwrap_or_default(),
                    tests: Vec::new(),
                    suite_files: Vec::new(),
                });
            }
            (_, None) => {
                return Err(BucketError::suite_parse(
                    tag.line,
                    format!("expected <suite> as root, found <{}>", tag.name),
                ));
            }
            ("test", Some("suite")) => {
                let suite = self.suite_mut(tag)?;
                suite.tests.push(SuiteTest {
                    name: attribute(tag.attributes, "name").unwrap_or_default(),
                    classes: Vec::new(),
                });
            }
            ("class", Some("classes")) => {
                let name = attribute(tag.attributes, "name").ok_or_else(|| {
                    BucketError::suite_parse(tag.line, "<class> without a name attribute")
                })?;
                let test = self.current_test(tag)?;
                test.classes.push(SuiteClass {
                    name,
                    include_methods: None,
                    exclude_methods: Vec::new(),
                });
            }
            ("include", Some("methods")) | ("exclude", Some("methods")) => {
                let Some(method) = attribute(tag.attributes, "name") else {
                    return Err(BucketError::suite_parse(
                        tag.line,
                        format!("<{}> without a name attribute", tag.name),
                    ));
                };
                let include = tag.name == "include";
                if let Some(class) = self.current_class() {
                    if include {
                        class.include_methods.get_or_insert_with(Vec::new).push(method);
                    } else {
                        class.exclude_methods.push(method);
                    }
                }
            }
            ("suite-file", Some("suite-files")) => {
                if let Some(path) = attribute(tag.attributes, "path") {
                    self.suite_mut(tag)?.suite_files.push(path);
                }
            }
            ("package", _) => {
                log::debug!(
                    "line {}: <package> entries are not expanded, ignoring",
                    tag.line
                );
            }
            _ => {}
        }

        if !tag.self_closing {
            self.stack.push(tag.name.to_string());
        }
        Ok(())
    }

    fn close(&mut self, tag: &Tag) -> Result<()> {
        match self.stack.pop() {
            Some(open) if open == tag.name => Ok(()),
            Some(open) => Err(BucketError::suite_parse(
                tag.line,
                format!("found </{}>, expected </{}>", tag.name, open),
            )),
            None => Err(BucketError::suite_parse(
                tag.line,
                format!("unexpected </{}>", tag.name),
            )),
        }
    }

    fn suite_mut(&mut self, tag: &Tag) -> Result<&mut SuiteDefinition> {
        self.suite
            .as_mut()
            .ok_or_else(|| BucketError::suite_parse(tag.line, "element outside <suite>"))
    }

    fn current_test(&mut self, tag: &Tag) -> Result<&mut SuiteTest> {
        let line = tag.line;
        self.suite_mut(tag)?
            .tests
            .last_mut()
            .ok_or_else(|| BucketError::suite_parse(line, "<classes> outside <test>"))
    }

    /// The class whose `<methods>` block is open, if any
    fn current_class(&mut self) -> Option<&mut SuiteClass> {
        let depth = self.stack.len();
        if depth < 2 || self.stack[depth - 2] != "class" {
            return None;
        }
        self.suite.as_mut()?.tests.last_mut()?.classes.last_mut()
    }
}

fn attribute(attributes: &str, wanted: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attributes).find_map(|caps| {
        if &caps[1] != wanted {
            return None;
        }
        let raw = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        Some(unescape(raw))
    })
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Line numbers for monotonically increasing offsets, counting each byte once
#[derive(Debug)]
struct LineCounter {
    offset: usize,
    line: usize,
}

impl Default for LineCounter {
    fn default() -> Self {
        Self { offset: 0, line: 1 }
    }
}

impl LineCounter {
    fn advance(&mut self, text: &str, offset: usize) -> usize {
        self.line += text[self.offset..offset].matches('\n').count();
        self.offset = offset;
        self.line
    }
}
