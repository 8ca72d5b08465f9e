//! Java source resolver
//!
//! Builds a [`ClassResolver`] from test sources instead of compiled
//! classes. Each `*.java` file under the configured roots is parsed with
//! tree-sitter-java; every class (nested ones included, under their binary
//! name `pkg.Outer$Inner`) is indexed with the methods it declares, their
//! annotation simple names and their `@Tag` values.
//!
//! Roots are scanned with the `ignore` crate's parallel walker. Files are
//! parsed on the walker threads and the results merged in path order, so
//! the index is the same whatever the thread interleaving.

use crate::core::error::{BucketError, Result};
use crate::core::models::{TestClass, TestMethod};
use crate::core::resolver::{ClassResolver, ResolveError};
use ignore::{WalkBuilder, WalkState};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tree_sitter::Node;

/// Outcome of reading and parsing one source file
#[derive(Debug)]
struct SourceFile {
    path: PathBuf,
    outcome: std::result::Result<Vec<TestClass>, ResolveError>,
}

/// Index of classes found in Java test sources
#[derive(Debug, Default)]
pub struct SourceIndex {
    classes: HashMap<String, TestClass>,
    unreadable: HashMap<String, ResolveError>,
    files_scanned: usize,
}

impl SourceIndex {
    /// Scan and parse every Java file under `roots`
    pub fn build(roots: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for root in roots {
            if !root.is_dir() {
                return Err(BucketError::DirectoryNotFound { path: root.clone() });
            }
            files.extend(scan_root(root));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut index = SourceIndex::default();
        for file in files {
            index.absorb(file);
        }

        log::info!(
            "indexed {} classes from {} source files",
            index.classes.len(),
            index.files_scanned
        );
        Ok(index)
    }

    /// Index a single source text (no file system access)
    pub fn from_source(source: &str) -> Result<Self> {
        let classes = parse_java(source).map_err(|reason| BucketError::Resolve {
            class_name: "<inline>".to_string(),
            message: reason,
        })?;
        let mut index = SourceIndex::default();
        index.absorb(SourceFile {
            path: PathBuf::new(),
            outcome: Ok(classes),
        });
        Ok(index)
    }

    fn absorb(&mut self, file: SourceFile) {
        self.files_scanned += 1;
        match file.outcome {
            Ok(classes) => {
                for class in classes {
                    if self.classes.contains_key(&class.name) {
                        log::warn!(
                            "duplicate class {} in {}, keeping the first definition",
                            class.name,
                            file.path.display()
                        );
                        continue;
                    }
                    self.classes.insert(class.name.clone(), class);
                }
            }
            Err(err) => {
                log::warn!("skipping {}: {}", file.path.display(), err);
                if let ResolveError::Unreadable { class_name, .. } = &err {
                    self.unreadable.insert(class_name.clone(), err.clone());
                }
            }
        }
    }

    /// Number of indexed classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if no class was indexed
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Names of all indexed classes, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ClassResolver for SourceIndex {
    fn resolve(&self, class_name: &str) -> std::result::Result<TestClass, ResolveError> {
        if let Some(class) = self.classes.get(class_name) {
            return Ok(class.clone());
        }
        match self.unreadable.get(class_name) {
            Some(err) => Err(err.clone()),
            None => Err(ResolveError::NotFound(class_name.to_string())),
        }
    }
}

fn scan_root(root: &Path) -> Vec<SourceFile> {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(true)
        .follow_links(false);

    let (tx, rx) = mpsc::channel();

    builder.build_parallel().run(|| {
        let tx = tx.clone();
        let root = root.to_path_buf();

        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    log::warn!("walk error under {}: {}", root.display(), err);
                    return WalkState::Continue;
                }
            };

            let path = entry.path();
            let is_java = entry.file_type().is_some_and(|ft| ft.is_file())
                && path.extension().is_some_and(|ext| ext == "java");

            if is_java {
                let _ = tx.send(read_source_file(&root, path));
            }

            WalkState::Continue
        })
    });

    drop(tx); // Close sender

    rx.into_iter().collect()
}

fn read_source_file(root: &Path, path: &Path) -> SourceFile {
    let unreadable = |reason: String| ResolveError::Unreadable {
        class_name: class_name_from_path(root, path),
        reason,
    };

    let outcome = match fs::read_to_string(path) {
        Ok(source) => parse_java(&source).map_err(unreadable),
        Err(err) => Err(unreadable(err.to_string())),
    };

    SourceFile {
        path: path.to_path_buf(),
        outcome,
    }
}

/// `root/com/acme/FooTest.java` -> `com.acme.FooTest`
fn class_name_from_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_java(source: &str) -> std::result::Result<Vec<TestClass>, String> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| e.to_string())?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "Failed to parse source".to_string())?;

    let root = tree.root_node();
    if root.has_error() {
        log::debug!("source has syntax errors, indexing what parsed");
    }

    let mut extractor = JavaExtractor {
        source: source.as_bytes(),
        package: None,
        classes: Vec::new(),
    };
    extractor.package = extractor.package_name(root);
    extractor.visit_types(root, None);
    Ok(extractor.classes)
}

struct JavaExtractor<'s> {
    source: &'s [u8],
    package: Option<String>,
    classes: Vec<TestClass>,
}

impl<'s> JavaExtractor<'s> {
    fn package_name(&self, root: Node) -> Option<String> {
        let mut cursor = root.walk();
        let package = root
            .named_children(&mut cursor)
            .find(|c| c.kind() == "package_declaration")?;

        let mut inner = package.walk();
        let name = package
            .named_children(&mut inner)
            .find(|c| matches!(c.kind(), "identifier" | "scoped_identifier"))
            .map(|n| self.text(n));
        name
    }

    fn visit_types(&mut self, parent: Node, outer: Option<&str>) {
        for child in member_nodes(parent) {
            if matches!(
                child.kind(),
                "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
            ) {
                self.visit_type(child, outer);
            }
        }
    }

    fn visit_type(&mut self, node: Node, outer: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let simple = self.text(name_node);
        let binary_name = match (outer, &self.package) {
            (Some(outer), _) => format!("{}${}", outer, simple),
            (None, Some(package)) => format!("{}.{}", package, simple),
            (None, None) => simple,
        };

        let is_abstract =
            node.kind() == "interface_declaration" || has_modifier(node, "abstract");

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for member in member_nodes(body) {
                if member.kind() == "method_declaration" {
                    if let Some(method) = self.method(member) {
                        methods.push(method);
                    }
                }
            }
            self.visit_types(body, Some(&binary_name));
        }

        self.classes.push(TestClass {
            name: binary_name,
            is_abstract,
            methods,
        });
    }

    fn method(&self, node: Node) -> Option<TestMethod> {
        let name = self.text(node.child_by_field_name("name")?);
        let mut method = TestMethod {
            name,
            annotations: Vec::new(),
            tags: Vec::new(),
        };

        if let Some(modifiers) = modifiers(node) {
            let mut cursor = modifiers.walk();
            for annotation in modifiers.named_children(&mut cursor) {
                if !matches!(annotation.kind(), "annotation" | "marker_annotation") {
                    continue;
                }
                method.annotations.push(self.annotation_name(annotation));
                self.collect_tags(annotation, &mut method.tags);
            }
        }

        Some(method)
    }

    /// `@org.junit.jupiter.api.Tag` -> `Tag`
    fn annotation_name(&self, annotation: Node) -> String {
        let full = annotation
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        full.rsplit('.').next().unwrap_or_default().to_string()
    }

    /// Tags from `@Tag("x")`, or from every `@Tag` nested in `@Tags({...})`
    fn collect_tags(&self, node: Node, tags: &mut Vec<String>) {
        if matches!(node.kind(), "annotation" | "marker_annotation") {
            match self.annotation_name(node).as_str() {
                "Tag" => {
                    if let Some(value) = node
                        .child_by_field_name("arguments")
                        .and_then(|args| self.first_string(args))
                    {
                        tags.push(value);
                    }
                    return;
                }
                "Tags" => {}
                _ => return,
            }
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_tags(child, tags);
        }
    }

    fn first_string(&self, node: Node) -> Option<String> {
        if node.kind() == "string_literal" {
            return Some(self.text(node).trim_matches('"').to_string());
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        children.into_iter().find_map(|c| self.first_string(c))
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }
}

/// Named children of a body, looking through enum body declarations
fn member_nodes(body: Node) -> Vec<Node> {
    let mut cursor = body.walk();
    let mut members = Vec::new();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }
    members
}

fn modifiers(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == "modifiers");
    found
}

fn has_modifier(node: Node, keyword: &str) -> bool {
    let Some(modifiers) = modifiers(node) else {
        return false;
    };
    let mut cursor = modifiers.walk();
    let found = modifiers.children(&mut cursor).any(|c| c.kind() == keyword);
    found
}
