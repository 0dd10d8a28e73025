use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding crate sources, tests and benchmarks. Nothing else is scanned.
const SOURCE_DIRS: [&str; 4] = ["collapse", "summary", "tests", "benches"];

/// One code-policy rule: a line regex plus the filter and message for its matches.
struct Rule {
    name: &'static str,
    pattern: &'static str,
    comments_only: bool,
    advice: &'static str,
}

const RULES: [Rule; 3] = [
    Rule {
        name: "underscore-prefixed bindings",
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        comments_only: false,
        advice: "Either use the binding (removing the underscore) or remove it completely.",
    },
    Rule {
        name: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        comments_only: false,
        advice: "Either use the code (removing the attribute) or remove it completely.",
    },
    Rule {
        name: "change-log comments",
        pattern: r"(//|/\*).*\b(FIXED|FIX|FIXES|CORRECTED|NEW|CHANGED|CHANGE|UPDATED|UPDATE)\b",
        comments_only: true,
        advice: "Comments describe the code as it is, not how it was edited. Remove them.",
    },
];

// Collects the matching lines of one file for one rule.
struct ViolationCollector<'r> {
    rule: &'r Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl<'r> ViolationCollector<'r> {
    fn new(rule: &'r Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.name,
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!(
            "\n⚠️ {} are not allowed in this project.\n   {}\n",
            self.rule.name, self.rule.advice
        ));
        Some(error_msg)
    }
}

// Strips string literal contents so identifiers quoted in messages are not reported.
fn code_outside_strings(line: &str) -> String {
    line.split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(_, part)| part)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Sink for ViolationCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        let trimmed = line_text.trim_start();
        let is_comment = trimmed.starts_with("//") || trimmed.starts_with("/*");

        if !self.rule.comments_only {
            if is_comment {
                return Ok(true);
            }
            // Re-check the match on the code outside string literals.
            let matcher = RegexMatcher::new_line_matcher(self.rule.pattern)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
            let code = code_outside_strings(line_text);
            let mut found = false;
            Searcher::new().search_slice(
                &matcher,
                code.as_bytes(),
                grep::searcher::sinks::UTF8(|_, _| {
                    found = true;
                    Ok(false)
                }),
            )?;
            if !found {
                return Ok(true);
            }
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn source_files() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.path().to_path_buf())
    })
}

fn scan(rule: &Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in source_files() {
        let mut collector = ViolationCollector::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    for rule in &RULES {
        if let Err(e) = scan(rule) {
            // The `eprintln!` here is what surfaces the report in cargo's output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
