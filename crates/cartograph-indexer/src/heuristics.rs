//! Convention detection rule tables
//!
//! Three independent tables feed the patterns manifest:
//!
//! * [`SOURCE_RULES`] over [`SourceSignals`] counted from syntax trees,
//! * [`NAMING_RULES`] over [`NamingStats`] derived from extracted symbols,
//! * [`DEPENDENCY_RULES`] over dependency names declared in project manifests.
//!
//! Rules only ever add findings. Bump [`RULESET_VERSION`] when a rule changes
//! meaning so consumers can tell findings from different rule sets apart.

use std::collections::BTreeSet;

use cartograph_core::{PatternCategory, PatternFinding, SymbolKind, SymbolRecord};
use regex::Regex;
use tree_sitter::Node;

use crate::languages::node_text;

pub const RULESET_VERSION: u32 = 1;

/// Idiom counts for one file, or for a whole repository once merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSignals {
    pub files: u32,
    pub try_catch: u32,
    pub promise_catch: u32,
    pub custom_errors: u32,
    pub result_objects: u32,
    pub react_hooks: u32,
    pub context_providers: u32,
    pub stores: u32,
    pub observables: u32,
    pub async_await: u32,
    pub promise_chains: u32,
    pub event_emitters: u32,
    pub http_calls: u32,
    pub streams: u32,
}

impl SourceSignals {
    /// Count idioms in one parsed file.
    pub fn collect(root: Node, source: &str) -> Self {
        let mut signals = SourceSignals {
            files: 1,
            ..Default::default()
        };
        let mut cursor = root.walk();
        loop {
            signals.visit(cursor.node(), source);
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return signals;
                }
            }
        }
    }

    fn visit(&mut self, node: Node, source: &str) {
        match node.kind() {
            "try_statement" => self.try_catch += 1,
            "await_expression" => self.async_await += 1,
            "call_expression" => self.visit_call(node, source),
            "new_expression" => {
                let constructor = node
                    .child_by_field_name("constructor")
                    .map(|c| node_text(c, source))
                    .unwrap_or("");
                match constructor {
                    "EventEmitter" => self.event_emitters += 1,
                    "Subject" | "BehaviorSubject" | "ReplaySubject" | "Observable" => {
                        self.observables += 1
                    }
                    "Promise" => self.promise_chains += 1,
                    "XMLHttpRequest" => self.http_calls += 1,
                    "ReadableStream" | "WritableStream" | "TransformStream" => self.streams += 1,
                    _ => {}
                }
            }
            "class_heritage" => {
                let text = node_text(node, source);
                let parent = text
                    .trim_start_matches("extends")
                    .split(|c: char| c.is_whitespace() || c == '<' || c == '{' || c == '(')
                    .find(|part| !part.is_empty())
                    .unwrap_or("");
                let parent = parent.rsplit('.').next().unwrap_or(parent);
                if parent.ends_with("Error") {
                    self.custom_errors += 1;
                } else if parent == "EventEmitter" {
                    self.event_emitters += 1;
                }
            }
            "object" => {
                let mut cursor = node.walk();
                let keys: Vec<&str> = node
                    .named_children(&mut cursor)
                    .filter_map(|member| match member.kind() {
                        "pair" => member
                            .child_by_field_name("key")
                            .map(|k| node_text(k, source)),
                        "shorthand_property_identifier" => Some(node_text(member, source)),
                        _ => None,
                    })
                    .collect();
                let has_flag = keys.iter().any(|k| matches!(*k, "ok" | "success"));
                if has_flag && keys.contains(&"error") {
                    self.result_objects += 1;
                }
            }
            "jsx_opening_element" | "jsx_self_closing_element" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or("");
                if name.ends_with(".Provider") {
                    self.context_providers += 1;
                }
            }
            _ => {}
        }
    }

    fn visit_call(&mut self, call: Node, source: &str) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        match function.kind() {
            "identifier" => match node_text(function, source) {
                "createContext" => self.context_providers += 1,
                "createStore" | "configureStore" | "createSlice" | "combineReducers"
                | "defineStore" => self.stores += 1,
                "createSignal" | "signal" | "observable" | "writable" | "readable" => {
                    self.observables += 1
                }
                "fetch" => self.http_calls += 1,
                "pipeline" | "createReadStream" | "createWriteStream" => self.streams += 1,
                name if is_hook_name(name) => self.react_hooks += 1,
                _ => {}
            },
            "member_expression" => {
                let object = function
                    .child_by_field_name("object")
                    .map(|o| node_text(o, source))
                    .unwrap_or("");
                let property = function
                    .child_by_field_name("property")
                    .map(|p| node_text(p, source))
                    .unwrap_or("");
                match (object, property) {
                    ("axios", _) => self.http_calls += 1,
                    ("React", name) if is_hook_name(name) => self.react_hooks += 1,
                    (_, "then") => self.promise_chains += 1,
                    (_, "catch") => self.promise_catch += 1,
                    (_, "on" | "once" | "emit" | "addListener" | "addEventListener") => {
                        self.event_emitters += 1
                    }
                    (_, "subscribe") => self.observables += 1,
                    (_, "pipe" | "pipeTo" | "pipeThrough") => self.streams += 1,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Add another file's counts to this one.
    pub fn merge(&mut self, other: &SourceSignals) {
        self.files += other.files;
        self.try_catch += other.try_catch;
        self.promise_catch += other.promise_catch;
        self.custom_errors += other.custom_errors;
        self.result_objects += other.result_objects;
        self.react_hooks += other.react_hooks;
        self.context_providers += other.context_providers;
        self.stores += other.stores;
        self.observables += other.observables;
        self.async_await += other.async_await;
        self.promise_chains += other.promise_chains;
        self.event_emitters += other.event_emitters;
        self.http_calls += other.http_calls;
        self.streams += other.streams;
    }
}

/// `useState`, `useEffect`, `useAppSelector`, …
fn is_hook_name(name: &str) -> bool {
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

pub struct SourceRule {
    pub id: &'static str,
    pub category: PatternCategory,
    pub description: &'static str,
    pub applies: fn(&SourceSignals) -> bool,
}

pub static SOURCE_RULES: &[SourceRule] = &[
    SourceRule {
        id: "try-catch",
        category: PatternCategory::ErrorHandling,
        description: "try/catch blocks around fallible operations",
        applies: |s| s.try_catch > 0,
    },
    SourceRule {
        id: "promise-catch",
        category: PatternCategory::ErrorHandling,
        description: "Promise rejections handled with .catch()",
        applies: |s| s.promise_catch > 0,
    },
    SourceRule {
        id: "custom-errors",
        category: PatternCategory::ErrorHandling,
        description: "Custom Error subclasses",
        applies: |s| s.custom_errors > 0,
    },
    SourceRule {
        id: "result-objects",
        category: PatternCategory::ErrorHandling,
        description: "Result objects carrying ok/error fields",
        applies: |s| s.result_objects >= 2,
    },
    SourceRule {
        id: "react-hooks",
        category: PatternCategory::StateManagement,
        description: "React hooks for component state",
        applies: |s| s.react_hooks > 0,
    },
    SourceRule {
        id: "context-providers",
        category: PatternCategory::StateManagement,
        description: "Context providers for shared state",
        applies: |s| s.context_providers > 0,
    },
    SourceRule {
        id: "stores",
        category: PatternCategory::StateManagement,
        description: "Centralised stores (Redux-style)",
        applies: |s| s.stores > 0,
    },
    SourceRule {
        id: "observables",
        category: PatternCategory::StateManagement,
        description: "Signals or observables for reactive state",
        applies: |s| s.observables > 0,
    },
    SourceRule {
        id: "async-await",
        category: PatternCategory::DataFlow,
        description: "async/await for asynchronous control flow",
        applies: |s| s.async_await > 0,
    },
    SourceRule {
        id: "promise-chains",
        category: PatternCategory::DataFlow,
        description: "Promise chains with .then()",
        applies: |s| s.promise_chains > 0,
    },
    SourceRule {
        id: "event-emitters",
        category: PatternCategory::DataFlow,
        description: "Event emitters and listeners",
        applies: |s| s.event_emitters > 0,
    },
    SourceRule {
        id: "http-requests",
        category: PatternCategory::DataFlow,
        description: "HTTP requests via fetch or axios",
        applies: |s| s.http_calls > 0,
    },
    SourceRule {
        id: "streams",
        category: PatternCategory::DataFlow,
        description: "Streams and pipelines",
        applies: |s| s.streams > 0,
    },
];

/// Naming styles of extracted symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingStats {
    pub functions: u32,
    pub camel_case: u32,
    pub snake_case: u32,
    pub pascal_case_functions: u32,
    pub classes: u32,
    pub pascal_case_classes: u32,
    pub interfaces: u32,
    pub prefixed_interfaces: u32,
}

/// Compiled name-style patterns.
pub struct NamingClassifier {
    camel: Regex,
    snake: Regex,
    pascal: Regex,
    prefixed_interface: Regex,
}

impl NamingClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(NamingClassifier {
            camel: Regex::new(r"^[a-z][a-zA-Z0-9]*$")?,
            snake: Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)+$")?,
            pascal: Regex::new(r"^[A-Z][a-zA-Z0-9]*$")?,
            prefixed_interface: Regex::new(r"^I[A-Z][a-zA-Z0-9]*$")?,
        })
    }

    pub fn stats<'a>(&self, symbols: impl IntoIterator<Item = &'a SymbolRecord>) -> NamingStats {
        let mut stats = NamingStats::default();
        for symbol in symbols {
            let name = symbol.name.trim_start_matches(['#', '_', '$']);
            match symbol.kind {
                SymbolKind::Function | SymbolKind::VariableFunction | SymbolKind::Method => {
                    if name == "constructor" || name.is_empty() {
                        continue;
                    }
                    stats.functions += 1;
                    if self.snake.is_match(name) {
                        stats.snake_case += 1;
                    } else if self.camel.is_match(name) {
                        stats.camel_case += 1;
                    } else if self.pascal.is_match(name) {
                        stats.pascal_case_functions += 1;
                    }
                }
                SymbolKind::Class => {
                    stats.classes += 1;
                    if self.pascal.is_match(name) {
                        stats.pascal_case_classes += 1;
                    }
                }
                SymbolKind::Interface => {
                    stats.interfaces += 1;
                    if self.prefixed_interface.is_match(name) {
                        stats.prefixed_interfaces += 1;
                    }
                }
            }
        }
        stats
    }
}

pub struct NamingRule {
    pub id: &'static str,
    pub description: &'static str,
    pub applies: fn(&NamingStats) -> bool,
}

pub static NAMING_RULES: &[NamingRule] = &[
    NamingRule {
        id: "camel-case-functions",
        description: "camelCase function and method names",
        applies: |s| s.functions > 0 && s.camel_case * 10 >= s.functions * 6,
    },
    NamingRule {
        id: "snake-case-functions",
        description: "snake_case function and method names",
        applies: |s| s.functions > 0 && s.snake_case * 10 >= s.functions * 6,
    },
    NamingRule {
        id: "pascal-case-components",
        description: "PascalCase functions (component style)",
        applies: |s| s.pascal_case_functions > 0 && s.pascal_case_functions * 10 >= s.functions * 2,
    },
    NamingRule {
        id: "pascal-case-classes",
        description: "PascalCase class names",
        applies: |s| s.classes > 0 && s.pascal_case_classes == s.classes,
    },
    NamingRule {
        id: "interface-i-prefix",
        description: "Interfaces prefixed with I",
        applies: |s| s.interfaces > 0 && s.prefixed_interfaces * 2 > s.interfaces,
    },
    NamingRule {
        id: "interface-no-prefix",
        description: "Interfaces named without an I prefix",
        applies: |s| s.interfaces > 0 && s.prefixed_interfaces == 0,
    },
];

/// What a dependency tells about the project's tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolRole {
    TestFramework,
    Bundler,
    Linter,
    Formatter,
    Framework,
    BuildTool,
    StateLibrary,
    HttpClient,
}

pub struct DependencyRule {
    pub role: ToolRole,
    /// Name reported in the tech stack.
    pub label: &'static str,
    pub packages: &'static [&'static str],
}

/// Earlier entries win for single-valued roles such as the test framework.
pub static DEPENDENCY_RULES: &[DependencyRule] = &[
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "vitest",
        packages: &["vitest"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "jest",
        packages: &["jest", "ts-jest", "@jest/core"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "mocha",
        packages: &["mocha"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "ava",
        packages: &["ava"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "jasmine",
        packages: &["jasmine"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "playwright",
        packages: &["@playwright/test"],
    },
    DependencyRule {
        role: ToolRole::TestFramework,
        label: "cypress",
        packages: &["cypress"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "vite",
        packages: &["vite"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "webpack",
        packages: &["webpack"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "rollup",
        packages: &["rollup"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "esbuild",
        packages: &["esbuild"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "parcel",
        packages: &["parcel"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "rspack",
        packages: &["@rspack/core", "@rspack/cli"],
    },
    DependencyRule {
        role: ToolRole::Bundler,
        label: "tsup",
        packages: &["tsup"],
    },
    DependencyRule {
        role: ToolRole::Linter,
        label: "eslint",
        packages: &["eslint"],
    },
    DependencyRule {
        role: ToolRole::Linter,
        label: "biome",
        packages: &["@biomejs/biome"],
    },
    DependencyRule {
        role: ToolRole::Linter,
        label: "oxlint",
        packages: &["oxlint"],
    },
    DependencyRule {
        role: ToolRole::Linter,
        label: "tslint",
        packages: &["tslint"],
    },
    DependencyRule {
        role: ToolRole::Linter,
        label: "standard",
        packages: &["standard"],
    },
    DependencyRule {
        role: ToolRole::Formatter,
        label: "prettier",
        packages: &["prettier"],
    },
    DependencyRule {
        role: ToolRole::Formatter,
        label: "biome",
        packages: &["@biomejs/biome"],
    },
    DependencyRule {
        role: ToolRole::Formatter,
        label: "dprint",
        packages: &["dprint"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "next",
        packages: &["next"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "react",
        packages: &["react"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "vue",
        packages: &["vue"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "nuxt",
        packages: &["nuxt"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "svelte",
        packages: &["svelte", "@sveltejs/kit"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "angular",
        packages: &["@angular/core"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "solid",
        packages: &["solid-js"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "remix",
        packages: &["@remix-run/react", "@remix-run/node"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "astro",
        packages: &["astro"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "express",
        packages: &["express"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "fastify",
        packages: &["fastify"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "koa",
        packages: &["koa"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "nestjs",
        packages: &["@nestjs/core"],
    },
    DependencyRule {
        role: ToolRole::Framework,
        label: "hono",
        packages: &["hono"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "typescript",
        packages: &["typescript"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "babel",
        packages: &["@babel/core"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "swc",
        packages: &["@swc/core"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "turbo",
        packages: &["turbo"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "nx",
        packages: &["nx"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "lerna",
        packages: &["lerna"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "gulp",
        packages: &["gulp"],
    },
    DependencyRule {
        role: ToolRole::BuildTool,
        label: "ts-node",
        packages: &["ts-node", "tsx"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "redux",
        packages: &["redux", "@reduxjs/toolkit"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "zustand",
        packages: &["zustand"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "mobx",
        packages: &["mobx"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "jotai",
        packages: &["jotai"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "recoil",
        packages: &["recoil"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "pinia",
        packages: &["pinia"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "vuex",
        packages: &["vuex"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "xstate",
        packages: &["xstate"],
    },
    DependencyRule {
        role: ToolRole::StateLibrary,
        label: "rxjs",
        packages: &["rxjs"],
    },
    DependencyRule {
        role: ToolRole::HttpClient,
        label: "axios",
        packages: &["axios"],
    },
    DependencyRule {
        role: ToolRole::HttpClient,
        label: "ky",
        packages: &["ky"],
    },
    DependencyRule {
        role: ToolRole::HttpClient,
        label: "got",
        packages: &["got"],
    },
    DependencyRule {
        role: ToolRole::HttpClient,
        label: "tanstack-query",
        packages: &["@tanstack/react-query", "react-query"],
    },
    DependencyRule {
        role: ToolRole::HttpClient,
        label: "swr",
        packages: &["swr"],
    },
];

/// Roles implied by declared dependencies, in rule-table order, without repeats.
pub fn classify_dependencies<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<(ToolRole, &'static str)> {
    let declared: BTreeSet<&str> = names.into_iter().collect();
    let mut seen = BTreeSet::new();
    DEPENDENCY_RULES
        .iter()
        .filter(|rule| rule.packages.iter().any(|p| declared.contains(p)))
        .map(|rule| (rule.role, rule.label))
        .filter(|hit| seen.insert(*hit))
        .collect()
}

/// Apply every rule table and return the repository's pattern findings.
pub fn detect_patterns(
    signals: &SourceSignals,
    symbols: &[SymbolRecord],
    dependency_names: &[&str],
) -> Vec<PatternFinding> {
    let mut findings: Vec<PatternFinding> = SOURCE_RULES
        .iter()
        .filter(|rule| (rule.applies)(signals))
        .map(|rule| {
            tracing::trace!("Source rule '{}' matched", rule.id);
            PatternFinding {
                category: rule.category,
                description: rule.description.to_string(),
            }
        })
        .collect();

    match NamingClassifier::new() {
        Ok(classifier) => {
            let stats = classifier.stats(symbols);
            findings.extend(
                NAMING_RULES
                    .iter()
                    .filter(|rule| (rule.applies)(&stats))
                    .map(|rule| PatternFinding {
                        category: PatternCategory::Naming,
                        description: rule.description.to_string(),
                    }),
            );
        }
        Err(e) => tracing::warn!("Naming rules disabled: {}", e),
    }

    for (role, label) in classify_dependencies(dependency_names.iter().copied()) {
        let finding = match role {
            ToolRole::StateLibrary => PatternFinding {
                category: PatternCategory::StateManagement,
                description: format!("State library: {}", label),
            },
            ToolRole::HttpClient => PatternFinding {
                category: PatternCategory::DataFlow,
                description: format!("HTTP client library: {}", label),
            },
            _ => continue,
        };
        findings.push(finding);
    }

    findings
}
