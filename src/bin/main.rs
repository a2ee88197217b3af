// Copyright (C) 2024 Jelmer Vernooij <jelmer@samba.org>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line interface for the replacewith tool.
//!
//! This binary works on JSON declaration models and offers commands for:
//!
//! - `analyze`: Print the replacement template of one deprecated declaration
//! - `check`: Verify that every `ReplaceWith` annotation yields a template
//!   that resolves
//! - `info`: List all annotated declarations and their templates

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use replacewith::{
    analyze, check_model, load_model_file, scan_file, FrontendConfig, ReplaceWith,
    ReplacementExpression,
};

#[derive(Parser)]
#[command(name = "replacewith")]
#[command(about = "replacewith - Analyze ReplaceWith annotations of deprecated declarations")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Do not import the kotlin and kotlin.collections packages by default
    #[arg(long, global = true)]
    no_default_imports: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the replacement template of a deprecated declaration
    Analyze {
        /// Declaration model file
        model: PathBuf,

        /// Fully-qualified name of the declaration (e.g. p.C.m or p.C.<init>)
        name: String,

        /// Analyze this expression instead of the declaration's annotation
        #[arg(long)]
        expression: Option<String>,

        /// Imports for --expression
        #[arg(long = "import")]
        imports: Vec<String>,

        /// Print the template as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify that ReplaceWith annotations produce templates that resolve
    Check {
        /// Model files or directories to check
        paths: Vec<String>,
    },

    /// List all annotated declarations and their templates
    Info {
        /// Model files or directories to inspect
        paths: Vec<String>,
    },
}

#[derive(Serialize)]
struct TemplateOutput<'a> {
    declaration: &'a str,
    expression: String,
    template: String,
    imports: Vec<String>,
    parameters: Vec<String>,
}

impl<'a> TemplateOutput<'a> {
    fn new(declaration: &'a str, template: &ReplacementExpression) -> Self {
        let parameters: indexmap::IndexSet<String> = template
            .parameter_usages()
            .iter()
            .map(|usage| usage.name.to_string())
            .collect();
        Self {
            declaration,
            expression: template.expression().to_string(),
            template: template.placeholder_text(),
            imports: template
                .fq_names_to_import()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            parameters: parameters.into_iter().collect(),
        }
    }
}

/// Discover model files in a directory or resolve a path argument
fn discover_model_files(path: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(path);

    if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let mut model_files = Vec::new();
        visit_model_files(path, &mut model_files)?;
        model_files.sort();
        return Ok(model_files);
    }

    if path.to_string_lossy().contains('*') || path.to_string_lossy().contains('?') {
        let pattern = path.to_string_lossy();
        let glob_results = glob::glob(&pattern)?;
        let mut files = Vec::new();
        for entry in glob_results {
            let entry = entry?;
            if entry.extension().is_some_and(|ext| ext == "json") {
                files.push(entry);
            }
        }
        files.sort();
        return Ok(files);
    }

    // Fall back to treating it as a file path (may not exist)
    Ok(vec![path.to_path_buf()])
}

fn visit_model_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                // Skip hidden directories and build output
                if let Some(name) = path.file_name() {
                    let name = name.to_string_lossy();
                    if !name.starts_with('.') && name != "target" {
                        visit_model_files(&path, files)?;
                    }
                }
            } else if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }
    Ok(())
}

fn expand_paths(paths: &[String]) -> Result<Vec<PathBuf>> {
    use indexmap::IndexSet;

    let mut expanded = IndexSet::new();
    for path in paths {
        expanded.extend(discover_model_files(path)?);
    }

    Ok(expanded.into_iter().collect())
}

/// Files among `files` that carry annotations.
fn annotated_files(files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut annotated = Vec::new();
    for filepath in files {
        if scan_file(&filepath.to_string_lossy())?.is_some() {
            annotated.push(filepath.clone());
        } else {
            tracing::debug!("Skipping {}: no annotations", filepath.display());
        }
    }
    Ok(annotated)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    if cli.debug || std::env::var("RUST_LOG").is_ok() {
        let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => {
                if cli.debug {
                    tracing_subscriber::EnvFilter::new("debug")
                } else {
                    tracing_subscriber::EnvFilter::new("warn")
                }
            }
        };
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .init();
    }

    let config = if cli.no_default_imports {
        FrontendConfig::without_default_imports()
    } else {
        FrontendConfig::default()
    };

    match cli.command {
        Commands::Analyze {
            model,
            name,
            expression,
            imports,
            json,
        } => {
            let loaded = load_model_file(&model)?;
            let descriptor = loaded
                .lookup(&name)
                .ok_or_else(|| anyhow!("No declaration named {} in {}", name, model.display()))?;
            let annotation = match expression {
                Some(expression) => ReplaceWith::new(expression).with_imports(imports),
                None => match loaded.annotation_for(descriptor) {
                    Some(annotated) => annotated.replace_with.clone(),
                    None => bail!("{} has no ReplaceWith annotation", name),
                },
            };
            let (frontend, _) = loaded.into_frontend(config);
            let template = analyze(&annotation, descriptor, &frontend)?;

            let output = TemplateOutput::new(&name, &template);
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", output.expression);
                println!("  Template: {}", output.template);
                for import in &output.imports {
                    println!("  Import: {}", import);
                }
            }
        }

        Commands::Check { paths } => {
            let files = annotated_files(&expand_paths(&paths)?)?;
            let mut errors_found = false;

            for filepath in &files {
                let loaded = load_model_file(filepath)?;
                let result = check_model(loaded, config.clone());
                if result.success {
                    if !result.checked_declarations.is_empty() {
                        println!(
                            "{}: {} ReplaceWith annotation(s) can be applied",
                            filepath.display(),
                            result.checked_declarations.len()
                        );
                    }
                } else {
                    errors_found = true;
                    println!("{}: ERRORS found", filepath.display());
                    for error in &result.errors {
                        println!("  {}", error);
                    }
                }
            }

            std::process::exit(if errors_found { 1 } else { 0 });
        }

        Commands::Info { paths } => {
            let files = annotated_files(&expand_paths(&paths)?)?;
            let mut total_annotated = 0;

            for filepath in &files {
                let loaded = load_model_file(filepath)?;
                let (frontend, annotated) = loaded.into_frontend(config.clone());
                if annotated.is_empty() {
                    continue;
                }
                total_annotated += annotated.len();
                println!(
                    "\n{}: {} deprecated declaration(s)",
                    filepath.display(),
                    annotated.len()
                );
                for declaration in &annotated {
                    println!("  - {}", declaration.name);
                    println!("    Replacement: {}", declaration.replace_with.expression);
                    match analyze(&declaration.replace_with, declaration.descriptor, &frontend) {
                        Ok(template) => {
                            println!("    Template: {}", template.placeholder_text());
                            if !template.fq_names_to_import().is_empty() {
                                let imports: Vec<String> = template
                                    .fq_names_to_import()
                                    .iter()
                                    .map(|name| name.to_string())
                                    .collect();
                                println!("    Imports: {}", imports.join(", "));
                            }
                        }
                        Err(e) => println!("    Error: {}", e),
                    }
                    if let Some(message) = &declaration.message {
                        println!("    Message: {}", message);
                    }
                }
            }

            // Summary
            println!("\n=== Summary ===");
            println!("Total files analyzed: {}", files.len());
            println!("Total deprecated declarations found: {}", total_annotated);

            std::process::exit(0);
        }
    }

    Ok(())
}
