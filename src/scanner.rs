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

//! Fast scanner for model files carrying `replace_with` annotations.
//!
//! Loading a model resolves every type in it, so files that cannot contain
//! an annotation are skipped before they are parsed.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Quick check if `content` might contain a `replace_with` annotation.
///
/// False positives are fine; false negatives are not.
pub fn might_contain_replace_with(content: &str) -> bool {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#""replace_with"\s*:"#).unwrap());

    re.is_match(content)
}

/// Read a file and return its content if it might contain an annotation.
///
/// # Returns
/// * `Ok(Some(content))` - File content if it might contain `replace_with`
/// * `Ok(None)` - File has no annotations
/// * `Err(_)` - File cannot be read or is not valid UTF-8
pub fn scan_file(file_path: &str) -> Result<Option<String>> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read file: {}", file_path))?;

    if might_contain_replace_with(&content) {
        Ok(Some(content))
    } else {
        Ok(None)
    }
}

/// Iterator over the files among `file_paths` that might carry annotations.
pub fn find_files_with_replace_with<I>(file_paths: I) -> FindFilesIterator<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    FindFilesIterator {
        paths: file_paths.into_iter(),
    }
}

pub struct FindFilesIterator<I> {
    paths: I,
}

impl<I> Iterator for FindFilesIterator<I>
where
    I: Iterator,
    I::Item: AsRef<Path>,
{
    type Item = Result<(String, String)>; // (file_path, content)

    fn next(&mut self) -> Option<Self::Item> {
        for path in &mut self.paths {
            let path_str = path.as_ref().to_string_lossy().to_string();

            match scan_file(&path_str) {
                Ok(Some(content)) => return Some(Ok((path_str, content))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Recursively find model files under `dir_path` that might carry annotations.
pub fn find_model_files_with_replace_with(dir_path: &str) -> Result<Vec<(String, String)>> {
    let mut results = Vec::new();
    visit_directory(Path::new(dir_path), &mut results)?;
    Ok(results)
}

fn visit_directory(dir: &Path, results: &mut Vec<(String, String)>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            // Skip hidden directories and build output
            if let Some(name) = path.file_name() {
                let name = name.to_string_lossy();
                if !name.starts_with('.') && name != "target" {
                    visit_directory(&path, results)?;
                }
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            let path_str = path.to_string_lossy().to_string();
            if let Some(content) = scan_file(&path_str)? {
                results.push((path_str, content));
            }
        }
    }

    Ok(())
}
