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

// Test modules
#[cfg(test)]
mod test_check;
#[cfg(test)]
mod test_type_arguments;

#[cfg(test)]
pub mod test_utils {
    use std::fs;
    use tempfile::TempDir;

    /// Test context that manages temporary model files
    pub struct TestContext {
        _temp_dir: TempDir,
        pub file_path: String,
    }

    impl TestContext {
        /// Create a new test context with a temporary model file
        pub fn new(content: &str) -> Self {
            Self::new_with_file_name(content, "model")
        }

        /// Create a new test context with a specific file name
        pub fn new_with_file_name(content: &str, file_name: &str) -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let file_path = temp_dir.path().join(format!("{}.json", file_name));

            fs::write(&file_path, content).expect("Failed to write test file");

            TestContext {
                _temp_dir: temp_dir,
                file_path: file_path.to_string_lossy().to_string(),
            }
        }
    }
}
