// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Include-path resolution and the include stack.
//!
//! `!source` pushes files onto a stack; a file already on the stack means a
//! recursive include cycle. Search order: the `-I` directories left to
//! right, then the directory of the including file, then the working
//! directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug)]
pub enum FileError {
    NotFound(String),
    Cycle(String),
    DepthExceeded(usize),
    Io(PathBuf, io::Error),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileError::NotFound(name) => write!(f, "File not found: {name}"),
            FileError::Cycle(name) => write!(f, "Recursive include: {name}"),
            FileError::DepthExceeded(max) => {
                write!(f, "Include depth exceeded (max {max})")
            }
            FileError::Io(path, err) => write!(f, "Cannot read {}: {err}", path.display()),
        }
    }
}

impl std::error::Error for FileError {}

#[derive(Debug, Default)]
pub struct FileManager {
    search_paths: Vec<PathBuf>,
    stack: Vec<PathBuf>,
    max_depth: usize,
}

impl FileManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            stack: Vec::new(),
            max_depth: MAX_INCLUDE_DEPTH,
        }
    }

    /// Append an `-I` search directory; earlier additions win.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    /// Clear the include stack between passes.
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    /// The file currently being read, if any.
    #[must_use]
    pub fn current_file(&self) -> Option<&Path> {
        self.stack.last().map(PathBuf::as_path)
    }

    /// Locate a file by the include search rules.
    pub fn find(&self, name: &str) -> Result<PathBuf, FileError> {
        let direct = PathBuf::from(name);
        if direct.is_absolute() && direct.is_file() {
            return Ok(direct);
        }
        for dir in &self.search_paths {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        if let Some(current) = self.current_file() {
            if let Some(dir) = current.parent() {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        if direct.is_file() {
            return Ok(direct);
        }
        Err(FileError::NotFound(name.to_string()))
    }

    /// Push a source file onto the include stack and return its lines.
    pub fn push_source(&mut self, name: &str) -> Result<Vec<String>, FileError> {
        if self.stack.len() >= self.max_depth {
            return Err(FileError::DepthExceeded(self.max_depth));
        }
        let path = self.find(name)?;
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if self.stack.contains(&canonical) {
            return Err(FileError::Cycle(name.to_string()));
        }
        let text =
            fs::read_to_string(&path).map_err(|err| FileError::Io(path.clone(), err))?;
        self.stack.push(canonical);
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Pop the innermost include when its lines are exhausted.
    pub fn pop_source(&mut self) {
        self.stack.pop();
    }

    /// Read raw bytes for `!binary`, honoring the optional size and skip.
    pub fn read_binary(
        &self,
        name: &str,
        size: Option<usize>,
        skip: usize,
    ) -> Result<Vec<u8>, FileError> {
        let path = self.find(name)?;
        let mut data = fs::read(&path).map_err(|err| FileError::Io(path.clone(), err))?;
        if skip > 0 {
            if skip >= data.len() {
                return Err(FileError::Io(
                    path,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("Skip offset {skip} exceeds file size {}", data.len()),
                    ),
                ));
            }
            data.drain(..skip);
        }
        if let Some(size) = size {
            if size > data.len() {
                return Err(FileError::Io(
                    path,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("Requested size {size} exceeds available data {}", data.len()),
                    ),
                ));
            }
            data.truncate(size);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mosforge-files-{label}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_files_through_search_paths() {
        let dir = temp_dir("search");
        let path = dir.join("inc.asm");
        File::create(&path).unwrap().write_all(b"rts\n").unwrap();

        let mut fm = FileManager::new();
        assert!(matches!(fm.find("inc.asm"), Err(FileError::NotFound(_))));
        fm.add_search_path(&dir);
        assert_eq!(fm.find("inc.asm").unwrap(), path);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn detects_include_cycles() {
        let dir = temp_dir("cycle");
        let path = dir.join("self.asm");
        File::create(&path).unwrap().write_all(b"nop\n").unwrap();

        let mut fm = FileManager::new();
        fm.add_search_path(&dir);
        let lines = fm.push_source("self.asm").unwrap();
        assert_eq!(lines, vec!["nop".to_string()]);
        assert!(matches!(
            fm.push_source("self.asm"),
            Err(FileError::Cycle(_))
        ));
        fm.pop_source();
        assert!(fm.push_source("self.asm").is_ok());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn binary_size_and_skip() {
        let dir = temp_dir("bin");
        let path = dir.join("data.bin");
        File::create(&path)
            .unwrap()
            .write_all(&[1, 2, 3, 4, 5])
            .unwrap();

        let mut fm = FileManager::new();
        fm.add_search_path(&dir);
        assert_eq!(fm.read_binary("data.bin", None, 0).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(fm.read_binary("data.bin", Some(2), 1).unwrap(), vec![2, 3]);
        assert!(fm.read_binary("data.bin", Some(9), 0).is_err());
        assert!(fm.read_binary("data.bin", None, 9).is_err());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn depth_limit_enforced() {
        let mut fm = FileManager::new();
        fm.set_max_depth(0);
        assert!(matches!(
            fm.push_source("whatever.asm"),
            Err(FileError::DepthExceeded(0))
        ));
    }
}
