//! Shared test utilities for integration tests.
//!
//! Provides an in-memory NAR builder, a decoder that turns patched output
//! back into a tree, and a scripted executable tool.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::cell::RefCell;

use narpatch::format::{NAR_VERSION_MAGIC, token};
use narpatch::{
    EditRequest, ExecutableTool, Error, NoTool, PatchContext, PatchReport, Patcher, Query,
    Result, TokenReader, TokenWriter,
};

/// A filesystem tree node as carried by a NAR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Regular { executable: bool, contents: Vec<u8> },
    Symlink { target: Vec<u8> },
    Directory { entries: Vec<(Vec<u8>, Node)> },
}

impl Node {
    pub fn file(contents: impl Into<Vec<u8>>) -> Self {
        Node::Regular {
            executable: false,
            contents: contents.into(),
        }
    }

    pub fn executable(contents: impl Into<Vec<u8>>) -> Self {
        Node::Regular {
            executable: true,
            contents: contents.into(),
        }
    }

    pub fn symlink(target: impl Into<Vec<u8>>) -> Self {
        Node::Symlink {
            target: target.into(),
        }
    }

    pub fn dir(entries: Vec<(&str, Node)>) -> Self {
        Node::Directory {
            entries: entries
                .into_iter()
                .map(|(name, node)| (name.as_bytes().to_vec(), node))
                .collect(),
        }
    }

    /// Looks up a node by `/`-separated path below this one.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut node = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match node {
                Node::Directory { entries } => {
                    node = entries
                        .iter()
                        .find(|(name, _)| name == part.as_bytes())
                        .map(|(_, child)| child)?;
                }
                _ => return None,
            }
        }
        Some(node)
    }

    /// Returns the contents of a regular file at `path`.
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        match self.get(path)? {
            Node::Regular { contents, .. } => Some(contents),
            _ => None,
        }
    }

    /// Returns the target of a symlink at `path`.
    pub fn target(&self, path: &str) -> Option<&[u8]> {
        match self.get(path)? {
            Node::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

fn write_node(writer: &mut TokenWriter<Vec<u8>>, node: &Node) -> Result<()> {
    writer.write_string(token::OPEN)?;
    writer.write_string(token::TYPE)?;
    match node {
        Node::Regular {
            executable,
            contents,
        } => {
            writer.write_string(token::REGULAR)?;
            if *executable {
                writer.write_string(token::EXECUTABLE)?;
                writer.write_string(b"")?;
            }
            writer.write_string(token::CONTENTS)?;
            writer.write_string(contents)?;
        }
        Node::Symlink { target } => {
            writer.write_string(token::SYMLINK)?;
            writer.write_string(token::TARGET)?;
            writer.write_string(target)?;
        }
        Node::Directory { entries } => {
            writer.write_string(token::DIRECTORY)?;
            for (name, child) in entries {
                writer.write_string(token::ENTRY)?;
                writer.write_string(token::OPEN)?;
                writer.write_string(token::NAME)?;
                writer.write_string(name)?;
                writer.write_string(token::NODE)?;
                write_node(writer, child)?;
                writer.write_string(token::CLOSE)?;
            }
        }
    }
    writer.write_string(token::CLOSE)
}

/// Serializes a tree into NAR bytes.
pub fn encode(root: &Node) -> Vec<u8> {
    let mut writer = TokenWriter::new(Vec::new());
    writer.write_string(NAR_VERSION_MAGIC).unwrap();
    write_node(&mut writer, root).unwrap();
    writer.into_inner()
}

/// Serializes a raw token sequence, for hand-built malformed input.
pub fn encode_tokens(tokens: &[&[u8]]) -> Vec<u8> {
    let mut writer = TokenWriter::new(Vec::new());
    for t in tokens {
        writer.write_string(t).unwrap();
    }
    writer.into_inner()
}

fn read_node(reader: &mut TokenReader<&[u8]>) -> Result<Node> {
    reader.expect(token::OPEN)?;
    reader.expect(token::TYPE)?;
    let offset = reader.position();
    let tag = reader.read_string()?;
    let node = match tag.as_slice() {
        token::REGULAR => {
            let mut next = reader.read_string()?;
            let executable = next == token::EXECUTABLE;
            if executable {
                reader.expect(b"")?;
                next = reader.read_string()?;
            }
            assert_eq!(next, token::CONTENTS);
            Node::Regular {
                executable,
                contents: reader.read_string()?,
            }
        }
        token::SYMLINK => {
            reader.expect(token::TARGET)?;
            Node::Symlink {
                target: reader.read_string()?,
            }
        }
        token::DIRECTORY => {
            let mut entries = Vec::new();
            loop {
                let next = reader.read_string()?;
                if next == token::CLOSE {
                    return Ok(Node::Directory { entries });
                }
                assert_eq!(next, token::ENTRY);
                reader.expect(token::OPEN)?;
                reader.expect(token::NAME)?;
                let name = reader.read_string()?;
                reader.expect(token::NODE)?;
                let child = read_node(reader)?;
                reader.expect(token::CLOSE)?;
                entries.push((name, child));
            }
        }
        _ => return Err(Error::unknown_node_type(&tag, offset)),
    };
    reader.expect(token::CLOSE)?;
    Ok(node)
}

/// Parses NAR bytes back into a tree.
pub fn decode(bytes: &[u8]) -> Node {
    let mut reader = TokenReader::new(bytes);
    reader.expect(NAR_VERSION_MAGIC).unwrap();
    let root = read_node(&mut reader).unwrap();
    assert!(reader.at_end().unwrap(), "decoder left trailing bytes");
    root
}

/// The context most tests use: prefix `/data/x`, default store.
pub fn ctx() -> PatchContext {
    PatchContext::builder(
        "/data/x",
        "/nix/store/new-glibc",
        "/nix/store/new-gcc-lib",
    )
    .old_glibc("/nix/store/old-glibc")
    .old_gcc_lib("/nix/store/old-gcc-lib")
    .build()
    .unwrap()
}

/// Runs `input` through a patcher that leaves executables alone.
pub fn patch(input: &[u8]) -> Result<(Vec<u8>, PatchReport)> {
    patch_with(&NoTool, input)
}

/// Runs `input` through a patcher using `tool`.
pub fn patch_with<T: ExecutableTool>(tool: T, input: &[u8]) -> Result<(Vec<u8>, PatchReport)> {
    let patcher = Patcher::new(ctx(), tool);
    let mut output = Vec::new();
    let report = patcher.process(input, &mut output)?;
    Ok((output, report))
}

/// Bytes that pass the ELF magic check and the dynamic-section heuristic.
pub fn dynamic_elf(tag: &str) -> Vec<u8> {
    let mut bytes = b"\x7fELF\x02\x01\x01\0".to_vec();
    bytes.extend_from_slice(b".interp\0.dynamic\0");
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

/// Bytes with the ELF magic but no dynamic-section markers.
pub fn static_elf() -> Vec<u8> {
    b"\x7fELF\x02\x01\x01\0static payload".to_vec()
}

/// An executable tool driven by fixed answers.
///
/// Edited content gets the requested interpreter and RPATH appended, so the
/// output shows exactly which edits were applied.
#[derive(Default)]
pub struct ScriptedTool {
    pub interpreter: Option<String>,
    pub rpath: Option<String>,
    pub fail_queries: bool,
    pub fail_apply: bool,
    pub queries: RefCell<usize>,
    pub applied: RefCell<Vec<EditRequest>>,
}

impl ScriptedTool {
    pub fn new(interpreter: Option<&str>, rpath: Option<&str>) -> Self {
        Self {
            interpreter: interpreter.map(str::to_string),
            rpath: rpath.map(str::to_string),
            ..Default::default()
        }
    }

    fn answer(&self, value: &Option<String>) -> Query {
        *self.queries.borrow_mut() += 1;
        if self.fail_queries {
            return Query::Failed(Error::Tool("tool not found".into()));
        }
        match value {
            Some(v) => Query::Found(v.clone()),
            None => Query::Absent,
        }
    }
}

impl ExecutableTool for ScriptedTool {
    fn interpreter(&self, _content: &[u8]) -> Query {
        self.answer(&self.interpreter)
    }

    fn rpath(&self, _content: &[u8]) -> Query {
        self.answer(&self.rpath)
    }

    fn apply(&self, content: &[u8], request: &EditRequest) -> Result<Vec<u8>> {
        self.applied.borrow_mut().push(request.clone());
        if self.fail_apply {
            return Err(Error::Tool("patchelf: cannot find section".into()));
        }
        let mut out = content.to_vec();
        if let Some(interpreter) = &request.interpreter {
            out.extend_from_slice(b"|interp=");
            out.extend_from_slice(interpreter.as_bytes());
        }
        if let Some(rpath) = &request.rpath {
            out.extend_from_slice(b"|rpath=");
            out.extend_from_slice(rpath.as_bytes());
        }
        Ok(out)
    }
}
