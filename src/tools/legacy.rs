//! Boundary wrappers for the legacy decompile/recompile route and the
//! external aligner.
//!
//! The direct binary patch engine is always the primary route. The
//! decompiler/assembler pair exists for patches that need structural edits a
//! layout-preserving rewrite cannot express (inserting instructions, growing
//! pools); its text output is treated as completely opaque — this crate never
//! parses or depends on the intermediate format, it only hands directories
//! across the boundary. The recompiled output is structurally different from
//! the input and is occasionally rejected by the runtime, which is exactly
//! why the binary route is primary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ToolError;
use crate::tools::run_tool;

/// Default deadline for a decompile or assemble run on a large container.
const JAR_TOOL_TIMEOUT: Duration = Duration::from_secs(600);
/// Default deadline for an external aligner run.
const ALIGN_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// The legacy decompiler: bytecode container in, tree of text files out.
#[derive(Debug, Clone)]
pub struct Baksmali {
    /// Path to the tool jar
    pub jar: PathBuf,
    /// Target API level passed through to the tool
    pub api_level: u32,
}

impl Baksmali {
    /// Decompile `container` into `out_dir`.
    ///
    /// # Errors
    /// [`ToolError`] for spawn failure, timeout or nonzero exit.
    pub fn decompile(&self, container: &Path, out_dir: &Path) -> Result<(), ToolError> {
        let jar = self.jar.to_string_lossy();
        let api = self.api_level.to_string();
        let input = container.to_string_lossy();
        let out = out_dir.to_string_lossy();
        run_tool(
            "java",
            &["-jar", &jar, "d", "-a", &api, &input, "-o", &out],
            JAR_TOOL_TIMEOUT,
        )?;
        Ok(())
    }
}

/// The legacy assembler: tree of text files in, bytecode container out.
#[derive(Debug, Clone)]
pub struct Smali {
    /// Path to the tool jar
    pub jar: PathBuf,
    /// Target API level passed through to the tool
    pub api_level: u32,
}

impl Smali {
    /// Assemble `src_dir` into the container at `out`.
    ///
    /// # Errors
    /// [`ToolError`] for spawn failure, timeout or nonzero exit.
    pub fn assemble(&self, src_dir: &Path, out: &Path) -> Result<(), ToolError> {
        let jar = self.jar.to_string_lossy();
        let api = self.api_level.to_string();
        let input = src_dir.to_string_lossy();
        let output = out.to_string_lossy();
        run_tool(
            "java",
            &["-jar", &jar, "a", "-a", &api, &input, "-o", &output],
            JAR_TOOL_TIMEOUT,
        )?;
        Ok(())
    }
}

/// Invoke an external aligner binary over `input`, producing `output` with
/// every stored entry aligned to `alignment` bytes.
///
/// [`crate::archive::rebuild`] is the primary, in-process implementation of
/// this same contract; this wrapper exists for pipelines that want to defer
/// to a platform-provided binary instead.
///
/// # Errors
/// [`ToolError`] for spawn failure, timeout or nonzero exit.
pub fn zipalign(
    tool: &Path,
    input: &Path,
    output: &Path,
    alignment: u32,
) -> Result<(), ToolError> {
    let program = tool.to_string_lossy();
    let align = alignment.to_string();
    let src = input.to_string_lossy();
    let dst = output.to_string_lossy();
    run_tool(&program, &["-p", "-f", &align, &src, &dst], ALIGN_TOOL_TIMEOUT)?;
    Ok(())
}
