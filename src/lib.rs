// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dexpatch
//!
//! A surgical binary patch engine for Android DEX bytecode, paired with an
//! alignment-aware APK/JAR rebuilder. Built in pure Rust, `dexpatch` parses
//! the compiled container in place, locates methods, fields and instructions
//! by semantic name, rewrites selected instructions without disturbing the
//! container's layout, repairs the embedded integrity hashes, and rewrites
//! the surrounding archive so the host runtime's uncompressed-and-aligned
//! mandate keeps holding — all without invoking a decompiler/recompiler
//! toolchain.
//!
//! ## Features
//!
//! - **🔍 In-place container parsing** - Bounds-checked header and table
//!   parsing; malformed input is rejected, never partially trusted
//! - **🧭 Certified instruction scanning** - Patchers only ever scan byte
//!   ranges certified as instruction streams by the class-data walker
//! - **🔧 Layout-preserving patches** - Method stubbing, field-load and
//!   string-reference rewriting, call-site suppression — all same-width
//! - **🛡️ Integrity repair** - The embedded SHA-1 digest and Adler-32
//!   checksum are recomputed after every mutation
//! - **📦 Aligned archive rebuilds** - Must-store entries come out
//!   uncompressed with 4-byte-aligned data regions, verified from raw bytes
//! - **↩️ All-or-nothing runs** - A one-time backup plus restore-on-failure
//!   leaves every archive either fully patched and verified, or untouched
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dexpatch::prelude::*;
//!
//! let registry = ProfileRegistry::builtin();
//! let profile = registry.get("systemui-volte").expect("built-in profile");
//!
//! let patcher = ApkPatcher::new();
//! let summary = patcher.patch("MiuiSystemUI.apk".as_ref(), profile)?;
//! if summary.is_noop() {
//!     println!("nothing to do for this archive");
//! }
//! # Ok::<(), dexpatch::Error>(())
//! ```
//!
//! ### Patching one container directly
//!
//! ```rust,no_run
//! use dexpatch::dex::patch::{DexPatcher, StubOptions};
//! use dexpatch::dex::locate::ClassMatch;
//!
//! let bytes = std::fs::read("classes.dex")?;
//! let mut patcher = DexPatcher::new(bytes)?;
//! patcher.stub_method(
//!     "Lcom/android/settings/InternalDeviceUtils;",
//!     "isAiSupported",
//!     ClassMatch::Exact,
//!     &[0x12, 0x10, 0x0F, 0x00], // const/4 v0, #1; return v0
//!     &StubOptions::default(),
//! )?;
//! let patched = patcher.finish()?; // snapshot check + checksum repair
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`dex`] - Container parsing, the certified code-region walker, locators,
//!   instruction patchers and integrity repair
//! - [`archive`] - Archive reading, the aligning rebuilder, verification and
//!   inspection
//! - [`patcher`] - The per-archive orchestration pipeline and the profile
//!   registry
//! - [`tools`] - Blocking subprocess wrappers for the optional external
//!   collaborators (legacy decompiler route, external aligner)
//! - [`Error`] and [`Result`] - Error handling across all of the above
//!
//! ## Error Handling
//!
//! Each layer has a focused error enum ([`FormatError`], [`PatchError`],
//! [`IntegrityError`], [`ArchiveError`], [`ToolError`]); the umbrella
//! [`Error`] carries any of them through the crate-wide [`Result`]. Two
//! outcomes are deliberately *not* errors: a locator finding nothing, and a
//! patch operation changing zero sites. Both are normal when one profile is
//! run across a whole ROM.

#[macro_use]
pub(crate) mod error;

/// File access and low-level binary I/O.
pub mod file;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// DEX container parsing, walking, locating and patching.
pub mod dex;

/// Archive reading, aligned rebuilding, verification and inspection.
pub mod archive;

/// The per-archive patch pipeline and profile registry.
pub mod patcher;

/// Subprocess wrappers for external collaborator tools.
pub mod tools;

/// `dexpatch` Result type, used for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::{ArchiveError, Error, FormatError, IntegrityError, PatchError, ToolError};

pub use dex::{CodeRegion, DexFile, DexHeader, DexPatcher};
pub use file::parser::Parser;
pub use patcher::{ApkPatcher, PatchProfile, ProfileRegistry};
