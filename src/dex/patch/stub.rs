//! Method-body replacement.

use log::{info, warn};

use crate::{
    dex::{
        locate::{find_method, ClassMatch},
        patch::DexPatcher,
        walker::{
            CodeRegion, CODE_DEBUG_INFO_OFFSET, CODE_INSNS_SIZE_OFFSET, CODE_INS_OFFSET,
            CODE_OUTS_OFFSET, CODE_REGISTERS_OFFSET, CODE_TRIES_OFFSET,
        },
    },
    error::PatchError,
    Result,
};

/// Options controlling a method-body replacement.
#[derive(Debug, Clone)]
pub struct StubOptions {
    /// Registers the replacement needs for its own locals.
    ///
    /// The final registers-needed count is the maximum of this and the
    /// incoming-parameter count — parameter registers occupy the top of the
    /// register window and must stay valid regardless of what the stub does.
    pub registers: u16,
    /// Trim mode: rewrite the declared instruction length to exactly the
    /// replacement's unit count instead of NOP-padding to the original
    /// length.
    ///
    /// Pad mode (the default) keeps the file layout byte-identical and is
    /// required while other structures reference the region by relative
    /// position. Trim mode is for containers whose disassembly must not show
    /// padding after the replacement.
    pub trim: bool,
}

impl Default for StubOptions {
    fn default() -> Self {
        StubOptions {
            registers: 2,
            trim: false,
        }
    }
}

impl DexPatcher {
    /// Replace the body of the method at `region` with `replacement`.
    ///
    /// The stub makes no calls and handles no exceptions, so the
    /// outgoing-argument count and exception-table size are zeroed, as is the
    /// debug-info offset (line numbers are meaningless for injected code).
    ///
    /// # Errors
    /// [`PatchError::StubTooLarge`] if `replacement` exceeds the region's
    /// declared length; [`PatchError::UnitMisaligned`] for a trim-mode
    /// replacement that is not a whole number of code units.
    pub fn stub_region(
        &mut self,
        region: &CodeRegion,
        replacement: &[u8],
        options: &StubOptions,
    ) -> Result<()> {
        if replacement.len() > region.insns_len {
            return Err(PatchError::StubTooLarge {
                have: region.insns_len,
                need: replacement.len(),
            }
            .into());
        }
        if options.trim && replacement.len() % 2 != 0 {
            return Err(PatchError::UnitMisaligned {
                len: replacement.len(),
            }
            .into());
        }

        let code_off = region.code_off;

        let ins_size = self.u16_at(code_off + CODE_INS_OFFSET);
        self.put_u16(
            code_off + CODE_REGISTERS_OFFSET,
            options.registers.max(ins_size),
        );
        self.put_u16(code_off + CODE_OUTS_OFFSET, 0);
        self.put_u16(code_off + CODE_TRIES_OFFSET, 0);
        self.put_u32(code_off + CODE_DEBUG_INFO_OFFSET, 0);

        let insns = &mut self.bytes_mut()[region.insns_off..region.insns_end()];
        insns[..replacement.len()].copy_from_slice(replacement);
        // NOP-fill the remainder; in trim mode these bytes fall outside the
        // declared length but are zeroed anyway so no stale code lingers
        insns[replacement.len()..].fill(0);

        if options.trim {
            self.put_u32(
                code_off + CODE_INSNS_SIZE_OFFSET,
                (replacement.len() / 2) as u32,
            );
        }

        Ok(())
    }

    /// Replace the body of `(class_desc, method_name)`, located by name.
    ///
    /// Returns the number of sites changed: 1 when the method was found and
    /// stubbed, 0 when it is absent from this container (a normal outcome —
    /// the caller leaves the entry untouched).
    ///
    /// # Errors
    /// As [`DexPatcher::stub_region`], plus any [`crate::FormatError`] from
    /// the lookup.
    pub fn stub_method(
        &mut self,
        class_desc: &str,
        method_name: &str,
        mode: ClassMatch,
        replacement: &[u8],
        options: &StubOptions,
    ) -> Result<usize> {
        let region = {
            let view = self.view()?;
            find_method(&view, class_desc, method_name, mode)?
        };

        match region {
            Some(region) => {
                self.stub_region(&region, replacement, options)?;
                info!(
                    "stubbed {}->{} ({} byte replacement into {} byte region)",
                    region.class_name,
                    region.method_name,
                    replacement.len(),
                    region.insns_len
                );
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Stub every method whose name contains `name_contains`, optionally
    /// restricted to classes whose descriptor contains `class_contains`.
    ///
    /// Vendor builds rename feature-gate methods between sub-versions
    /// (`isAiSupported`, `isAiFeatureSupported`, ...), so profiles match them
    /// by fragment rather than pinning one exact name. With `skip_void` set,
    /// methods whose proto shorty declares a `void` return are left alone —
    /// a value-returning replacement would corrupt them.
    ///
    /// Regions too small for the replacement are skipped with a warning
    /// rather than failing the whole sweep.
    ///
    /// # Errors
    /// [`crate::FormatError`] from the region walk or proto lookups.
    pub fn stub_methods_matching(
        &mut self,
        class_contains: Option<&str>,
        name_contains: &str,
        skip_void: bool,
        replacement: &[u8],
        options: &StubOptions,
    ) -> Result<usize> {
        let regions: Vec<CodeRegion> = {
            let view = self.view()?;
            let mut selected = Vec::new();
            for region in crate::dex::walker::walk_code_regions(&view) {
                if let Some(fragment) = class_contains {
                    if !region.class_name.contains(fragment) {
                        continue;
                    }
                }
                if !region.method_name.contains(name_contains) {
                    continue;
                }
                if skip_void {
                    let method = view.method_id_at(region.method_idx)?;
                    let shorty = view.shorty_at(u32::from(method.proto_idx))?;
                    if shorty.starts_with('V') {
                        continue;
                    }
                }
                selected.push(region);
            }
            selected
        };

        let mut changed = 0;
        for region in &regions {
            if replacement.len() > region.insns_len {
                warn!(
                    "{}->{}: region of {} bytes too small for {} byte stub, skipped",
                    region.class_name,
                    region.method_name,
                    region.insns_len,
                    replacement.len()
                );
                continue;
            }
            self.stub_region(region, replacement, options)?;
            info!("stubbed {}->{}", region.class_name, region.method_name);
            changed += 1;
        }

        Ok(changed)
    }
}
