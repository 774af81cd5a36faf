//! Call-site suppression and result rewriting.

use log::{debug, warn};

use crate::{
    dex::{
        opcodes::{is_invoke, is_move_result_narrow, CONST_4, INVOKE_STATIC, INVOKE_WIDTH, NOP},
        patch::DexPatcher,
    },
    Result,
};

impl DexPatcher {
    /// Overwrite every `invoke` of the method-table index `method_idx` with
    /// no-op code units.
    ///
    /// Patches the *call site*, not the callee: suppressing calls at the
    /// caller avoids corrupting unrelated classes that implement a
    /// same-named method for their own purposes. Both the register-list and
    /// range invoke encodings are the same fixed 6 bytes, replaced by three
    /// NOP units.
    ///
    /// # Errors
    /// [`crate::FormatError`] from the region walk.
    pub fn nop_call_site(&mut self, method_idx: u32) -> Result<usize> {
        let Ok(target) = u16::try_from(method_idx) else {
            // invoke operands are 16-bit; a wider index cannot appear
            return Ok(0);
        };

        let regions = self.certified_regions()?;
        let mut changed = 0;

        for region in &regions {
            let mut pos = region.insns_off;
            while pos + INVOKE_WIDTH <= region.insns_end() {
                if is_invoke(self.data()[pos]) && self.u16_at(pos + 2) == target {
                    self.bytes_mut()[pos..pos + INVOKE_WIDTH].fill(NOP);
                    changed += 1;
                    debug!(
                        "suppressed call to meth@{target:#06x} at {pos:#010x} in {}->{}",
                        region.class_name, region.method_name
                    );
                    pos += INVOKE_WIDTH;
                } else {
                    pos += 2;
                }
            }
        }

        Ok(changed)
    }

    /// Rewrite the `move-result` that consumes a no-argument
    /// `invoke-static {}, method_idx` into `const/4 reg, #value`.
    ///
    /// The invocation itself is left in place (its side effects may matter);
    /// only the captured result is forced. `move-result` and
    /// `move-result-object` qualify; wide results and destination registers
    /// above v15 are skipped with a warning.
    ///
    /// # Errors
    /// [`crate::FormatError`] from the region walk.
    pub fn rewrite_invoke_result(&mut self, method_idx: u32, value: bool) -> Result<usize> {
        let Ok(target) = u16::try_from(method_idx) else {
            return Ok(0);
        };
        // invoke-static {}, meth — format 35c with zero argument registers
        let pattern: [u8; INVOKE_WIDTH] = {
            let idx = target.to_le_bytes();
            [INVOKE_STATIC, 0x00, idx[0], idx[1], 0x00, 0x00]
        };
        let literal: u8 = u8::from(value);

        let regions = self.certified_regions()?;
        let mut changed = 0;

        for region in &regions {
            let mut pos = region.insns_off;
            while pos + INVOKE_WIDTH + 2 <= region.insns_end() {
                if self.data()[pos..pos + INVOKE_WIDTH] != pattern {
                    pos += 2;
                    continue;
                }

                let result_pos = pos + INVOKE_WIDTH;
                let op = self.data()[result_pos];
                let reg = self.data()[result_pos + 1];
                if is_move_result_narrow(op) {
                    if reg <= 15 {
                        self.bytes_mut()[result_pos] = CONST_4;
                        self.bytes_mut()[result_pos + 1] = (literal << 4) | (reg & 0x0F);
                        changed += 1;
                        debug!(
                            "forced result of meth@{target:#06x} to {literal} at {result_pos:#010x} in {}->{}",
                            region.class_name, region.method_name
                        );
                    } else {
                        warn!(
                            "register v{reg} at {result_pos:#010x} exceeds const/4 range, site skipped"
                        );
                    }
                }
                pos += INVOKE_WIDTH;
            }
        }

        Ok(changed)
    }
}
