//! String-literal reference swaps.

use log::debug;

use crate::{
    dex::{
        locate::find_string_index,
        opcodes::{CONST_STRING, CONST_STRING_JUMBO, CONST_STRING_JUMBO_WIDTH, CONST_STRING_WIDTH},
        patch::DexPatcher,
    },
    error::PatchError,
    Result,
};

impl DexPatcher {
    /// Rewrite every string-constant load of pool index `from` to load pool
    /// index `to` instead.
    ///
    /// Both the short (`const-string`, 4 bytes) and jumbo
    /// (`const-string/jumbo`, 6 bytes) encodings are handled; each keeps its
    /// own width and destination register. The replacement index must already
    /// exist in the pool — growing the pool would shift every subsequent
    /// table and invalidate every previously computed offset, which this
    /// engine deliberately never does.
    ///
    /// # Errors
    /// [`PatchError::StringIndexTooWide`] if `to` cannot be encoded into a
    /// short-form site that references `from`; [`crate::FormatError`] from
    /// the region walk.
    pub fn swap_string_reference(&mut self, from: u32, to: u32) -> Result<usize> {
        let regions = self.certified_regions()?;
        let mut changed = 0;

        for region in &regions {
            let mut pos = region.insns_off;
            while pos + 2 <= region.insns_end() {
                let op = self.data()[pos];
                if op == CONST_STRING && pos + CONST_STRING_WIDTH <= region.insns_end() {
                    if u32::from(self.u16_at(pos + 2)) == from {
                        let narrow = u16::try_from(to)
                            .map_err(|_| PatchError::StringIndexTooWide { index: to })?;
                        self.put_u16(pos + 2, narrow);
                        changed += 1;
                        debug!(
                            "swapped const-string {from} -> {to} at {pos:#010x} in {}->{}",
                            region.class_name, region.method_name
                        );
                    }
                } else if op == CONST_STRING_JUMBO
                    && pos + CONST_STRING_JUMBO_WIDTH <= region.insns_end()
                    && self.u32_at(pos + 2) == from
                {
                    self.put_u32(pos + 2, to);
                    changed += 1;
                    debug!(
                        "swapped const-string/jumbo {from} -> {to} at {pos:#010x} in {}->{}",
                        region.class_name, region.method_name
                    );
                }
                pos += 2;
            }
        }

        Ok(changed)
    }

    /// Rewrite loads of the literal `from` to load the literal `to`, looking
    /// both strings up in the pool first.
    ///
    /// Returns 0 when `from` is not in the pool at all (nothing can
    /// reference it).
    ///
    /// # Errors
    /// [`PatchError::TargetNotFound`] when `to` is absent from the pool — the
    /// pool is never grown; [`crate::FormatError`] from lookups.
    pub fn swap_string_literal(&mut self, from: &str, to: &str) -> Result<usize> {
        let (from_idx, to_idx) = {
            let view = self.view()?;
            let from_idx = find_string_index(&view, from)?;
            let to_idx = find_string_index(&view, to)?;
            (from_idx, to_idx)
        };

        let Some(from_idx) = from_idx else {
            return Ok(0);
        };
        let Some(to_idx) = to_idx else {
            return Err(PatchError::TargetNotFound {
                target: format!("replacement string literal {to:?}"),
            }
            .into());
        };

        self.swap_string_reference(from_idx, to_idx)
    }
}
