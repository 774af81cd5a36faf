//! Static-field load rewriting.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::{
    dex::{
        opcodes::{is_sget, CONST_16, CONST_4, NOP, SGET_WIDTH},
        patch::{DexPatcher, SiteFilter},
    },
    error::PatchError,
    Result,
};

/// Which same-width constant encoding replaces a rewritten field load.
///
/// Both forms occupy the same 4 bytes as the `sget` they replace and keep the
/// destination register, so the rewrite never moves an offset. Selection is
/// an explicit caller decision, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstEncoding {
    /// `const/4` followed by a `nop` unit. Only reaches registers v0..v15 and
    /// literals -8..=7; sites with a wider destination register are skipped
    /// with a warning.
    Const4Nop,
    /// `const/16` with a 16-bit literal. Reaches registers v0..v255.
    Const16,
}

/// Configuration of the supplementary raw-byte pass.
///
/// The certified walk is the primary and default scan. This pass exists only
/// to catch methods the walk missed due to non-standard encodings; it runs
/// over the byte range after the last static table and skips every certified
/// region, so it can never overlap bytes the primary pass already owns.
/// Re-runs are idempotent because rewritten sites no longer carry the source
/// opcode.
///
/// The default start offset — the end of the class-definition table — is a
/// heuristic inherited from observed compiler output, not a format
/// guarantee, which is why it is an adjustable field.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawScanOptions {
    /// Scan start offset; `None` selects the end of the class-definition
    /// table.
    pub start: Option<usize>,
}

impl DexPatcher {
    /// Rewrite every static-field load of a field in `targets` into a
    /// same-width constant load of `value`.
    ///
    /// Scans only certified code regions (optionally narrowed by `filter`)
    /// in 2-byte code-unit steps. Any member of the `sget` opcode family
    /// whose field operand is in `targets` is rewritten in place, preserving
    /// the destination register. Running the same rewrite twice reports zero
    /// additional sites — rewritten instructions no longer match the source
    /// opcode.
    ///
    /// Pass `raw_scan` to additionally run the supplementary raw-byte pass
    /// described on [`RawScanOptions`].
    ///
    /// # Errors
    /// [`PatchError::LiteralOutOfRange`] when `value` does not fit the
    /// selected encoding; [`crate::FormatError`] from the region walk.
    pub fn rewrite_sget_to_const(
        &mut self,
        targets: &BTreeSet<u32>,
        value: i16,
        encoding: ConstEncoding,
        filter: &SiteFilter,
        raw_scan: Option<RawScanOptions>,
    ) -> Result<usize> {
        if encoding == ConstEncoding::Const4Nop && !(-8..=7).contains(&value) {
            return Err(PatchError::LiteralOutOfRange {
                value: i32::from(value),
                encoding: "const/4",
            }
            .into());
        }
        if targets.is_empty() {
            return Ok(0);
        }

        let regions = self.certified_regions()?;
        let mut changed = 0;

        for region in regions.iter().filter(|r| filter.admits(r)) {
            let mut pos = region.insns_off;
            while pos + SGET_WIDTH <= region.insns_end() {
                if self.rewrite_sget_at(pos, targets, value, encoding) {
                    changed += 1;
                }
                pos += 2;
            }
        }

        if let Some(options) = raw_scan {
            changed += self.raw_scan_sget(targets, value, encoding, &regions, options)?;
        }

        Ok(changed)
    }

    /// Redirect a static-field load from one field identity to another.
    ///
    /// Rewrites the field-index operand of `sget` family instructions from
    /// `from` to `to` — same instruction family, same width — scoped to one
    /// (class, method) pair. Used to point a boolean check at a semantically
    /// different flag without altering control flow.
    ///
    /// # Errors
    /// [`crate::FormatError`] from the region walk.
    pub fn swap_field_reference(
        &mut self,
        from: u16,
        to: u16,
        class_desc: &str,
        method_name: &str,
    ) -> Result<usize> {
        let regions = self.certified_regions()?;
        let filter = SiteFilter::in_method(class_desc, method_name);
        let mut changed = 0;

        for region in regions.iter().filter(|r| filter.admits(r)) {
            let mut pos = region.insns_off;
            while pos + SGET_WIDTH <= region.insns_end() {
                if is_sget(self.data()[pos]) && self.u16_at(pos + 2) == from {
                    self.put_u16(pos + 2, to);
                    changed += 1;
                    debug!(
                        "swapped field ref {from:#06x} -> {to:#06x} at {pos:#010x} in {}->{}",
                        region.class_name, region.method_name
                    );
                }
                pos += 2;
            }
        }

        Ok(changed)
    }

    /// Rewrite one candidate site; returns whether it matched and changed.
    fn rewrite_sget_at(
        &mut self,
        pos: usize,
        targets: &BTreeSet<u32>,
        value: i16,
        encoding: ConstEncoding,
    ) -> bool {
        let op = self.data()[pos];
        if !is_sget(op) {
            return false;
        }
        if !targets.contains(&u32::from(self.u16_at(pos + 2))) {
            return false;
        }

        let reg = self.data()[pos + 1];
        match encoding {
            ConstEncoding::Const4Nop => {
                if reg > 15 {
                    warn!("register v{reg} at {pos:#010x} exceeds const/4 range, site skipped");
                    return false;
                }
                let packed = (((value as u8) & 0x0F) << 4) | (reg & 0x0F);
                self.bytes_mut()[pos] = CONST_4;
                self.bytes_mut()[pos + 1] = packed;
                self.bytes_mut()[pos + 2] = NOP;
                self.bytes_mut()[pos + 3] = NOP;
            }
            ConstEncoding::Const16 => {
                self.bytes_mut()[pos] = CONST_16;
                self.put_u16(pos + 2, value as u16);
            }
        }
        debug!("rewrote sget {op:#04x} at {pos:#010x} to const v{reg}, #{value}");
        true
    }

    /// The supplementary raw-byte pass: single-byte steps over the range
    /// after the static tables, skipping certified regions entirely.
    fn raw_scan_sget(
        &mut self,
        targets: &BTreeSet<u32>,
        value: i16,
        encoding: ConstEncoding,
        regions: &[crate::dex::walker::CodeRegion],
        options: RawScanOptions,
    ) -> Result<usize> {
        let start = match options.start {
            Some(start) => start,
            None => self.view()?.header().class_defs_end(),
        };

        let mut certified: Vec<(usize, usize)> = regions
            .iter()
            .map(|r| (r.insns_off, r.insns_end()))
            .collect();
        certified.sort_unstable();

        let mut changed = 0;
        let mut pos = start;
        while pos + SGET_WIDTH <= self.data().len() {
            if let Some(&(_, end)) = certified
                .iter()
                .find(|&&(begin, end)| pos >= begin && pos < end)
            {
                pos = end;
                continue;
            }
            if self.rewrite_sget_at(pos, targets, value, encoding) {
                changed += 1;
                pos += SGET_WIDTH;
            } else {
                pos += 1;
            }
        }

        if changed > 0 {
            warn!("supplementary raw scan rewrote {changed} site(s) outside certified regions");
        }
        Ok(changed)
    }
}
