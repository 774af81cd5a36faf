//! Patch profiles and the profile registry.
//!
//! A profile pairs a set of *signature strings* — substrings whose presence in
//! a container's raw bytes makes it worth a structured parse at all — with the
//! list of patch operations to run against matching containers. Profiles are
//! plain data: the registry is an explicit map constructed at startup and
//! passed by reference into the orchestrator, so there is no process-wide
//! mutable state anywhere in the pipeline.

use std::collections::BTreeMap;

use crate::{
    dex::{
        locate::{find_field_indices, find_method_index, ClassMatch},
        patch::{ConstEncoding, DexPatcher, SiteFilter, StubOptions},
    },
    error::PatchError,
    Result,
};

/// `const/4 v0, #1; return v0` — the canonical "return true" body.
pub const RETURN_TRUE: &[u8] = &[0x12, 0x10, 0x0F, 0x00];
/// `const/4 v0, #0; return v0` — the canonical "return false" body.
pub const RETURN_FALSE: &[u8] = &[0x12, 0x00, 0x0F, 0x00];
/// `return-void`.
pub const RETURN_VOID: &[u8] = &[0x0E, 0x00];

/// One data-driven patch operation.
///
/// Every variant resolves its semantic names against the container it is
/// applied to and reports the number of sites changed; zero means the target
/// simply is not present in that container.
#[derive(Debug, Clone)]
pub enum PatchOp {
    /// Replace the body of one named method.
    StubMethod {
        /// Class descriptor, e.g. `Lcom/android/settings/Utils;`
        class: String,
        /// Method name
        method: String,
        /// Class match mode
        mode: ClassMatch,
        /// Replacement instruction bytes
        replacement: Vec<u8>,
        /// Register/trim options
        options: StubOptions,
    },

    /// Replace the bodies of all methods matching a name fragment.
    StubMethodsNamed {
        /// Restrict to classes whose descriptor contains this fragment
        class_contains: Option<String>,
        /// Method-name fragment to match
        name_contains: String,
        /// Leave methods with a `void` return untouched
        skip_void: bool,
        /// Replacement instruction bytes
        replacement: Vec<u8>,
        /// Register/trim options
        options: StubOptions,
    },

    /// Rewrite loads of a static field into constant loads.
    FieldToConst {
        /// Class descriptor owning the field
        class: String,
        /// Field name
        field: String,
        /// Immediate value to load instead
        value: i16,
        /// Which same-width constant encoding to emit
        encoding: ConstEncoding,
        /// Optional class/method scope
        filter: SiteFilter,
    },

    /// Redirect loads of one static field to another field.
    SwapFieldReference {
        /// Class descriptor owning both fields
        field_class: String,
        /// Field currently referenced
        from_field: String,
        /// Field to reference instead
        to_field: String,
        /// Class whose method is rewritten
        in_class: String,
        /// Method that is rewritten
        in_method: String,
    },

    /// Redirect loads of one string literal to another existing literal.
    SwapString {
        /// Literal currently loaded
        from: String,
        /// Literal to load instead; must already be in the pool
        to: String,
    },

    /// Overwrite every call to a method with no-op units.
    NopCallSite {
        /// Class descriptor owning the callee
        class: String,
        /// Callee name
        method: String,
        /// Proto shorty to disambiguate overloads, e.g. `ZL`
        shorty: Option<String>,
    },

    /// Force the captured result of a no-argument static call to a boolean.
    ForceCallResult {
        /// Class descriptor owning the callee
        class: String,
        /// Callee name
        method: String,
        /// Proto shorty to disambiguate overloads
        shorty: Option<String>,
        /// The boolean the caller should observe
        value: bool,
    },
}

impl PatchOp {
    /// Apply this operation to `patcher`, returning the sites changed.
    ///
    /// # Errors
    /// [`PatchError`] for unsatisfiable requests (e.g. a swap whose target
    /// field does not exist), [`crate::FormatError`] from lookups.
    pub fn apply(&self, patcher: &mut DexPatcher) -> Result<usize> {
        match self {
            PatchOp::StubMethod {
                class,
                method,
                mode,
                replacement,
                options,
            } => patcher.stub_method(class, method, *mode, replacement, options),

            PatchOp::StubMethodsNamed {
                class_contains,
                name_contains,
                skip_void,
                replacement,
                options,
            } => patcher.stub_methods_matching(
                class_contains.as_deref(),
                name_contains,
                *skip_void,
                replacement,
                options,
            ),

            PatchOp::FieldToConst {
                class,
                field,
                value,
                encoding,
                filter,
            } => {
                let targets = {
                    let view = patcher.view()?;
                    find_field_indices(&view, class, field)?
                };
                if targets.is_empty() {
                    return Ok(0);
                }
                patcher.rewrite_sget_to_const(&targets, *value, *encoding, filter, None)
            }

            PatchOp::SwapFieldReference {
                field_class,
                from_field,
                to_field,
                in_class,
                in_method,
            } => {
                let (from_set, to_set) = {
                    let view = patcher.view()?;
                    (
                        find_field_indices(&view, field_class, from_field)?,
                        find_field_indices(&view, field_class, to_field)?,
                    )
                };
                if from_set.is_empty() {
                    return Ok(0);
                }
                let Some(&to_idx) = to_set.iter().next() else {
                    return Err(PatchError::TargetNotFound {
                        target: format!("{field_class}->{to_field}"),
                    }
                    .into());
                };

                let mut changed = 0;
                for &from_idx in &from_set {
                    let (Ok(from), Ok(to)) = (u16::try_from(from_idx), u16::try_from(to_idx))
                    else {
                        // instruction operands are 16-bit; wider indices are
                        // unreferencable by the rewritten family
                        continue;
                    };
                    changed += patcher.swap_field_reference(from, to, in_class, in_method)?;
                }
                Ok(changed)
            }

            PatchOp::SwapString { from, to } => patcher.swap_string_literal(from, to),

            PatchOp::NopCallSite {
                class,
                method,
                shorty,
            } => {
                let index = {
                    let view = patcher.view()?;
                    find_method_index(&view, class, method, shorty.as_deref())?
                };
                match index {
                    Some(index) => patcher.nop_call_site(index),
                    None => Ok(0),
                }
            }

            PatchOp::ForceCallResult {
                class,
                method,
                shorty,
                value,
            } => {
                let index = {
                    let view = patcher.view()?;
                    find_method_index(&view, class, method, shorty.as_deref())?
                };
                match index {
                    Some(index) => patcher.rewrite_invoke_result(index, *value),
                    None => Ok(0),
                }
            }
        }
    }
}

/// A named patch profile: signature pre-filter plus the operations to run.
#[derive(Debug, Clone)]
pub struct PatchProfile {
    /// Registry key
    pub name: String,
    /// Substrings that mark a container as worth parsing
    pub signatures: Vec<String>,
    /// Operations applied to matching containers, in order
    pub ops: Vec<PatchOp>,
}

impl PatchProfile {
    /// Does any signature occur in `raw`?
    ///
    /// This is the cheap containment check run on raw entry bytes before any
    /// structured parse.
    #[must_use]
    pub fn matches(&self, raw: &[u8]) -> bool {
        self.signatures
            .iter()
            .any(|sig| crate::file::contains(raw, sig.as_bytes()))
    }

    /// Run every operation against `patcher`; returns total sites changed.
    ///
    /// # Errors
    /// The first operation error aborts the profile — the caller discards the
    /// patcher and keeps the original entry bytes.
    pub fn apply(&self, patcher: &mut DexPatcher) -> Result<usize> {
        let mut changed = 0;
        for op in &self.ops {
            changed += op.apply(patcher)?;
        }
        Ok(changed)
    }
}

/// An explicit, read-only map of profile name to profile.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, PatchProfile>,
}

impl ProfileRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> ProfileRegistry {
        ProfileRegistry::default()
    }

    /// Add or replace a profile.
    pub fn register(&mut self, profile: PatchProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Look up a profile by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PatchProfile> {
        self.profiles.get(name)
    }

    /// The registered profile names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// The profiles this crate ships for the vendor ROMs it grew up on.
    ///
    /// Callers are free to start from [`ProfileRegistry::new`] instead and
    /// register only their own profiles.
    #[must_use]
    pub fn builtin() -> ProfileRegistry {
        let mut registry = ProfileRegistry::new();

        // CN -> Global behavior: the international-build flag reads as true
        // and the region lookup result is forced truthy. Shared by the
        // system UI, provisioning and vendor-service targets.
        let intl_ops = vec![
            PatchOp::FieldToConst {
                class: "Lmiui/os/Build;".to_string(),
                field: "IS_INTERNATIONAL_BUILD".to_string(),
                value: 1,
                encoding: ConstEncoding::Const4Nop,
                filter: SiteFilter::any(),
            },
            PatchOp::ForceCallResult {
                class: "Lmiui/os/Build;".to_string(),
                method: "getRegion".to_string(),
                shorty: None,
                value: true,
            },
        ];
        for name in ["systemui-volte", "provision-gms", "miui-service"] {
            registry.register(PatchProfile {
                name: name.to_string(),
                signatures: vec![
                    "IS_INTERNATIONAL_BUILD".to_string(),
                    "miui/os/Build".to_string(),
                ],
                ops: intl_ops.clone(),
            });
        }

        registry.register(PatchProfile {
            name: "settings-ai".to_string(),
            signatures: vec!["InternalDeviceUtils".to_string()],
            ops: vec![PatchOp::StubMethodsNamed {
                class_contains: Some("InternalDeviceUtils".to_string()),
                name_contains: "Ai".to_string(),
                skip_void: true,
                replacement: RETURN_TRUE.to_vec(),
                options: StubOptions::default(),
            }],
        });

        registry.register(PatchProfile {
            name: "voice-recorder-ai".to_string(),
            signatures: vec![
                "IS_INTERNATIONAL_BUILD".to_string(),
                "isAiSupported".to_string(),
                "isPremium".to_string(),
            ],
            ops: {
                let mut ops: Vec<PatchOp> = [
                    "isAiSupported",
                    "isPremium",
                    "isAiEnabled",
                    "isVipUser",
                    "hasAiFeature",
                    "isMiAiSupported",
                ]
                .iter()
                .map(|key| PatchOp::StubMethodsNamed {
                    class_contains: None,
                    name_contains: (*key).to_string(),
                    skip_void: true,
                    replacement: RETURN_TRUE.to_vec(),
                    options: StubOptions::default(),
                })
                .collect();
                ops.push(PatchOp::FieldToConst {
                    class: "Lmiui/os/Build;".to_string(),
                    field: "IS_INTERNATIONAL_BUILD".to_string(),
                    value: 1,
                    encoding: ConstEncoding::Const4Nop,
                    filter: SiteFilter::any(),
                });
                ops
            },
        });

        registry
    }
}
