//! Format reader, walker and round-trip properties.

mod common;

use common::{build_dex, return_v0, sget_boolean, ClassSpec, FieldSpec, MethodSpec};
use dexpatch::prelude::*;

fn simple_container() -> Vec<u8> {
    build_dex(
        &[ClassSpec::new(
            "LX;",
            vec![
                MethodSpec::new("isEnabled", "Z", {
                    let mut insns = sget_boolean(0, 0);
                    insns.extend(return_v0());
                    insns.extend([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]); // nop padding
                    insns
                })
                .with_ins(1),
                MethodSpec::abstract_method("pending", "V"),
            ],
        )],
        &[FieldSpec::new("LX;", "Z", "FLAG")],
        &["alpha", "omega"],
    )
}

#[test]
fn round_trip_identity() {
    let original = simple_container();
    let unchanged = DexPatcher::new(original.clone())
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(original, unchanged);
}

#[test]
fn fixture_passes_checksum_verification() {
    let container = simple_container();
    verify_checksums(&container).unwrap();
}

#[test]
fn checksums_match_independent_recompute() {
    use sha1::{Digest, Sha1};

    let mut container = simple_container();
    // Mutate a real site, then repair
    let mut patcher = DexPatcher::new(container).unwrap();
    let changed = patcher
        .rewrite_sget_to_const(
            &[0u32].into_iter().collect(),
            1,
            ConstEncoding::Const4Nop,
            &SiteFilter::any(),
            None,
        )
        .unwrap();
    assert_eq!(changed, 1);
    container = patcher.finish().unwrap();

    let mut hasher = Sha1::new();
    hasher.update(&container[32..]);
    let digest: [u8; 20] = hasher.finalize().into();
    assert_eq!(&container[12..32], &digest);

    let checksum = adler::adler32_slice(&container[12..]);
    assert_eq!(
        u32::from_le_bytes(container[8..12].try_into().unwrap()),
        checksum
    );
}

#[test]
fn rejects_truncated_and_foreign_input() {
    let container = simple_container();

    // Cut off mid-table: the declared file size no longer matches
    let truncated = &container[..container.len() - 40];
    assert!(DexFile::parse(truncated).is_err());

    // Not this format at all
    let err = DexFile::parse(b"PK\x03\x04 definitely a zip").unwrap_err();
    assert!(matches!(err, FormatError::BadMagic));

    // Empty input
    assert!(matches!(
        DexFile::parse(&[]),
        Err(FormatError::Truncated { .. })
    ));
}

#[test]
fn string_pool_lookups() {
    let container = simple_container();
    let dex = DexFile::parse(&container).unwrap();

    for literal in ["alpha", "omega", "isEnabled", "LX;"] {
        let idx = find_string_index(&dex, literal).unwrap().unwrap();
        assert_eq!(dex.string_at(idx).unwrap(), literal);
    }
    assert_eq!(find_string_index(&dex, "not-in-pool").unwrap(), None);

    // Out-of-range indices are rejected, not read past the table
    assert!(matches!(
        dex.string_at(9999),
        Err(FormatError::BadIndex {
            table: "string_ids",
            ..
        })
    ));
    assert!(matches!(
        dex.type_name_at(9999),
        Err(FormatError::BadIndex { table: "type_ids", .. })
    ));
}

#[test]
fn walker_certifies_concrete_methods_only() {
    let container = simple_container();
    let dex = DexFile::parse(&container).unwrap();

    let regions = walk_code_regions(&dex);
    // `pending` is abstract and carries no code region
    assert_eq!(regions.len(), 1);

    let region = &regions[0];
    assert_eq!(region.class_name, "LX;");
    assert_eq!(region.method_name, "isEnabled");
    assert_eq!(region.insns_len, 12);
    assert!(region.insns_off >= 112);
    assert!(region.insns_end() <= container.len());
}

#[test]
fn corrupt_class_data_hides_one_class_only() {
    let mut container = build_dex(
        &[
            ClassSpec::new(
                "LGood;",
                vec![MethodSpec::new("keep", "Z", return_v0())],
            ),
            ClassSpec::new(
                "LBroken;",
                vec![MethodSpec::new("lost", "Z", return_v0())],
            ),
        ],
        &[],
        &[],
    );

    // Point LBroken;'s class-data offset at a dangling ULEB128 continuation
    // byte at the very end of the file
    let class_defs_off =
        u32::from_le_bytes(container[100..104].try_into().unwrap()) as usize;
    let broken_def = class_defs_off + 32; // second record
    let last = container.len() - 1;
    container[last] = 0x80;
    container[broken_def + 24..broken_def + 28]
        .copy_from_slice(&(last as u32).to_le_bytes());

    let dex = DexFile::parse(&container).unwrap();
    let regions = walk_code_regions(&dex);

    // One corrupt class must not hide the other class's methods
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].class_name, "LGood;");
    assert_eq!(regions[0].method_name, "keep");
}

#[test]
fn find_method_by_name() {
    let container = simple_container();
    let dex = DexFile::parse(&container).unwrap();

    let region = find_method(&dex, "LX;", "isEnabled", ClassMatch::Exact)
        .unwrap()
        .unwrap();
    assert_eq!(region.insns_len, 12);

    // Exact matching does not accept fragments; the relaxed mode does
    assert!(find_method(&dex, "X", "isEnabled", ClassMatch::Exact)
        .unwrap()
        .is_none());
    assert!(find_method(&dex, "X", "isEnabled", ClassMatch::Contains)
        .unwrap()
        .is_some());

    // Absent class and absent method are reported, not errors
    assert!(find_method(&dex, "LNope;", "isEnabled", ClassMatch::Exact)
        .unwrap()
        .is_none());
    assert!(find_method(&dex, "LX;", "nope", ClassMatch::Exact)
        .unwrap()
        .is_none());
}

#[test]
fn find_method_index_disambiguates_overloads() {
    let container = build_dex(
        &[ClassSpec::new(
            "LOverloads;",
            vec![
                MethodSpec::new("get", "Z", return_v0()),
                MethodSpec::new("get", "I", return_v0()),
            ],
        )],
        &[],
        &[],
    );
    let dex = DexFile::parse(&container).unwrap();

    // Without a shorty the first table entry wins
    assert_eq!(
        find_method_index(&dex, "LOverloads;", "get", None).unwrap(),
        Some(0)
    );
    // With a shorty each overload is reachable
    assert_eq!(
        find_method_index(&dex, "LOverloads;", "get", Some("I")).unwrap(),
        Some(1)
    );
    assert_eq!(
        find_method_index(&dex, "LOverloads;", "get", Some("Z")).unwrap(),
        Some(0)
    );
    assert_eq!(
        find_method_index(&dex, "LOverloads;", "get", Some("D")).unwrap(),
        None
    );
}

#[test]
fn field_indices_lookup() {
    let container = simple_container();
    let dex = DexFile::parse(&container).unwrap();

    let indices = find_field_indices(&dex, "LX;", "FLAG").unwrap();
    assert_eq!(indices.into_iter().collect::<Vec<_>>(), vec![0]);

    // Empty set is a reported outcome, not an error
    assert!(find_field_indices(&dex, "LX;", "ABSENT").unwrap().is_empty());
    assert!(find_field_indices(&dex, "LNope;", "FLAG").unwrap().is_empty());
}
