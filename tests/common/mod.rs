//! Shared fixtures: synthesize minimal valid DEX containers and ZIP archives
//! in memory.
//!
//! The DEX builder lays the file out the way real toolchains do — sorted
//! string pool, index tables, then a data section of string data, 4-aligned
//! code items and class-data blobs — and finishes with a checksum pass, so
//! every fixture passes full header validation and checksum verification.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

/// One method of a fixture class.
pub struct MethodSpec {
    pub name: &'static str,
    pub shorty: &'static str,
    pub registers: u16,
    pub ins: u16,
    pub outs: u16,
    /// Instruction bytes (even length); `None` builds an abstract method
    pub code: Option<Vec<u8>>,
}

impl MethodSpec {
    pub fn new(name: &'static str, shorty: &'static str, insns: Vec<u8>) -> MethodSpec {
        assert!(insns.len() % 2 == 0, "instructions must be whole code units");
        MethodSpec {
            name,
            shorty,
            registers: 2,
            ins: 0,
            outs: 0,
            code: Some(insns),
        }
    }

    pub fn abstract_method(name: &'static str, shorty: &'static str) -> MethodSpec {
        MethodSpec {
            name,
            shorty,
            registers: 0,
            ins: 0,
            outs: 0,
            code: None,
        }
    }

    pub fn with_ins(mut self, ins: u16) -> MethodSpec {
        self.ins = ins;
        self
    }

    pub fn with_registers(mut self, registers: u16) -> MethodSpec {
        self.registers = registers;
        self
    }
}

/// One fixture class.
pub struct ClassSpec {
    pub descriptor: &'static str,
    pub methods: Vec<MethodSpec>,
}

impl ClassSpec {
    pub fn new(descriptor: &'static str, methods: Vec<MethodSpec>) -> ClassSpec {
        ClassSpec {
            descriptor,
            methods,
        }
    }
}

/// One fixture field.
pub struct FieldSpec {
    pub class: &'static str,
    pub type_desc: &'static str,
    pub name: &'static str,
}

impl FieldSpec {
    pub fn new(class: &'static str, type_desc: &'static str, name: &'static str) -> FieldSpec {
        FieldSpec {
            class,
            type_desc,
            name,
        }
    }
}

fn shorty_return_descriptor(shorty: &str) -> &'static str {
    match shorty.as_bytes().first() {
        Some(b'V') => "V",
        Some(b'Z') => "Z",
        Some(b'B') => "B",
        Some(b'S') => "S",
        Some(b'C') => "C",
        Some(b'I') => "I",
        Some(b'J') => "J",
        Some(b'F') => "F",
        Some(b'D') => "D",
        _ => "Ljava/lang/Object;",
    }
}

fn uleb(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Build a complete, checksum-valid DEX container.
pub fn build_dex(classes: &[ClassSpec], fields: &[FieldSpec], extra_strings: &[&str]) -> Vec<u8> {
    const HEADER_LEN: usize = 112;

    // String and type pools
    let mut strings: BTreeSet<String> = BTreeSet::new();
    let mut types: BTreeSet<String> = BTreeSet::new();

    for class in classes {
        strings.insert(class.descriptor.to_string());
        types.insert(class.descriptor.to_string());
        for method in &class.methods {
            strings.insert(method.name.to_string());
            strings.insert(method.shorty.to_string());
            let ret = shorty_return_descriptor(method.shorty);
            strings.insert(ret.to_string());
            types.insert(ret.to_string());
        }
    }
    for field in fields {
        strings.insert(field.class.to_string());
        types.insert(field.class.to_string());
        strings.insert(field.type_desc.to_string());
        types.insert(field.type_desc.to_string());
        strings.insert(field.name.to_string());
    }
    for extra in extra_strings {
        strings.insert((*extra).to_string());
    }

    let strings: Vec<String> = strings.into_iter().collect();
    let string_idx: BTreeMap<&str, u32> = strings
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i as u32))
        .collect();

    // Types sorted lexicographically match string-index order, as the
    // format requires
    let types: Vec<String> = types.into_iter().collect();
    let type_idx: BTreeMap<&str, u32> = types
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i as u32))
        .collect();

    // Protos, one per distinct shorty
    let mut shorties: BTreeSet<&str> = BTreeSet::new();
    for class in classes {
        for method in &class.methods {
            shorties.insert(method.shorty);
        }
    }
    let shorties: Vec<&str> = shorties.into_iter().collect();
    let proto_idx: BTreeMap<&str, u32> = shorties
        .iter()
        .enumerate()
        .map(|(i, s)| (*s, i as u32))
        .collect();

    // Field and method id tables
    let field_ids: Vec<(u16, u16, u32)> = fields
        .iter()
        .map(|f| {
            (
                type_idx[f.class] as u16,
                type_idx[f.type_desc] as u16,
                string_idx[f.name],
            )
        })
        .collect();

    let mut method_ids: Vec<(u16, u16, u32)> = Vec::new();
    let mut method_index_of: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    for (ci, class) in classes.iter().enumerate() {
        for (mi, method) in class.methods.iter().enumerate() {
            method_index_of.insert((ci, mi), method_ids.len() as u32);
            method_ids.push((
                type_idx[class.descriptor] as u16,
                proto_idx[method.shorty] as u16,
                string_idx[method.name],
            ));
        }
    }

    // Table layout
    let string_ids_off = HEADER_LEN;
    let type_ids_off = string_ids_off + 4 * strings.len();
    let proto_ids_off = type_ids_off + 4 * types.len();
    let field_ids_off = proto_ids_off + 12 * shorties.len();
    let method_ids_off = field_ids_off + 8 * field_ids.len();
    let class_defs_off = method_ids_off + 8 * method_ids.len();
    let data_off = class_defs_off + 32 * classes.len();

    // Data section: string data, 4-aligned code items, class data blobs
    let mut data: Vec<u8> = Vec::new();
    let mut string_offsets: Vec<u32> = Vec::with_capacity(strings.len());
    for s in &strings {
        string_offsets.push((data_off + data.len()) as u32);
        data.extend_from_slice(&uleb(s.chars().count() as u32));
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }

    let mut code_offsets: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    for (ci, class) in classes.iter().enumerate() {
        for (mi, method) in class.methods.iter().enumerate() {
            let Some(insns) = &method.code else {
                continue;
            };
            while (data_off + data.len()) % 4 != 0 {
                data.push(0);
            }
            code_offsets.insert((ci, mi), (data_off + data.len()) as u32);
            push_u16(&mut data, method.registers.max(method.ins));
            push_u16(&mut data, method.ins);
            push_u16(&mut data, method.outs);
            push_u16(&mut data, 0); // tries
            push_u32(&mut data, 0); // debug info
            push_u32(&mut data, (insns.len() / 2) as u32);
            data.extend_from_slice(insns);
        }
    }

    let mut class_data_offsets: Vec<u32> = Vec::with_capacity(classes.len());
    for (ci, class) in classes.iter().enumerate() {
        class_data_offsets.push((data_off + data.len()) as u32);
        data.extend_from_slice(&uleb(0)); // static fields
        data.extend_from_slice(&uleb(0)); // instance fields
        data.extend_from_slice(&uleb(class.methods.len() as u32)); // direct
        data.extend_from_slice(&uleb(0)); // virtual

        let mut prev_idx = 0u32;
        for (mi, method) in class.methods.iter().enumerate() {
            let abs = method_index_of[&(ci, mi)];
            let delta = if mi == 0 { abs } else { abs - prev_idx };
            prev_idx = abs;
            data.extend_from_slice(&uleb(delta));
            let flags = if method.code.is_some() { 0x1 } else { 0x401 };
            data.extend_from_slice(&uleb(flags));
            data.extend_from_slice(&uleb(
                code_offsets.get(&(ci, mi)).copied().unwrap_or(0),
            ));
        }
    }

    let total_len = data_off + data.len();

    // Assemble
    let mut out: Vec<u8> = Vec::with_capacity(total_len);
    out.extend_from_slice(b"dex\n035\0");
    push_u32(&mut out, 0); // checksum, fixed later
    out.extend_from_slice(&[0u8; 20]); // signature, fixed later
    push_u32(&mut out, total_len as u32);
    push_u32(&mut out, HEADER_LEN as u32);
    push_u32(&mut out, 0x1234_5678); // endian tag
    push_u32(&mut out, 0); // link size
    push_u32(&mut out, 0); // link off
    push_u32(&mut out, 0); // map off
    push_u32(&mut out, strings.len() as u32);
    push_u32(&mut out, string_ids_off as u32);
    push_u32(&mut out, types.len() as u32);
    push_u32(&mut out, type_ids_off as u32);
    push_u32(&mut out, shorties.len() as u32);
    push_u32(&mut out, proto_ids_off as u32);
    push_u32(&mut out, field_ids.len() as u32);
    push_u32(&mut out, field_ids_off as u32);
    push_u32(&mut out, method_ids.len() as u32);
    push_u32(&mut out, method_ids_off as u32);
    push_u32(&mut out, classes.len() as u32);
    push_u32(&mut out, class_defs_off as u32);
    push_u32(&mut out, data.len() as u32);
    push_u32(&mut out, data_off as u32);
    assert_eq!(out.len(), HEADER_LEN);

    for off in &string_offsets {
        push_u32(&mut out, *off);
    }
    for t in &types {
        push_u32(&mut out, string_idx[t.as_str()]);
    }
    for shorty in &shorties {
        push_u32(&mut out, string_idx[*shorty]);
        push_u32(&mut out, type_idx[shorty_return_descriptor(shorty)]);
        push_u32(&mut out, 0); // parameters off
    }
    for (class, ty, name) in &field_ids {
        push_u16(&mut out, *class);
        push_u16(&mut out, *ty);
        push_u32(&mut out, *name);
    }
    for (class, proto, name) in &method_ids {
        push_u16(&mut out, *class);
        push_u16(&mut out, *proto);
        push_u32(&mut out, *name);
    }
    for (ci, class) in classes.iter().enumerate() {
        push_u32(&mut out, type_idx[class.descriptor]); // class idx
        push_u32(&mut out, 0x1); // access flags: public
        push_u32(&mut out, 0xFFFF_FFFF); // superclass: none
        push_u32(&mut out, 0); // interfaces
        push_u32(&mut out, 0xFFFF_FFFF); // source file
        push_u32(&mut out, 0); // annotations
        push_u32(&mut out, class_data_offsets[ci]);
        push_u32(&mut out, 0); // static values
    }
    out.extend_from_slice(&data);
    assert_eq!(out.len(), total_len);

    dexpatch::prelude::update_checksums(&mut out).expect("fixture checksum pass");
    out
}

/// Encode an `sget-boolean vReg, field@idx` instruction (4 bytes).
pub fn sget_boolean(reg: u8, field_idx: u16) -> Vec<u8> {
    let idx = field_idx.to_le_bytes();
    vec![0x63, reg, idx[0], idx[1]]
}

/// Encode a `const-string vReg, string@idx` instruction (4 bytes).
pub fn const_string(reg: u8, string_idx: u16) -> Vec<u8> {
    let idx = string_idx.to_le_bytes();
    vec![0x1a, reg, idx[0], idx[1]]
}

/// Encode a `const-string/jumbo vReg, string@idx` instruction (6 bytes).
pub fn const_string_jumbo(reg: u8, string_idx: u32) -> Vec<u8> {
    let idx = string_idx.to_le_bytes();
    vec![0x1b, reg, idx[0], idx[1], idx[2], idx[3]]
}

/// Encode an `invoke-static {}, meth@idx` instruction (6 bytes).
pub fn invoke_static_0(method_idx: u16) -> Vec<u8> {
    let idx = method_idx.to_le_bytes();
    vec![0x71, 0x00, idx[0], idx[1], 0x00, 0x00]
}

/// `return v0` (2 bytes); keeps fixture methods well-formed after a load.
pub fn return_v0() -> Vec<u8> {
    vec![0x0F, 0x00]
}

/// Build a STORE-only ZIP archive by hand, with a chosen amount of extra
/// padding per entry (to construct aligned *and* deliberately misaligned
/// inputs).
pub fn build_store_zip(entries: &[(&str, &[u8], usize)]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut central: Vec<u8> = Vec::new();

    for (name, payload, extra_len) in entries {
        let name_bytes = name.as_bytes();
        let crc = crc32fast::hash(payload);
        let header_offset = out.len() as u32;

        push_u32(&mut out, 0x0403_4b50);
        push_u16(&mut out, 20);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0); // STORE
        push_u16(&mut out, 0);
        push_u16(&mut out, 0x21);
        push_u32(&mut out, crc);
        push_u32(&mut out, payload.len() as u32);
        push_u32(&mut out, payload.len() as u32);
        push_u16(&mut out, name_bytes.len() as u16);
        push_u16(&mut out, *extra_len as u16);
        out.extend_from_slice(name_bytes);
        out.extend(std::iter::repeat(0u8).take(*extra_len));
        out.extend_from_slice(payload);

        push_u32(&mut central, 0x0201_4b50);
        push_u16(&mut central, (3 << 8) | 20);
        push_u16(&mut central, 20);
        push_u16(&mut central, 0);
        push_u16(&mut central, 0); // STORE
        push_u16(&mut central, 0);
        push_u16(&mut central, 0x21);
        push_u32(&mut central, crc);
        push_u32(&mut central, payload.len() as u32);
        push_u32(&mut central, payload.len() as u32);
        push_u16(&mut central, name_bytes.len() as u16);
        push_u16(&mut central, 0);
        push_u16(&mut central, 0);
        push_u16(&mut central, 0);
        push_u16(&mut central, 0);
        push_u32(&mut central, 0);
        push_u32(&mut central, header_offset);
        central.extend_from_slice(name_bytes);
    }

    let central_start = out.len() as u32;
    out.extend_from_slice(&central);
    let central_size = out.len() as u32 - central_start;

    push_u32(&mut out, 0x0605_4b50);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, entries.len() as u16);
    push_u16(&mut out, entries.len() as u16);
    push_u32(&mut out, central_size);
    push_u32(&mut out, central_start);
    push_u16(&mut out, 0);

    out
}
