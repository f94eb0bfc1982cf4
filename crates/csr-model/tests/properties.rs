//! Property coverage of naming, hardware literals, geometry and layout.

#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeSet;
use std::sync::Arc;

use csr_model::{
    Field, FieldItem, FieldParams, HardwareFlag, HardwareMode, Header, Identifier, Map, MapItem,
    MapParams, MapableItem, Register, RegisterParams,
};
use log as _;
use proptest::prelude::*;
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;

fn header(name: &str) -> Header {
    Header::new(name, "generated").unwrap()
}

fn field(name: &str, offset: u32, width: u32, reset: Option<u64>) -> FieldItem {
    let params = FieldParams {
        reset,
        ..FieldParams::new(header(name), offset, width)
    };
    FieldItem::Field(Field::new(params).unwrap())
}

fn register(name: &str, offset: u64) -> Arc<Register> {
    Register::new(RegisterParams {
        header: header(name),
        offset,
        fields: vec![field("f", 0, 8, Some(0))],
    })
    .unwrap()
}

/// Non-overlapping `(offset, width, reset)` slices laid out from bit 0.
fn slices() -> impl Strategy<Value = Vec<(u32, u32, Option<u64>)>> {
    prop::collection::vec((0_u32..4, 1_u32..=12, any::<Option<u64>>()), 1..8).prop_map(|specs| {
        let mut next = 0;
        specs
            .into_iter()
            .map(|(gap, width, reset)| {
                let offset = next + gap;
                next = offset + width;
                (offset, width, reset.map(|r| r & ((1 << width) - 1)))
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn property_identifier_is_trimmed_and_lowercased(
        name in "[A-Za-z_][A-Za-z0-9_]{0,15}",
        pad_left in " {0,3}",
        pad_right in " {0,3}",
    ) {
        let raw = format!("{pad_left}{name}{pad_right}");
        let id = Identifier::new(&raw).unwrap();
        prop_assert_eq!(id.as_str(), name.to_lowercase());
    }

    #[test]
    fn property_identifier_rejects_non_identifiers(name in "[0-9][A-Za-z0-9_]{0,8}|[A-Za-z]+[-. ][A-Za-z]+") {
        prop_assert!(Identifier::new(&name).is_err());
    }

    #[test]
    fn property_hardware_renders_canonically(
        flags in prop::sample::subsequence(HardwareFlag::ALL.to_vec(), 1..=HardwareFlag::ALL.len())
            .prop_shuffle(),
        dashed in any::<bool>(),
        upper in any::<bool>(),
    ) {
        let letters: Vec<String> = flags.iter().map(|f| f.letter().to_string()).collect();
        let mut literal = letters.join(if dashed { "-" } else { "" });
        if upper {
            literal = literal.to_uppercase();
        }
        let parsed: HardwareMode = literal.parse().unwrap();

        let canonical: Vec<String> = HardwareFlag::ALL
            .iter()
            .filter(|f| flags.contains(f))
            .map(|f| f.letter().to_string())
            .collect();
        prop_assert_eq!(parsed.to_string(), canonical.join("-"));
        prop_assert_eq!(parsed.to_string().parse::<HardwareMode>().unwrap(), parsed);
        prop_assert_eq!(parsed, HardwareMode::from_flags(flags.iter().copied()));
    }

    #[test]
    fn property_field_geometry((offset, width) in (0_u32..128).prop_flat_map(|o| (Just(o), 1..=128 - o))) {
        let field = Field::new(FieldParams::new(header("f"), offset, width)).unwrap();

        let bits: BTreeSet<u32> = field.bit_indices().collect();
        prop_assert_eq!(bits, (offset..offset + width).collect::<BTreeSet<_>>());
        prop_assert_eq!(field.mask().count_ones(), width);

        let mut covered = BTreeSet::new();
        for byte in field.byte_indices() {
            let (msb, lsb) = field.byte_select(byte).unwrap();
            prop_assert!(field.lsb() <= lsb && msb <= field.msb());
            prop_assert!(8 * byte <= lsb && msb <= 8 * byte + 7);
            covered.extend(lsb..=msb);
        }
        prop_assert_eq!(covered, (field.lsb()..=field.msb()).collect::<BTreeSet<_>>());
    }

    #[test]
    fn property_register_reset_round_trip(slices in slices()) {
        let fields = slices
            .iter()
            .enumerate()
            .map(|(i, &(offset, width, reset))| field(&format!("f{i}"), offset, width, reset))
            .collect();
        let reg = Register::new(RegisterParams { header: header("r"), offset: 0, fields }).unwrap();

        let expected = reg
            .fields()
            .iter()
            .map(|f| u128::from(f.reset().unwrap_or(0)) << f.lsb())
            .fold(0, |acc, part| acc | part);
        prop_assert_eq!(reg.reset(), expected);

        let binstr = reg.reset_binstr();
        prop_assert_eq!(binstr.len(), reg.width() as usize);

        let hexstr = reg.reset_hexstr();
        for (nibble, digit) in hexstr.chars().rev().enumerate() {
            if digit == 'x' {
                let bits = binstr.as_bytes();
                let has_unknown = (nibble * 4..(nibble * 4 + 4).min(bits.len()))
                    .any(|bit| bits[bits.len() - 1 - bit] == b'x');
                prop_assert!(has_unknown, "nibble {} of {} has no unknown bit in {}", nibble, hexstr, binstr);
            }
        }
    }

    #[test]
    fn property_map_layout(
        slots in prop::sample::subsequence((0_u64..32).collect::<Vec<_>>(), 1..12),
        base in 0_u64..16,
        sub_slot in 32_u64..48,
    ) {
        let granularity = 4;
        let mut items: Vec<MapItem> = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| MapItem::Register(register(&format!("r{i}"), slot * granularity)))
            .collect();
        let sub = Map::new(MapParams {
            header: header("sub"),
            offset: sub_slot * 16,
            address_width: 4,
            register_width: 32,
            items: vec![MapItem::Register(register("inner", 8))],
        })
        .unwrap();
        items.push(MapItem::Map(sub));

        let top = Map::new(MapParams {
            header: header("top"),
            offset: base * 0x1000,
            address_width: 10,
            register_width: 32,
            items,
        })
        .unwrap();
        prop_assert_eq!(top.address(), base * 0x1000);

        let ranges: Vec<_> = top
            .items()
            .iter()
            .flat_map(|item| item.element_ranges(top.granularity()))
            .collect();
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                prop_assert!(!a.overlaps(*b), "{} overlaps {}", a, b);
            }
        }
        for item in top.items() {
            prop_assert_eq!(item.offset() % top.granularity(), 0);
            prop_assert_eq!(item.address(), top.address() + item.offset());
        }
        let inner = &top.maps()[0].registers()[0];
        prop_assert_eq!(inner.address(), top.address() + sub_slot * 16 + 8);
    }
}
