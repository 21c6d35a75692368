//! End-to-end scans and filters against an in-memory [`Target`], exercised
//! only through the crate's public surface (`ramscope::prelude`).

use std::cell::RefCell;

use ramscope::error::TargetError;
use ramscope::prelude::*;
use ramscope::region::Region;

/// A single-region target backed by a plain byte buffer.
struct MemoryTarget {
    base: u64,
    data: RefCell<Vec<u8>>,
}

impl Target for MemoryTarget {
    fn regions(&self) -> Result<Vec<Region>, TargetError> {
        Ok(vec![Region {
            start: self.base,
            size: self.data.borrow().len() as u64,
            prot: Prot::READ | Prot::WRITE,
            path: String::new(),
        }])
    }

    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), TargetError> {
        let data = self.data.borrow();
        let off = (addr - self.base) as usize;
        if off + buf.len() > data.len() {
            return Err(TargetError::ShortRead { wanted: buf.len(), got: data.len().saturating_sub(off) });
        }
        buf.copy_from_slice(&data[off..off + buf.len()]);
        Ok(())
    }

    fn write(&self, addr: u64, buf: &[u8]) -> Result<(), TargetError> {
        let mut data = self.data.borrow_mut();
        let off = (addr - self.base) as usize;
        data[off..off + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TargetError> {
        Ok(())
    }

    fn run(&mut self) -> Result<(), TargetError> {
        Ok(())
    }
}

#[test]
fn finds_an_exact_s32_match_at_two_offsets() {
    let data = vec![0x39, 0x05, 0x00, 0x00, 0x39, 0x05, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
    let mut target = MemoryTarget { base: 0x4000, data: RefCell::new(data) };
    let config = SearchConfig::new(Prot::READ | Prot::WRITE);

    let hits = search(&mut target, ValueType::S32, "value == 1337", &config).unwrap();
    let addrs: Vec<u64> = hits.iter().map(|h| h.addr).collect();
    assert_eq!(addrs, vec![0x4000, 0x4004]);
}

#[test]
fn finds_a_bounded_range_with_short_circuit_and() {
    let data = vec![
        0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x03, 0x00, 0x00, 0x00,
    ];
    let mut target = MemoryTarget { base: 0, data: RefCell::new(data) };
    let config = SearchConfig::new(Prot::READ | Prot::WRITE);

    let hits = search(&mut target, ValueType::S32, "value > 0 && value < 10", &config).unwrap();
    let addrs: Vec<u64> = hits.iter().map(|h| h.addr).collect();
    assert_eq!(addrs, vec![4, 12]);
}

#[test]
fn narrows_a_float32_scan_through_a_double_cast() {
    let mut data = Vec::new();
    for f in [1.0f32, 2.0f32, 1.5f32, 1.6f32] {
        data.extend_from_slice(&f.to_le_bytes());
    }
    let mut target = MemoryTarget { base: 0x8000, data: RefCell::new(data) };
    let config = SearchConfig::new(Prot::READ | Prot::WRITE);

    let hits = search(&mut target, ValueType::F32, "(double)(value) > 1.5", &config).unwrap();
    let addrs: Vec<u64> = hits.iter().map(|h| h.addr).collect();
    assert_eq!(addrs, vec![0x8004, 0x800c]);
}

#[test]
fn filter_keeps_only_hits_whose_value_changed() {
    let data = vec![6u8, 0, 0, 0, 7, 0, 0, 0];
    let mut target = MemoryTarget { base: 0x1000, data: RefCell::new(data) };
    let mut hits = HitsStore::new(ValueType::U32, ValueType::S32);
    hits.push(0x1000, Value::from_s32(5));
    hits.push(0x1004, Value::from_s32(7));

    let filtered = filter(&mut target, &hits, "value != prev").unwrap();
    let addrs: Vec<u64> = filtered.iter().map(|h| h.addr).collect();
    assert_eq!(addrs, vec![0x1000]);
}

#[test]
fn a_protection_mask_matching_nothing_is_an_error() {
    let data = vec![0u8; 4];
    let mut target = MemoryTarget { base: 0, data: RefCell::new(data) };
    let config = SearchConfig::new(Prot::EXECUTE);
    let err = search(&mut target, ValueType::S32, "value == 0", &config).unwrap_err();
    assert!(matches!(err, SearchError::NoRegions));
}

#[test]
fn a_parse_error_in_the_expression_is_reported_before_any_scan() {
    let data = vec![0u8; 4];
    let mut target = MemoryTarget { base: 0, data: RefCell::new(data) };
    let config = SearchConfig::new(Prot::READ | Prot::WRITE);
    let err = search(&mut target, ValueType::S32, "value == ", &config).unwrap_err();
    assert!(matches!(err, SearchError::Parse(_)));
}
