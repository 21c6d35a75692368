//! Search/filter driver: orchestrates the value algebra, parser, optimizer,
//! and evaluator over a target's memory regions.
//!
//! Grounded in `original_source/src/search.c`'s `search`/`filter` pair
//! (spec.md §4.I). The symbol binding here is the side-table redesign from
//! the design notes: `addr`/`value`/`prev` are [`SymbolValues`] cells the
//! driver rewrites each iteration, not raw pointers into a shared buffer, so
//! there is no 32-/64-bit address aliasing trick to replicate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::ast::Node;
use crate::error::SearchError;
use crate::eval::evaluate;
use crate::hits::HitsStore;
use crate::optimizer::optimize;
use crate::parser::Parser;
use crate::region::{Prot, Region};
use crate::symbol::{SymbolId, SymbolTable, SymbolValues};
use crate::target::Target;
use crate::value::{Value, ValueType};

/// Tuning knobs for a scan: which regions are eligible, the stride between
/// candidate addresses, and an optional cooperative cancellation flag.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub prot: Prot,
    pub align: Option<usize>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchConfig {
    pub fn new(prot: Prot) -> Self {
        SearchConfig { prot, align: None, cancel: None }
    }

    fn stride(&self, value_type: ValueType) -> usize {
        self.align.unwrap_or_else(|| value_type.size_of()).max(1)
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
    }
}

/// First scan pass: parse+optimize `expr` once, then evaluate it at every
/// stride-aligned address of every region whose protection bits satisfy
/// `config.prot`, recording hits in ascending address order.
#[instrument(skip(target, config), fields(value_type = %value_type))]
pub fn search(
    target: &mut dyn Target,
    value_type: ValueType,
    expr: &str,
    config: &SearchConfig,
) -> Result<HitsStore, SearchError> {
    let regions: Vec<Region> = target.regions()?.into_iter().filter(|r| r.matches(config.prot)).collect();
    if regions.is_empty() {
        return Err(SearchError::NoRegions);
    }

    let addr_type = addr_type_for(&regions);
    let max_size = regions.iter().map(|r| r.size).max().unwrap_or(0) as usize;
    let mut scratch = vec![0u8; max_size];

    let mut symtab = SymbolTable::new();
    let addr_sym = symtab.add("addr", addr_type).expect("fresh table");
    let value_sym = symtab.add("value", value_type).expect("fresh table");
    let mut symbols = SymbolValues::new();
    symbols.push(addr_type);
    symbols.push(value_type);

    let ast = parse_and_optimize(expr, &symtab)?;

    let stride = config.stride(value_type);
    let step = value_type.size_of();
    let mut hits = HitsStore::new(addr_type, value_type);

    debug!(regions = regions.len(), stride, "starting scan");
    target.stop()?;
    let outcome = (|| -> Result<(), SearchError> {
        for region in &regions {
            if config.cancelled() {
                debug!(region = %region.start, "cancellation requested, stopping scan");
                break;
            }

            let size = region.size as usize;
            if target.read(region.start, &mut scratch[..size]).is_err() {
                warn!(region = %region.start, "skipping unreadable region");
                continue;
            }

            let mut addr = region.start;
            let mut offset = 0usize;
            while offset + step <= size {
                set_addr(&mut symbols, addr_sym, addr_type, addr);
                symbols.set(value_sym, Value::from_bytes(value_type, &scratch[offset..offset + step]));

                let hit = evaluate(&ast, &symbols, &*target).map(|v| v.is_nonzero()).unwrap_or(false);
                if hit {
                    hits.push(addr, symbols.get(value_sym));
                }

                addr += stride as u64;
                offset += stride;
            }
        }
        Ok(())
    })();
    target.run()?;
    outcome?;

    debug!(hits = hits.len(), "scan complete");
    Ok(hits)
}

/// Refinement pass: re-reads each prior hit's current value from the target
/// and evaluates `expr` against `addr`/`value`/`prev`, keeping hits that
/// still satisfy it.
#[instrument(skip(target, hits))]
pub fn filter(target: &mut dyn Target, hits: &HitsStore, expr: &str) -> Result<HitsStore, SearchError> {
    let addr_type = hits.addr_type;
    let value_type = hits.value_type;

    let mut symtab = SymbolTable::new();
    let addr_sym = symtab.add("addr", addr_type).expect("fresh table");
    let value_sym = symtab.add("value", value_type).expect("fresh table");
    let prev_sym = symtab.add("prev", value_type).expect("fresh table");
    let mut symbols = SymbolValues::new();
    symbols.push(addr_type);
    symbols.push(value_type);
    symbols.push(value_type);

    let ast = parse_and_optimize(expr, &symtab)?;

    let step = value_type.size_of();
    let mut buf = [0u8; 8];
    let mut out = HitsStore::new(addr_type, value_type);

    target.stop()?;
    let outcome = (|| -> Result<(), SearchError> {
        for hit in hits.iter() {
            if target.read(hit.addr, &mut buf[..step]).is_err() {
                continue;
            }
            let current = Value::from_bytes(value_type, &buf[..step]);

            set_addr(&mut symbols, addr_sym, addr_type, hit.addr);
            symbols.set(value_sym, current);
            symbols.set(prev_sym, hit.value);

            let keep = evaluate(&ast, &symbols, &*target).map(|v| v.is_nonzero()).unwrap_or(false);
            if keep {
                out.push(hit.addr, current);
            }
        }
        Ok(())
    })();
    target.run()?;
    outcome?;

    Ok(out)
}

fn parse_and_optimize(expr: &str, symtab: &SymbolTable) -> Result<Node, SearchError> {
    let parser = Parser::new(expr, symtab)?;
    let ast = parser.parse()?;
    Ok(optimize(ast))
}

fn set_addr(symbols: &mut SymbolValues, sym: SymbolId, addr_type: ValueType, addr: u64) {
    let v = match addr_type {
        ValueType::U64 => Value::from_u64(addr),
        _ => Value::from_u32(addr as u32),
    };
    symbols.set(sym, v);
}

/// `U32` if every candidate region ends at or below `2^32`, else `U64`.
fn addr_type_for(regions: &[Region]) -> ValueType {
    let max_end = regions.iter().map(|r| r.end()).max().unwrap_or(0);
    if max_end <= u32::MAX as u64 {
        ValueType::U32
    } else {
        ValueType::U64
    }
}
