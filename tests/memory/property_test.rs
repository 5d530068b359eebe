/*!
 * Allocator Property Tests
 * Random allocate/release sequences checked against layout invariants
 */

use family_mm::MemoryManager;
use proptest::prelude::*;
use std::ptr::NonNull;

const FAMILIES: [(&str, u32); 3] = [("Emp", 128), ("Student", 24), ("Blob", 1000)];

#[derive(Clone, Debug)]
enum Op {
    Allocate { family: usize, units: u32 },
    Release { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..FAMILIES.len(), 1u32..5)
            .prop_map(|(family, units)| Op::Allocate { family, units }),
        2 => any::<usize>().prop_map(|pick| Op::Release { pick }),
    ]
}

struct Live {
    ptr: NonNull<u8>,
    len: usize,
    fill: u8,
}

fn check_disjoint(live: &[Live]) {
    let mut ranges: Vec<(usize, usize)> = live
        .iter()
        .map(|l| (l.ptr.as_ptr() as usize, l.ptr.as_ptr() as usize + l.len))
        .collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "allocations overlap: {:?}", pair);
    }
}

fn run_sequence(ops: Vec<Op>) {
    let mut mm = MemoryManager::init().unwrap();
    for (name, size) in FAMILIES {
        mm.register_family(name, size).unwrap();
    }

    let mut live: Vec<Live> = Vec::new();
    for (step, op) in ops.into_iter().enumerate() {
        match op {
            Op::Allocate { family, units } => {
                let (name, size) = FAMILIES[family];
                let ptr = mm.allocate(name, units).unwrap();
                let len = (size * units) as usize;
                let fill = (step % 251) as u8 + 1;

                let bytes = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), len) };
                assert!(bytes.iter().all(|&b| b == 0), "allocation not zeroed");
                bytes.fill(fill);
                live.push(Live { ptr, len, fill });
            }
            Op::Release { pick } => {
                if live.is_empty() {
                    continue;
                }
                let entry = live.swap_remove(pick % live.len());
                let bytes = unsafe { std::slice::from_raw_parts(entry.ptr.as_ptr(), entry.len) };
                assert!(bytes.iter().all(|&b| b == entry.fill), "payload clobbered");
                mm.release(entry.ptr).unwrap();
            }
        }

        mm.validate().unwrap();
        check_disjoint(&live);
        assert_eq!(mm.live_allocations(), live.len());
    }

    for entry in live.drain(..) {
        mm.release(entry.ptr).unwrap();
    }
    mm.validate().unwrap();

    let stats = mm.stats();
    assert_eq!(stats.data_pages, 0);
    assert_eq!(stats.allocated_blocks, 0);
    assert_eq!(stats.pages_acquired, stats.pages_released);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]
    #[test]
    fn allocator_survives_random_sequences(ops in prop::collection::vec(op_strategy(), 1..120)) {
        run_sequence(ops);
    }
}
