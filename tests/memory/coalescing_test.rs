/*!
 * Coalescing Tests
 * Neighbour merging on release and empty page reclamation
 */

use family_mm::{BlockInfo, MemoryManager, PageId};
use pretty_assertions::assert_eq;

const HEADER: usize = 48;

fn emp_manager() -> MemoryManager {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Emp", 128).unwrap();
    mm
}

fn chain(mm: &MemoryManager, page: PageId) -> Vec<(usize, bool)> {
    mm.blocks(page).map(|b| (b.size, b.is_free)).collect()
}

#[test]
fn test_release_both_returns_page() {
    let mut mm = emp_manager();
    let emp = mm.lookup_family("Emp").unwrap();
    let max = mm.max_allocatable();

    let a = mm.allocate("Emp", 1).unwrap();
    let b = mm.allocate("Emp", 1).unwrap();
    let page = mm.owning_page(a).unwrap();

    mm.release(a).unwrap();
    assert_eq!(
        chain(&mm, page),
        vec![(128, true), (128, false), (max - 2 * (128 + HEADER), true)]
    );
    assert!(!mm.is_page_empty(page));

    mm.release(b).unwrap();
    let stats = mm.stats();
    assert_eq!(stats.data_pages, 0);
    assert_eq!(stats.pages_acquired, 1);
    assert_eq!(stats.pages_released, 1);
    assert_eq!(mm.pages(emp).count(), 0);
    assert_eq!(mm.largest_free_block(emp), None);
    assert_eq!(mm.owning_page(a), None);
}

#[test]
fn test_adjacent_releases_merge_with_header() {
    let mut mm = emp_manager();
    let a = mm.allocate("Emp", 1).unwrap();
    let b = mm.allocate("Emp", 2).unwrap();
    let _fence = mm.allocate("Emp", 1).unwrap();
    let page = mm.owning_page(a).unwrap();

    mm.release(a).unwrap();
    mm.release(b).unwrap();

    assert_eq!(
        mm.blocks(page).next(),
        Some(BlockInfo {
            offset: 32,
            size: 128 + 256 + HEADER,
            is_free: true,
        })
    );
    assert_eq!(mm.blocks(page).count(), 3);
    mm.validate().unwrap();
}

#[test]
fn test_merge_into_following_free_block() {
    let mut mm = emp_manager();
    let a = mm.allocate("Emp", 1).unwrap();
    let b = mm.allocate("Emp", 2).unwrap();
    let _fence = mm.allocate("Emp", 1).unwrap();
    let page = mm.owning_page(a).unwrap();

    mm.release(b).unwrap();
    mm.release(a).unwrap();

    assert_eq!(chain(&mm, page)[0], (128 + 256 + HEADER, true));
    assert_eq!(mm.blocks(page).count(), 3);
    mm.validate().unwrap();
}

#[test]
fn test_release_between_two_free_blocks() {
    let mut mm = emp_manager();
    let a = mm.allocate("Emp", 1).unwrap();
    let b = mm.allocate("Emp", 1).unwrap();
    let c = mm.allocate("Emp", 1).unwrap();
    let _fence = mm.allocate("Emp", 1).unwrap();
    let page = mm.owning_page(a).unwrap();

    mm.release(a).unwrap();
    mm.release(c).unwrap();
    assert_eq!(mm.blocks(page).filter(|b| b.is_free).count(), 3);

    mm.release(b).unwrap();
    assert_eq!(chain(&mm, page)[0], (3 * 128 + 2 * HEADER, true));
    assert_eq!(mm.blocks(page).filter(|b| b.is_free).count(), 2);
    mm.validate().unwrap();
}

#[test]
fn test_hole_reused_before_new_page() {
    let mut mm = emp_manager();
    let max = mm.max_allocatable();
    let rest = ((max - 128 - HEADER) / 128) as u32;

    let a = mm.allocate("Emp", 1).unwrap();
    let _bulk = mm.allocate("Emp", rest).unwrap();
    mm.release(a).unwrap();

    let again = mm.allocate("Emp", 1).unwrap();
    assert_eq!(again, a);
    assert_eq!(mm.stats().pages_acquired, 1);
}

#[test]
fn test_emptied_page_is_not_reused() {
    let mut mm = emp_manager();

    let a = mm.allocate("Emp", 1).unwrap();
    mm.release(a).unwrap();
    assert_eq!(mm.stats().data_pages, 0);

    mm.allocate("Emp", 1).unwrap();
    let stats = mm.stats();
    assert_eq!(stats.pages_acquired, 2);
    assert_eq!(stats.data_pages, 1);
}

#[test]
fn test_only_emptied_page_is_returned() {
    let mut mm = emp_manager();
    let emp = mm.lookup_family("Emp").unwrap();
    let per_page = (mm.max_allocatable() / 128) as u32;

    let old = mm.allocate("Emp", per_page).unwrap();
    let new = mm.allocate("Emp", per_page).unwrap();
    let survivor = mm.owning_page(new).unwrap();
    assert_eq!(mm.pages(emp).count(), 2);

    mm.release(old).unwrap();
    assert_eq!(mm.pages(emp).collect::<Vec<_>>(), vec![survivor]);
    mm.validate().unwrap();
}

/// Allocate and release on a page nobody else touches; the chain must come back unchanged
fn assert_round_trip(mm: &mut MemoryManager, family: &str, units: u32, page: PageId) -> usize {
    let before: Vec<BlockInfo> = mm.blocks(page).collect();

    let ptr = mm.allocate(family, units).unwrap();
    assert_eq!(mm.owning_page(ptr), Some(page));
    let granted = mm.allocation_info(ptr).unwrap().size;
    mm.release(ptr).unwrap();

    assert_eq!(mm.blocks(page).collect::<Vec<_>>(), before);
    mm.validate().unwrap();
    granted
}

/// Page of byte-sized elements holding one free hole of `hole` bytes ahead of a full tail
fn page_with_hole(hole: usize) -> (MemoryManager, PageId) {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Bytes", 1).unwrap();
    let max = mm.max_allocatable();

    let front = mm.allocate("Bytes", hole as u32).unwrap();
    let _bulk = mm.allocate("Bytes", (max - hole - HEADER) as u32).unwrap();
    let page = mm.owning_page(front).unwrap();
    mm.release(front).unwrap();

    assert_eq!(
        chain(&mm, page),
        vec![(hole, true), (max - hole - HEADER, false)]
    );
    (mm, page)
}

#[test]
fn test_round_trip_restores_tail_after_full_split() {
    let mut mm = emp_manager();
    let pin = mm.allocate("Emp", 1).unwrap();
    let page = mm.owning_page(pin).unwrap();

    for units in [1, 2, 5, 20] {
        let granted = assert_round_trip(&mut mm, "Emp", units, page);
        assert_eq!(granted, units as usize * 128);
    }
    assert_eq!(mm.stats().pages_acquired, 1);
}

#[test]
fn test_round_trip_restores_hole_after_absorbed_remainder() {
    let (mut mm, page) = page_with_hole(200);

    let granted = assert_round_trip(&mut mm, "Bytes", 190, page);
    assert_eq!(granted, 200);
}

#[test]
fn test_round_trip_restores_hole_after_header_sized_remainder() {
    let (mut mm, page) = page_with_hole(200);

    let ptr = mm.allocate("Bytes", (200 - HEADER) as u32).unwrap();
    assert_eq!(
        chain(&mm, page)[..2].to_vec(),
        vec![(200 - HEADER, false), (0, true)]
    );
    mm.release(ptr).unwrap();
    assert_eq!(chain(&mm, page)[0], (200, true));

    let granted = assert_round_trip(&mut mm, "Bytes", (200 - HEADER) as u32, page);
    assert_eq!(granted, 200 - HEADER);
}
