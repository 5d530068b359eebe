/*!
 * Allocation Tests
 * Page acquisition, splitting and error paths through the public API
 */

use family_mm::{
    BlockInfo, ManagerConfig, MemoryError, MemoryManager, MemoryResult, MmapPageSource,
    PageSource, Size, VmRegion,
};
use pretty_assertions::assert_eq;

const HEADER: usize = 48;

/// Page source that counts traffic and can be told to refuse new pages
#[derive(Default)]
struct CountingSource {
    inner: MmapPageSource,
    acquired: usize,
    released: usize,
    refuse: bool,
}

impl PageSource for CountingSource {
    fn page_size(&self) -> Size {
        self.inner.page_size()
    }

    fn acquire(&mut self, units: usize) -> MemoryResult<VmRegion> {
        if self.refuse {
            return Err(MemoryError::OutOfMemory {
                units,
                reason: "refused".to_string(),
            });
        }
        self.acquired += 1;
        self.inner.acquire(units)
    }

    fn release(&mut self, region: VmRegion) -> MemoryResult<()> {
        self.released += 1;
        self.inner.release(region)
    }
}

fn counting_manager() -> MemoryManager<CountingSource> {
    MemoryManager::with_source(CountingSource::default(), ManagerConfig::default()).unwrap()
}

#[test]
fn test_first_allocation_maps_one_page() {
    let mut mm = counting_manager();
    let emp = mm.register_family("Emp", 128).unwrap();
    let max = mm.max_allocatable();

    let first = mm.allocate("Emp", 1).unwrap();
    assert_eq!(mm.source().acquired, 1);
    assert_eq!(mm.allocation_info(first).unwrap().size, 128);
    assert_eq!(mm.largest_free_block(emp), Some(max - 128 - HEADER));

    let second = mm.allocate("Emp", 1).unwrap();
    assert_eq!(mm.source().acquired, 1, "second allocation must reuse the remainder");
    assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 128 + HEADER);
    assert_eq!(mm.owning_page(first), mm.owning_page(second));
    mm.validate().unwrap();
}

#[test]
fn test_multi_unit_allocation() {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Student", 64).unwrap();

    let ptr = mm.allocate("Student", 10).unwrap();
    assert_eq!(mm.allocation_info(ptr).unwrap().size, 640);

    let bytes = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), 640) };
    assert!(bytes.iter().all(|&b| b == 0));
    bytes.fill(0x5A);
    mm.validate().unwrap();
}

#[test]
fn test_families_never_share_pages() {
    let mut mm = counting_manager();
    let emp = mm.register_family("Emp", 128).unwrap();
    let student = mm.register_family("Student", 64).unwrap();

    let a = mm.allocate("Emp", 1).unwrap();
    let b = mm.allocate("Student", 1).unwrap();

    assert_eq!(mm.source().acquired, 2);
    assert_ne!(mm.owning_page(a), mm.owning_page(b));
    assert_eq!(mm.pages(emp).count(), 1);
    assert_eq!(mm.pages(student).count(), 1);
}

#[test]
fn test_new_page_prepended_when_nothing_fits() {
    let mut mm = counting_manager();
    let emp = mm.register_family("Emp", 128).unwrap();
    let per_page = (mm.max_allocatable() / 128) as u32;

    let first = mm.allocate("Emp", per_page - 1).unwrap();
    let second = mm.allocate("Emp", per_page - 1).unwrap();

    assert_eq!(mm.source().acquired, 2);
    let pages: Vec<_> = mm.pages(emp).collect();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], mm.owning_page(second).unwrap());
    assert_eq!(pages[1], mm.owning_page(first).unwrap());
    mm.validate().unwrap();
}

#[test]
fn test_largest_request_fills_page() {
    let mut mm = MemoryManager::init().unwrap();
    let bytes = mm.register_family("Bytes", 1).unwrap();
    let max = mm.max_allocatable();

    let ptr = mm.allocate("Bytes", max as u32).unwrap();
    let page = mm.owning_page(ptr).unwrap();
    assert_eq!(
        mm.blocks(page).collect::<Vec<_>>(),
        vec![BlockInfo {
            offset: 32,
            size: max,
            is_free: false,
        }]
    );
    assert_eq!(mm.largest_free_block(bytes), None);

    assert_eq!(
        mm.allocate("Bytes", max as u32 + 1),
        Err(MemoryError::RequestTooLarge {
            requested: max + 1,
            max,
        })
    );
}

#[test]
fn test_refused_page_leaves_state_untouched() {
    let mut mm = counting_manager();
    let emp = mm.register_family("Emp", 128).unwrap();
    let per_page = (mm.max_allocatable() / 128) as u32;

    let kept = mm.allocate("Emp", per_page).unwrap();
    let before = mm.stats();

    mm.source_mut().refuse = true;
    assert!(matches!(
        mm.allocate("Emp", 1),
        Err(MemoryError::OutOfMemory { .. })
    ));
    assert_eq!(mm.stats(), before);
    assert_eq!(mm.pages(emp).count(), 1);

    mm.release(kept).unwrap();
    mm.validate().unwrap();
}

#[test]
fn test_drop_returns_pages() {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Emp", 128).unwrap();
    for _ in 0..100 {
        mm.allocate("Emp", 3).unwrap();
    }
    assert!(mm.stats().data_pages > 1);
    drop(mm);
}

#[test]
fn test_config_from_json() {
    let config = ManagerConfig::from_json(r#"{"page_units": 4, "max_data_pages": 2}"#).unwrap();
    let mut mm = MemoryManager::with_config(config).unwrap();
    mm.register_family("Bytes", 1).unwrap();

    assert_eq!(mm.data_page_len(), 4 * mm.page_size());
    let max = mm.max_allocatable() as u32;
    mm.allocate("Bytes", max).unwrap();
    mm.allocate("Bytes", max).unwrap();
    assert!(matches!(
        mm.allocate("Bytes", 1),
        Err(MemoryError::OutOfMemory { .. })
    ));
}
