/*!
 * Page Family Registry Tests
 * Registration, lookup, ordering and name validation
 */

use family_mm::{MemoryError, MemoryManager};
use pretty_assertions::assert_eq;

#[test]
fn test_register_and_lookup() {
    let mut mm = MemoryManager::init().unwrap();
    let emp = mm.register_family("Emp", 128).unwrap();
    let student = mm.register_family("Student", 64).unwrap();

    assert_eq!(mm.lookup_family("Emp"), Some(emp));
    assert_eq!(mm.lookup_family("Student"), Some(student));
    assert_eq!(mm.lookup_family("Teacher"), None);

    let info = mm.family_info(student).unwrap();
    assert_eq!(info.name, "Student");
    assert_eq!(info.element_size, 64);
}

#[test]
fn test_registration_maps_no_data_pages() {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Emp", 128).unwrap();

    let stats = mm.stats();
    assert_eq!(stats.families, 1);
    assert_eq!(stats.data_pages, 0);
    assert_eq!(stats.pages_acquired, 0);
}

#[test]
fn test_element_size_up_to_page_size() {
    let mut mm = MemoryManager::init().unwrap();
    let page_size = mm.page_size() as u32;

    assert!(mm.register_family("Exact", page_size).is_ok());
    match mm.register_family("Huge", page_size + 1) {
        Err(MemoryError::SizeExceedsPage { name, size, .. }) => {
            assert_eq!(name, "Huge");
            assert_eq!(size, page_size as usize + 1);
        }
        other => panic!("expected SizeExceedsPage, got {:?}", other),
    }
    assert_eq!(mm.lookup_family("Huge"), None);
}

#[test]
fn test_invalid_names_rejected() {
    let mut mm = MemoryManager::init().unwrap();
    let long = "x".repeat(32);

    for name in ["", long.as_str(), "nul\0inside"] {
        match mm.register_family(name, 8) {
            Err(MemoryError::InvalidFamilyName(_)) => {}
            other => panic!("expected InvalidFamilyName for {:?}, got {:?}", name, other),
        }
    }
    assert!(mm.register_family(&"y".repeat(31), 8).is_ok());
    assert_eq!(mm.stats().families, 1);
}

#[test]
fn test_zero_element_size_rejected() {
    let mut mm = MemoryManager::init().unwrap();
    assert!(matches!(
        mm.register_family("Unit", 0),
        Err(MemoryError::InvalidElementSize { size: 0, .. })
    ));
}

#[test]
#[should_panic(expected = "duplicate registration of page family Emp")]
fn test_duplicate_registration_halts() {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Emp", 128).unwrap();
    let _ = mm.register_family("Emp", 256);
}

#[test]
fn test_families_listed_newest_group_first() {
    let mut mm = MemoryManager::init().unwrap();
    let per_group = (mm.page_size() - 8) / 64;

    let names: Vec<String> = (0..=per_group).map(|i| format!("F{}", i)).collect();
    for name in &names {
        mm.register_family(name, 16).unwrap();
    }

    let listed: Vec<&str> = mm.families().map(|f| f.name).collect();
    let mut expected = vec![names[per_group].as_str()];
    expected.extend(names[..per_group].iter().map(String::as_str));
    assert_eq!(listed, expected);

    let stats = mm.stats();
    assert_eq!(stats.families, per_group + 1);
    assert_eq!(stats.family_groups, 2);
}

#[test]
fn test_family_walk_is_restartable() {
    let mut mm = MemoryManager::init().unwrap();
    mm.register_family("Emp", 128).unwrap();
    mm.register_family("Student", 64).unwrap();

    let walk = mm.families();
    assert_eq!(walk.clone().count(), 2);
    assert_eq!(walk.map(|f| f.element_size).sum::<u32>(), 192);
    mm.print_registered_families();
}

#[test]
fn test_type_registration_macros() {
    #[repr(C)]
    struct Emp {
        name: [u8; 120],
        id: u64,
    }

    let mut mm = MemoryManager::init().unwrap();
    let family = family_mm::register_struct!(mm, Emp).unwrap();
    assert_eq!(mm.family_info(family).unwrap().element_size, 128);

    let emp = family_mm::allocate_struct!(mm, Emp, 1).unwrap();
    unsafe {
        let emp = &mut *emp.as_ptr();
        emp.name[0] = b'A';
        emp.id = 42;
        assert_eq!(emp.name[1], 0);
        assert_eq!(emp.id, 42);
    }
    mm.release(emp.cast()).unwrap();
}
