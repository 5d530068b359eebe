/*!
 * Registration Macros
 * Type-name keyed shorthands over the family API
 */

/// Register a structure type as a page family named after the type
///
/// Expands to `register_family("<Type>", size_of::<Type>())`.
///
/// ```
/// use family_mm::{register_struct, MemoryManager};
///
/// #[allow(dead_code)]
/// struct Emp {
///     name: [u8; 32],
///     id: u32,
/// }
///
/// let mut mm = MemoryManager::init().unwrap();
/// let family = register_struct!(mm, Emp).unwrap();
/// assert_eq!(mm.lookup_family("Emp"), Some(family));
/// ```
#[macro_export]
macro_rules! register_struct {
    ($mm:expr, $ty:ident) => {
        $mm.register_family(
            stringify!($ty),
            <u32 as ::std::convert::TryFrom<usize>>::try_from(::std::mem::size_of::<$ty>())
                .unwrap_or(u32::MAX),
        )
    };
}

/// Allocate `units` zeroed elements of a type registered with [`register_struct!`]
///
/// Yields a `MemoryResult<NonNull<Type>>`.
#[macro_export]
macro_rules! allocate_struct {
    ($mm:expr, $ty:ident, $units:expr) => {
        $mm.allocate(stringify!($ty), $units)
            .map(|ptr| ptr.cast::<$ty>())
    };
}
