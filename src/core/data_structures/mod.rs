/*!
 * Data Structures
 *
 * Specialized data structures for the memory manager:
 * - Generational arena for page and block records
 * - Bounded inline strings for family names
 *
 * # Performance
 *
 * - Arena: O(1) insert/lookup/remove, handles stay valid across reuse checks
 * - Family names: short names stored inline, no heap allocation
 */

mod arena;
mod family_name;

pub use arena::Arena;
pub use family_name::FamilyName;
